pub mod client;
pub mod model;
pub mod normalize;
pub mod session;
#[cfg(feature = "web")]
pub mod web;

pub use client::{BackendConfig, HttpBackend, TRAVERSAL_DEPTH, TaxonomyBackend, TransportError};
pub use model::{Plant, RawAttribute, RawEntry, ResultEnvelope};
pub use normalize::{NormalizeError, display_order, extract, normalize};
pub use session::{
    DetailPanel, DetailState, ExplorerSession, HierarchyPanel, HierarchyState, LoadError,
    RelatedResponse, SearchPanel, SearchState,
};
