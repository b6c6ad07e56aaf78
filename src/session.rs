use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

use crate::client::{TRAVERSAL_DEPTH, TaxonomyBackend, TransportError};
use crate::model::{Plant, RawEntry};
use crate::normalize::{self, NormalizeError};

/// Anything that can sink a panel request: the wire, the response shape, or
/// a raw entry that cannot be normalized for display.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// State of the search panel. `results == None` means no search has
/// completed yet; a failed search leaves the previous value untouched.
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub loading: bool,
    pub term: String,
    pub results: Option<Vec<Plant>>,
    generation: u64,
}

/// State of the related-entries panel. Selection is only set once a related
/// request for that entry has succeeded.
#[derive(Debug, Clone, Default)]
pub struct DetailState {
    pub selected: Option<Plant>,
    pub response: RelatedResponse,
    generation: u64,
}

/// Hidden: no entry was ever clicked, the panel is not shown.
/// Loading: a request is in flight (or failed; failures keep the spinner,
/// there is no user-visible error surface).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RelatedResponse {
    #[default]
    Hidden,
    Loading,
    Loaded(Vec<RawEntry>),
}

/// State of the hierarchy column. `chain == None` means no synonym was
/// clicked yet; `Some` holds the display-ordered walk, empty on failure or
/// while a request is in flight.
#[derive(Debug, Clone, Default)]
pub struct HierarchyState {
    pub selected_synonym: Option<Plant>,
    pub chain: Option<Vec<Plant>>,
    generation: u64,
}

/// Term search over the taxonomy, owning the result list.
pub struct SearchPanel<C> {
    backend: Arc<C>,
    state: watch::Sender<SearchState>,
}

impl<C: TaxonomyBackend> SearchPanel<C> {
    pub fn new(backend: Arc<C>) -> Self {
        Self {
            backend,
            state: watch::Sender::new(SearchState::default()),
        }
    }

    /// Observer seam: renderers hold a receiver and re-render on change.
    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SearchState {
        self.state.borrow().clone()
    }

    /// Runs one search round-trip. The loading flag flips on before the
    /// request is issued and off once it settles. A stale completion (one
    /// overtaken by a newer call) is discarded instead of overwriting state.
    pub async fn search(&self, term: &str) {
        let mut generation = 0;
        self.state.send_modify(|state| {
            state.loading = true;
            state.term = term.to_string();
            state.generation += 1;
            generation = state.generation;
        });
        let outcome = self.fetch(term).await;
        self.state.send_modify(|state| {
            if state.generation != generation {
                return;
            }
            match outcome {
                Ok(plants) => state.results = Some(plants),
                Err(err) => warn!(term, error = %err, "search request failed"),
            }
            state.loading = false;
        });
    }

    async fn fetch(&self, term: &str) -> Result<Vec<Plant>, LoadError> {
        let entries = self.backend.search(term).await?;
        Ok(normalize::normalize(&entries)?)
    }
}

/// Related-entries lookup for a clicked search result.
pub struct DetailPanel<C> {
    backend: Arc<C>,
    state: watch::Sender<DetailState>,
}

impl<C: TaxonomyBackend> DetailPanel<C> {
    pub fn new(backend: Arc<C>) -> Self {
        Self {
            backend,
            state: watch::Sender::new(DetailState::default()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DetailState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> DetailState {
        self.state.borrow().clone()
    }

    /// Fetches the entries related to `plant`. The previous response and
    /// selection are cleared before the request goes out, so the panel shows
    /// a fresh loading state rather than stale data. The response is stored
    /// raw; rendering resolves fields leniently via `RawEntry::display_fields`.
    pub async fn load_related(&self, plant: Plant) {
        let mut generation = 0;
        self.state.send_modify(|state| {
            state.response = RelatedResponse::Loading;
            state.selected = None;
            state.generation += 1;
            generation = state.generation;
        });
        let outcome = self
            .backend
            .related(&plant.descriptor, TRAVERSAL_DEPTH)
            .await;
        self.state.send_modify(|state| {
            if state.generation != generation {
                return;
            }
            match outcome {
                Ok(entries) => {
                    state.response = RelatedResponse::Loaded(entries);
                    state.selected = Some(plant);
                }
                Err(err) => {
                    warn!(descriptor = %plant.descriptor, error = %err, "related request failed");
                }
            }
        });
    }
}

/// Broader/narrower walk for a clicked synonym.
pub struct HierarchyPanel<C> {
    backend: Arc<C>,
    state: watch::Sender<HierarchyState>,
}

impl<C: TaxonomyBackend> HierarchyPanel<C> {
    pub fn new(backend: Arc<C>) -> Self {
        Self {
            backend,
            state: watch::Sender::new(HierarchyState::default()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<HierarchyState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> HierarchyState {
        self.state.borrow().clone()
    }

    /// Fetches and normalizes the hierarchy walk for `synonym`, storing it in
    /// display order. The chain is cleared to empty up front; a failure
    /// resets it to empty, which stays distinguishable from the never-loaded
    /// `None`.
    pub async fn load_hierarchy(&self, synonym: Plant) {
        let mut generation = 0;
        self.state.send_modify(|state| {
            state.chain = Some(Vec::new());
            state.selected_synonym = Some(synonym.clone());
            state.generation += 1;
            generation = state.generation;
        });
        let outcome = self.fetch(&synonym.descriptor).await;
        self.state.send_modify(|state| {
            if state.generation != generation {
                return;
            }
            match outcome {
                Ok(chain) => state.chain = Some(chain),
                Err(err) => {
                    warn!(descriptor = %synonym.descriptor, error = %err, "hierarchy request failed");
                    state.chain = Some(Vec::new());
                }
            }
        });
    }

    async fn fetch(&self, descriptor: &str) -> Result<Vec<Plant>, LoadError> {
        let entries = self.backend.hierarchy(descriptor, TRAVERSAL_DEPTH).await?;
        let chain = normalize::normalize(&entries)?;
        Ok(normalize::display_order(chain))
    }
}

/// One user's explorer: the three panels sharing a backend handle.
pub struct ExplorerSession<C> {
    pub search: SearchPanel<C>,
    pub detail: DetailPanel<C>,
    pub hierarchy: HierarchyPanel<C>,
}

impl<C: TaxonomyBackend> ExplorerSession<C> {
    pub fn new(backend: Arc<C>) -> Self {
        Self {
            search: SearchPanel::new(backend.clone()),
            detail: DetailPanel::new(backend.clone()),
            hierarchy: HierarchyPanel::new(backend),
        }
    }

    /// Looks a search result up by descriptor, the identity used for
    /// selection checks.
    pub fn result_by_descriptor(&self, descriptor: &str) -> Option<Plant> {
        self.search
            .snapshot()
            .results?
            .into_iter()
            .find(|plant| plant.descriptor == descriptor)
    }

    /// Looks a synonym row up by descriptor in the loaded related response.
    pub fn synonym_by_descriptor(&self, descriptor: &str) -> Option<Plant> {
        match self.detail.snapshot().response {
            RelatedResponse::Loaded(entries) => entries
                .iter()
                .find(|entry| entry.descriptor == descriptor)
                .map(RawEntry::display_fields),
            _ => None,
        }
    }
}
