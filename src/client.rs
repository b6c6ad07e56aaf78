use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::model::{RawEntry, ResultEnvelope};

/// Traversal distance used for every related/hierarchy request.
pub const TRAVERSAL_DEPTH: u32 = 2;

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234".to_string(),
        }
    }
}

/// Network or response-shape failure at the service boundary. Never shown to
/// the user as a message; controllers log it and fall back to absent data.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned status {status}")]
    Status { status: StatusCode },
    #[error("malformed response body: {0}")]
    Body(#[source] reqwest::Error),
}

/// The three calls the interface makes against the search/graph service.
#[async_trait]
pub trait TaxonomyBackend: Send + Sync {
    async fn search(&self, term: &str) -> Result<Vec<RawEntry>, TransportError>;

    async fn related(&self, descriptor: &str, depth: u32)
    -> Result<Vec<RawEntry>, TransportError>;

    async fn hierarchy(
        &self,
        descriptor: &str,
        depth: u32,
    ) -> Result<Vec<RawEntry>, TransportError>;
}

/// reqwest-backed implementation. Query parameters are URL-encoded by the
/// transport; no retries and no explicit timeouts are configured.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url,
        }
    }

    async fn fetch(&self, request: reqwest::RequestBuilder) -> Result<Vec<RawEntry>, TransportError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status { status });
        }
        let envelope: ResultEnvelope = response.json().await.map_err(TransportError::Body)?;
        Ok(envelope.result)
    }
}

#[async_trait]
impl TaxonomyBackend for HttpBackend {
    async fn search(&self, term: &str) -> Result<Vec<RawEntry>, TransportError> {
        let request = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("term", term)]);
        self.fetch(request).await
    }

    async fn related(
        &self,
        descriptor: &str,
        depth: u32,
    ) -> Result<Vec<RawEntry>, TransportError> {
        let request = self
            .client
            .get(format!("{}/related", self.base_url))
            .query(&[("descriptor", descriptor)])
            .query(&[("depth", depth)]);
        self.fetch(request).await
    }

    async fn hierarchy(
        &self,
        descriptor: &str,
        depth: u32,
    ) -> Result<Vec<RawEntry>, TransportError> {
        let request = self
            .client
            .get(format!("{}/hierarchy", self.base_url))
            .query(&[("descriptor", descriptor)])
            .query(&[("depth", depth)]);
        self.fetch(request).await
    }
}
