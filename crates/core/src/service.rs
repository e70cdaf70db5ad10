//! HTTP client for the local inference service.
//!
//! Every call is bounded by a timeout. The lenient methods on [`ModelService`]
//! never fail: readiness degrades to `false` and listing to an empty catalog.
//! The `check_ready` and `fetch_models` forms keep the cause for callers that
//! want it.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::catalog::{Catalog, ModelDescriptor};
use crate::config::ServiceConfig;
use crate::generation::{GenerateResponse, GenerationRequest, GenerationResult};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid service URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Service is not reachable at {0}")]
    Unreachable(String),
    #[error("{status}")]
    Status { status: StatusCode, body: String },
    #[error("Unexpected response from service: {0}")]
    Decode(String),
    #[error("HTTP error: {0}")]
    Transport(#[source] reqwest::Error),
}

/// The operations a chat session needs from the service.
#[async_trait]
pub trait ModelService: Send + Sync {
    /// True only if the service answered the status endpoint with success.
    async fn probe_ready(&self) -> bool;

    /// Current models, or an empty catalog if they could not be fetched.
    async fn list_models(&self) -> Catalog;

    /// Runs one generation turn.
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<serde_json::Value>,
}

/// Client for an Ollama-compatible HTTP API.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: Url,
    readiness_timeout: Duration,
    list_timeout: Duration,
    generate_timeout: Duration,
}

impl OllamaClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let mut raw = config.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw).map_err(|source| ServiceError::InvalidUrl {
            url: config.base_url.clone(),
            source,
        })?;

        Ok(Self {
            client: Client::new(),
            base_url,
            readiness_timeout: config.readiness_timeout(),
            list_timeout: config.list_timeout(),
            generate_timeout: config.generate_timeout(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(path)
            .map_err(|source| ServiceError::InvalidUrl {
                url: format!("{}{path}", self.base_url),
                source,
            })
    }

    fn classify(&self, err: reqwest::Error, timeout: Duration) -> ServiceError {
        if err.is_timeout() {
            ServiceError::Timeout(timeout)
        } else if err.is_connect() {
            ServiceError::Unreachable(self.base_url.to_string())
        } else {
            ServiceError::Transport(err)
        }
    }

    async fn get_tags(&self, timeout: Duration) -> Result<reqwest::Response, ServiceError> {
        let url = self.endpoint("api/tags")?;
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| self.classify(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status { status, body });
        }
        Ok(response)
    }

    /// Probes the status endpoint with the readiness timeout.
    #[instrument(skip(self))]
    pub async fn check_ready(&self) -> Result<(), ServiceError> {
        self.get_tags(self.readiness_timeout).await.map(|_| ())
    }

    /// Fetches the model list with the listing timeout.
    ///
    /// Entries without a usable name are skipped. A body that is not JSON or has
    /// no `models` array is a [`ServiceError::Decode`].
    #[instrument(skip(self))]
    pub async fn fetch_models(&self) -> Result<Catalog, ServiceError> {
        let response = self.get_tags(self.list_timeout).await?;
        let body = response
            .text()
            .await
            .map_err(|e| self.classify(e, self.list_timeout))?;
        let tags: TagsResponse =
            serde_json::from_str(&body).map_err(|e| ServiceError::Decode(e.to_string()))?;

        let models: Vec<ModelDescriptor> = tags
            .models
            .into_iter()
            .filter_map(|entry| serde_json::from_value::<ModelDescriptor>(entry).ok())
            .filter(|m| !m.name.is_empty())
            .collect();
        debug!("Service reported {} models", models.len());
        Ok(Catalog::new(models))
    }
}

#[async_trait]
impl ModelService for OllamaClient {
    async fn probe_ready(&self) -> bool {
        match self.check_ready().await {
            Ok(()) => true,
            Err(e) => {
                debug!("Readiness probe failed: {e}");
                false
            }
        }
    }

    async fn list_models(&self) -> Catalog {
        self.fetch_models().await.unwrap_or_else(|e| {
            warn!("Failed to list models: {e}");
            Catalog::default()
        })
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, ServiceError> {
        let url = self.endpoint("api/generate")?;
        let timeout = self.generate_timeout;
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Generation failed with status {status}: {body}");
            return Err(ServiceError::Status { status, body });
        }

        let body = response.text().await.map_err(|e| self.classify(e, timeout))?;
        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| ServiceError::Decode(e.to_string()))?;
        Ok(parsed.into())
    }
}
