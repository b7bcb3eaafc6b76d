//! HTTP connector for a Solr-style search engine
//!
//! Owns the wire protocol only: encode a [`ParamBag`] onto the select
//! handler, decode the JSON body, and map transport failures to typed
//! backend errors carrying the HTTP status and the engine's reason text.

use std::time::Duration;

use reqwest::Client as HttpClient;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{BackendError, Result};
use crate::params::ParamBag;

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP connector for one Solr core
#[derive(Debug, Clone)]
pub struct SolrConnector {
    http_client: HttpClient,
    base_url: String,
    core: String,
}

/// Builder for creating a [`SolrConnector`]
#[derive(Debug, Default)]
pub struct SolrConnectorBuilder {
    base_url: Option<String>,
    core: Option<String>,
    timeout_secs: Option<u64>,
}

impl SolrConnectorBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the engine base URL (e.g. `http://localhost:8983/solr`)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the core/collection name
    pub fn core(mut self, core: impl Into<String>) -> Self {
        self.core = Some(core.into());
        self
    }

    /// Set the request timeout
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Build the connector
    pub fn build(self) -> Result<SolrConnector> {
        let base_url = self
            .base_url
            .ok_or_else(|| crate::Error::Config("connector base URL is required".to_string()))?;
        let core = self.core.unwrap_or_else(|| "biblio".to_string());
        let timeout = Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));

        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::from)?;

        Ok(SolrConnector {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            core,
        })
    }
}

impl SolrConnector {
    /// Start building a connector
    pub fn builder() -> SolrConnectorBuilder {
        SolrConnectorBuilder::new()
    }

    /// Issue a select-handler query and decode the JSON response
    ///
    /// A non-success HTTP status becomes a [`BackendError`] whose reason
    /// is the engine's error message when one can be extracted from the
    /// body, so error listeners can pattern-match the engine's phrasing.
    pub async fn query(&self, params: &ParamBag) -> Result<Value> {
        let url = format!("{}/{}/select", self.base_url, self.core);
        debug!(%url, "issuing select query");

        let response = self
            .http_client
            .get(&url)
            .query(&params.request())
            .send()
            .await
            .map_err(BackendError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = Self::extract_reason(&body)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                });
            warn!(status = status.as_u16(), %reason, "select query failed");
            return Err(BackendError::with_status(status.as_u16(), reason).into());
        }

        let payload = response.json::<Value>().await.map_err(BackendError::from)?;
        Ok(payload)
    }

    /// Pull the engine's error message out of an error body, if present
    fn extract_reason(body: &str) -> Option<String> {
        let parsed: Value = serde_json::from_str(body).ok()?;
        parsed
            .get("error")
            .and_then(|e| e.get("msg"))
            .and_then(|m| m.as_str())
            .map(|m| m.to_string())
            .or_else(|| (!body.is_empty()).then(|| body.to_string()))
    }
}
