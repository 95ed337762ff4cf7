//! DeFiLlama HTTP adapter.
//!
//! Two endpoints are consumed:
//! - `GET {yields}/pools` — `{ "status": "success", "data": [...] }`
//! - `GET {api}/protocols` — a top-level JSON array
//!
//! Both are returned element-by-element as raw `serde_json::Value`s.

use async_trait::async_trait;
use reqwest::Client;

use super::DataSource;
use crate::config::SyncConfig;
use crate::error::SyncError;

/// HTTP client for the DeFiLlama aggregator APIs.
#[derive(Debug, Clone)]
pub struct DefiLlamaSource {
    client: Client,
    yields_url: String,
    api_url: String,
}

impl DefiLlamaSource {
    /// Builds the adapter from configuration, applying the bounded
    /// per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Internal`] when the underlying HTTP client
    /// cannot be constructed.
    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.source_timeout_secs))
            .user_agent(concat!("llama-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Internal(format!("http client: {e}")))?;

        Ok(Self {
            client,
            yields_url: config.yields_api_url.trim_end_matches('/').to_string(),
            api_url: config.llama_api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Performs a GET and parses the body as JSON.
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, SyncError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::SourceUnavailable(format!("GET {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::SourceUnavailable(format!(
                "GET {url}: HTTP {status}"
            )));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| SyncError::SourceMalformed(format!("GET {url}: {e}")))
    }
}

#[async_trait]
impl DataSource for DefiLlamaSource {
    async fn fetch_pools(&self) -> Result<Vec<serde_json::Value>, SyncError> {
        let url = format!("{}/pools", self.yields_url);
        let body = self.get_json(&url).await?;

        // The yields API wraps the list in a `data` field.
        match body {
            serde_json::Value::Object(mut map) => match map.remove("data") {
                Some(serde_json::Value::Array(data)) => Ok(data),
                _ => Err(SyncError::SourceMalformed(format!(
                    "GET {url}: missing `data` array"
                ))),
            },
            _ => Err(SyncError::SourceMalformed(format!(
                "GET {url}: expected a JSON object"
            ))),
        }
    }

    async fn fetch_protocols(&self) -> Result<Vec<serde_json::Value>, SyncError> {
        let url = format!("{}/protocols", self.api_url);
        let body = self.get_json(&url).await?;

        match body {
            serde_json::Value::Array(list) => Ok(list),
            _ => Err(SyncError::SourceMalformed(format!(
                "GET {url}: expected a top-level array"
            ))),
        }
    }
}
