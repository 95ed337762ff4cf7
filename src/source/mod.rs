//! Data source adapters for the external market-data aggregator.
//!
//! [`DataSource`] is the fetch seam: it returns raw, untransformed JSON
//! elements and nothing else. Mapping and filtering belong to the
//! [`mapper`](crate::mapper); retry policy deliberately does not live
//! here (a failed fetch fails the whole sync run).

pub mod defillama;

use async_trait::async_trait;

use crate::error::SyncError;

/// Fetch capability for the two synced datasets.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetches the raw pool list.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SourceUnavailable`] when the request errors,
    /// times out, or the response is non-2xx, and
    /// [`SyncError::SourceMalformed`] when the body is not the expected
    /// JSON shape.
    async fn fetch_pools(&self) -> Result<Vec<serde_json::Value>, SyncError>;

    /// Fetches the raw protocol list.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`DataSource::fetch_pools`].
    async fn fetch_protocols(&self) -> Result<Vec<serde_json::Value>, SyncError>;
}
