//! Sync orchestrator: sequences one end-to-end sync run.
//!
//! Per run: begin a job → fetch the raw dataset → map and filter →
//! write in fixed-size chunks → finalize the job. A source failure
//! finalizes immediately with zero records; a chunk failure stops the
//! write loop and finalizes with the partial count accumulated from the
//! chunks that committed (each chunk is independently atomic, so prior
//! chunks stay written).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{DatasetKind, SyncOutcome, SyncRunner};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::mapper;
use crate::source::DataSource;
use crate::storage::Storage;
use crate::storage::models::{NewPool, NewProtocol};
use crate::sync::JobTracker;

/// Coordinates fetch, mapping, chunked writes, and job finalization.
#[derive(Debug)]
pub struct SyncOrchestrator<D, S> {
    source: Arc<D>,
    storage: Arc<S>,
    tracker: JobTracker<S>,
    min_tvl_usd: f64,
    pools_chunk_size: usize,
    protocols_chunk_size: usize,
}

impl<D: DataSource, S: Storage> SyncOrchestrator<D, S> {
    /// Creates an orchestrator over the given source and storage.
    #[must_use]
    pub fn new(source: Arc<D>, storage: Arc<S>, config: &SyncConfig) -> Self {
        let tracker = JobTracker::new(Arc::clone(&storage));
        Self {
            source,
            storage,
            tracker,
            min_tvl_usd: config.min_tvl_usd,
            pools_chunk_size: config.pools_chunk_size.max(1),
            protocols_chunk_size: config.protocols_chunk_size.max(1),
        }
    }

    /// Executes one sync run for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StorageWrite`] only when the job row itself
    /// cannot be created. All later failures finalize the job and are
    /// reported through the returned [`SyncOutcome`].
    pub async fn run(&self, kind: DatasetKind) -> Result<SyncOutcome, SyncError> {
        let handle = self.tracker.begin(kind.job_type()).await?;
        let job_id = handle.id();
        tracing::info!(job_type = kind.job_type(), %job_id, "sync run started");

        let raw = match self.fetch(kind).await {
            Ok(raw) => raw,
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(job_type = kind.job_type(), %job_id, error = %message, "fetch failed");
                self.tracker.fail(handle, &message, 0).await;
                return Ok(SyncOutcome {
                    job_id,
                    total_source_records: 0,
                    records_processed: 0,
                    error: Some(message),
                });
            }
        };

        let total_source_records = raw.len();
        let (records_processed, write_error) = match kind {
            DatasetKind::Pools => {
                let records = dedupe_by_key(
                    raw.iter()
                        .filter_map(|v| mapper::map_pool(v, self.min_tvl_usd))
                        .collect(),
                    |r: &NewPool| r.defillama_pool_id.clone(),
                );
                self.write_pool_chunks(&records).await
            }
            DatasetKind::Protocols => {
                let records = dedupe_by_key(
                    raw.iter().filter_map(mapper::map_protocol).collect(),
                    |r: &NewProtocol| r.defillama_id.clone(),
                );
                self.write_protocol_chunks(&records).await
            }
        };

        match write_error {
            None => {
                tracing::info!(
                    job_type = kind.job_type(),
                    %job_id,
                    fetched = total_source_records,
                    written = records_processed,
                    "sync run completed"
                );
                self.tracker.succeed(handle, records_processed).await;
                Ok(SyncOutcome {
                    job_id,
                    total_source_records,
                    records_processed,
                    error: None,
                })
            }
            Some(e) => {
                let message = e.to_string();
                tracing::warn!(
                    job_type = kind.job_type(),
                    %job_id,
                    written = records_processed,
                    error = %message,
                    "sync run failed mid-write"
                );
                self.tracker.fail(handle, &message, records_processed).await;
                Ok(SyncOutcome {
                    job_id,
                    total_source_records,
                    records_processed,
                    error: Some(message),
                })
            }
        }
    }

    async fn fetch(&self, kind: DatasetKind) -> Result<Vec<serde_json::Value>, SyncError> {
        match kind {
            DatasetKind::Pools => self.source.fetch_pools().await,
            DatasetKind::Protocols => self.source.fetch_protocols().await,
        }
    }

    /// Writes pool chunks sequentially, stopping at the first failure.
    /// Returns the count written plus the failure, if any.
    async fn write_pool_chunks(&self, records: &[NewPool]) -> (u64, Option<SyncError>) {
        let mut written: u64 = 0;
        for chunk in records.chunks(self.pools_chunk_size) {
            match self.storage.upsert_pools(chunk).await {
                Ok(n) => written += n,
                Err(e) => return (written, Some(e)),
            }
        }
        (written, None)
    }

    async fn write_protocol_chunks(&self, records: &[NewProtocol]) -> (u64, Option<SyncError>) {
        let mut written: u64 = 0;
        for chunk in records.chunks(self.protocols_chunk_size) {
            match self.storage.upsert_protocols(chunk).await {
                Ok(n) => written += n,
                Err(e) => return (written, Some(e)),
            }
        }
        (written, None)
    }
}

#[async_trait]
impl<D: DataSource, S: Storage> SyncRunner for SyncOrchestrator<D, S> {
    async fn run_sync(&self, kind: DatasetKind) -> Result<SyncOutcome, SyncError> {
        self.run(kind).await
    }
}

/// Keeps the last occurrence per natural key, preserving order of first
/// appearance. A duplicate key inside one multi-row upsert statement
/// would make PostgreSQL reject the whole chunk.
fn dedupe_by_key<T>(records: Vec<T>, key: impl Fn(&T) -> String) -> Vec<T> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(records.len());
    let mut out: Vec<T> = Vec::with_capacity(records.len());
    for record in records {
        let k = key(&record);
        if let Some(&i) = index.get(&k) {
            if let Some(slot) = out.get_mut(i) {
                *slot = record;
            }
        } else {
            index.insert(k, out.len());
            out.push(record);
        }
    }
    out
}
