//! In-memory [`Storage`] implementation for tests.
//!
//! Keyed maps mirror the natural-key upsert semantics of the real
//! gateway, and failure injection lets orchestrator tests exercise the
//! partial-write and job-update error paths.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::Storage;
use super::models::{JobStatus, NewPool, NewProtocol, PoolSummary, ProtocolSummary, SyncJob};
use crate::error::SyncError;

/// In-memory storage double with failure injection.
#[derive(Debug, Default)]
pub struct MockStorage {
    /// Pools keyed by natural key.
    pub pools: Mutex<HashMap<String, NewPool>>,
    /// Protocols keyed by natural key.
    pub protocols: Mutex<HashMap<String, NewProtocol>>,
    /// All job rows ever created.
    pub jobs: Mutex<Vec<SyncJob>>,
    /// Terminal transitions observed, in call order.
    pub job_updates: Mutex<Vec<(Uuid, JobStatus)>>,
    /// Number of upsert calls made so far (pools and protocols combined).
    pub upsert_calls: AtomicUsize,
    /// When set, the upsert call with this zero-based index fails.
    pub fail_upsert_at: Mutex<Option<usize>>,
    /// When true, `create_job` fails.
    pub fail_create_job: Mutex<bool>,
    /// When true, `update_job` fails (the tracker must swallow this).
    pub fail_update_job: Mutex<bool>,
}

impl MockStorage {
    /// Creates an empty mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arranges for the upsert call with the given zero-based index to
    /// fail.
    pub fn fail_upsert_at(&self, call_index: usize) {
        *self.fail_upsert_at.lock().unwrap() = Some(call_index);
    }

    /// Checks the injected failure for the current upsert call.
    fn upsert_gate(&self) -> Result<(), SyncError> {
        let call = self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_upsert_at.lock().unwrap() == Some(call) {
            return Err(SyncError::StorageWrite(format!(
                "injected failure on upsert call {call}"
            )));
        }
        Ok(())
    }

    /// Returns the single job row, panicking unless exactly one exists.
    pub fn only_job(&self) -> SyncJob {
        let jobs = self.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1, "expected exactly one job row");
        jobs.first().cloned().unwrap()
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn upsert_pools(&self, records: &[NewPool]) -> Result<u64, SyncError> {
        self.upsert_gate()?;
        let mut pools = self.pools.lock().unwrap();
        for r in records {
            pools.insert(r.defillama_pool_id.clone(), r.clone());
        }
        Ok(records.len() as u64)
    }

    async fn upsert_protocols(&self, records: &[NewProtocol]) -> Result<u64, SyncError> {
        self.upsert_gate()?;
        let mut protocols = self.protocols.lock().unwrap();
        for r in records {
            protocols.insert(r.defillama_id.clone(), r.clone());
        }
        Ok(records.len() as u64)
    }

    async fn create_job(&self, job_type: &str) -> Result<SyncJob, SyncError> {
        if *self.fail_create_job.lock().unwrap() {
            return Err(SyncError::StorageWrite("injected create failure".into()));
        }
        let job = SyncJob {
            id: Uuid::new_v4(),
            job_type: job_type.to_string(),
            status: JobStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            records_processed: 0,
            error_message: None,
        };
        self.jobs.lock().unwrap().push(job.clone());
        Ok(job)
    }

    async fn update_job(
        &self,
        id: Uuid,
        status: JobStatus,
        records_processed: i64,
        error_message: Option<&str>,
    ) -> Result<SyncJob, SyncError> {
        if *self.fail_update_job.lock().unwrap() {
            return Err(SyncError::StorageWrite("injected update failure".into()));
        }
        self.job_updates.lock().unwrap().push((id, status));
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| SyncError::StorageWrite(format!("no such job {id}")))?;
        job.status = status;
        job.completed_at = Some(Utc::now());
        job.records_processed = records_processed;
        job.error_message = error_message.map(str::to_string);
        Ok(job.clone())
    }

    async fn recent_jobs(&self, limit: i64) -> Result<Vec<SyncJob>, SyncError> {
        let mut jobs = self.jobs.lock().unwrap().clone();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        jobs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(jobs)
    }

    async fn count_jobs_since(&self, since: DateTime<Utc>) -> Result<i64, SyncError> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs.iter().filter(|j| j.started_at >= since).count() as i64)
    }

    async fn top_pools(&self, limit: i64) -> Result<Vec<PoolSummary>, SyncError> {
        let pools = self.pools.lock().unwrap();
        let mut summaries: Vec<PoolSummary> = pools
            .values()
            .map(|p| PoolSummary {
                defillama_pool_id: p.defillama_pool_id.clone(),
                symbol: p.symbol.clone(),
                chain: p.chain.clone(),
                project: p.project.clone(),
                tvl_usd: p.tvl_usd,
                apy: p.apy,
                stablecoin: p.stablecoin,
                updated_at: Utc::now(),
            })
            .collect();
        summaries.sort_by(|a, b| b.tvl_usd.total_cmp(&a.tvl_usd));
        summaries.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(summaries)
    }

    async fn top_protocols(&self, limit: i64) -> Result<Vec<ProtocolSummary>, SyncError> {
        let protocols = self.protocols.lock().unwrap();
        let mut summaries: Vec<ProtocolSummary> = protocols
            .values()
            .map(|p| ProtocolSummary {
                defillama_id: p.defillama_id.clone(),
                name: p.name.clone(),
                category: p.category.clone(),
                tvl: p.tvl,
                change_1d: p.change_1d,
                updated_at: Utc::now(),
            })
            .collect();
        summaries.sort_by(|a, b| b.tvl.total_cmp(&a.tvl));
        summaries.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(summaries)
    }
}
