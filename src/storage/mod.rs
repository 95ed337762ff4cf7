//! Storage gateway: idempotent batch upserts and sync-job CRUD.
//!
//! [`Storage`] is the seam between the sync pipeline and PostgreSQL.
//! The orchestrator and scheduler depend only on the trait, so tests run
//! against the in-memory
//! [`mock`](self::mock) implementation while production uses
//! [`PostgresStorage`](postgres::PostgresStorage) via `sqlx::PgPool`.

pub mod models;
pub mod postgres;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::SyncError;
use models::{JobStatus, NewPool, NewProtocol, PoolSummary, ProtocolSummary, SyncJob};

/// Persistence operations consumed by the sync pipeline and the status
/// surface.
///
/// Write semantics: each `upsert_*` call is one chunk and must be applied
/// all-or-nothing. A failed call means none of that chunk is guaranteed
/// written; callers must not double-count on retry.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Inserts or fully replaces pool rows keyed by `defillama_pool_id`,
    /// returning the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StorageWrite`] on any database failure.
    async fn upsert_pools(&self, records: &[NewPool]) -> Result<u64, SyncError>;

    /// Inserts or fully replaces protocol rows keyed by `defillama_id`,
    /// returning the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StorageWrite`] on any database failure.
    async fn upsert_protocols(&self, records: &[NewProtocol]) -> Result<u64, SyncError>;

    /// Inserts a new job row in `running` state.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StorageWrite`] on any database failure.
    async fn create_job(&self, job_type: &str) -> Result<SyncJob, SyncError>;

    /// Transitions a job to a terminal state, stamping `completed_at`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StorageWrite`] on any database failure.
    async fn update_job(
        &self,
        id: Uuid,
        status: JobStatus,
        records_processed: i64,
        error_message: Option<&str>,
    ) -> Result<SyncJob, SyncError>;

    /// Returns the most recent job rows, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StorageRead`] on any database failure.
    async fn recent_jobs(&self, limit: i64) -> Result<Vec<SyncJob>, SyncError>;

    /// Counts job rows created at or after `since`. Used by the
    /// scheduler's hourly health report.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StorageRead`] on any database failure.
    async fn count_jobs_since(&self, since: DateTime<Utc>) -> Result<i64, SyncError>;

    /// Returns the highest-TVL pools, descending.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StorageRead`] on any database failure.
    async fn top_pools(&self, limit: i64) -> Result<Vec<PoolSummary>, SyncError>;

    /// Returns the highest-TVL protocols, descending.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StorageRead`] on any database failure.
    async fn top_protocols(&self, limit: i64) -> Result<Vec<ProtocolSummary>, SyncError>;
}
