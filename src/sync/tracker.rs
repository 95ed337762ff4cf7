//! Job lifecycle tracker.
//!
//! Wraps job creation and terminal transitions so the orchestrator
//! cannot forget the failure path: [`JobTracker::begin`] hands out a
//! [`JobHandle`] that must be consumed by exactly one of
//! [`JobTracker::succeed`] or [`JobTracker::fail`] — the move semantics
//! make a second terminal call a compile error.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::SyncError;
use crate::storage::Storage;
use crate::storage::models::JobStatus;

/// Token for an in-flight job row. Consumed by the terminal calls.
#[derive(Debug)]
pub struct JobHandle {
    id: Uuid,
    job_type: String,
}

impl JobHandle {
    /// Identity of the underlying job row.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// Creates and finalizes sync-job rows through a [`Storage`] gateway.
#[derive(Debug, Clone)]
pub struct JobTracker<S> {
    storage: Arc<S>,
}

impl<S: Storage> JobTracker<S> {
    /// Creates a tracker over the given storage gateway.
    #[must_use]
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Creates a job row in `running` state.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StorageWrite`] when the row cannot be
    /// inserted; with no audit row the sync must not proceed.
    pub async fn begin(&self, job_type: &str) -> Result<JobHandle, SyncError> {
        let job = self.storage.create_job(job_type).await?;
        tracing::debug!(job_id = %job.id, job_type, "sync job created");
        Ok(JobHandle {
            id: job.id,
            job_type: job_type.to_string(),
        })
    }

    /// Marks the job `completed` with the written-record count.
    ///
    /// A storage failure here is logged and swallowed: the sync's
    /// computed result matters more than the audit record.
    pub async fn succeed(&self, handle: JobHandle, records_processed: u64) {
        self.finalize(handle, JobStatus::Completed, records_processed, None)
            .await;
    }

    /// Marks the job `failed` with the error text and the partial count
    /// written before the failure.
    ///
    /// A storage failure here is logged and swallowed, like
    /// [`JobTracker::succeed`].
    pub async fn fail(&self, handle: JobHandle, error: &str, records_processed: u64) {
        self.finalize(handle, JobStatus::Failed, records_processed, Some(error))
            .await;
    }

    async fn finalize(
        &self,
        handle: JobHandle,
        status: JobStatus,
        records_processed: u64,
        error: Option<&str>,
    ) {
        let records = i64::try_from(records_processed).unwrap_or(i64::MAX);
        if let Err(e) = self
            .storage
            .update_job(handle.id, status, records, error)
            .await
        {
            tracing::error!(
                job_id = %handle.id,
                job_type = %handle.job_type,
                error = %e,
                "failed to record terminal job state"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::mock::MockStorage;
    use crate::storage::models::JobStatus;

    #[tokio::test]
    async fn begin_then_succeed_finalizes_job() {
        let storage = Arc::new(MockStorage::new());
        let tracker = JobTracker::new(Arc::clone(&storage));

        let Ok(handle) = tracker.begin("pools-sync").await else {
            panic!("begin should succeed");
        };
        tracker.succeed(handle, 42).await;

        let job = storage.only_job();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.records_processed, 42);
        assert!(job.completed_at.is_some());
        assert!(job.error_message.is_none());
    }

    #[tokio::test]
    async fn begin_then_fail_records_error_and_partial_count() {
        let storage = Arc::new(MockStorage::new());
        let tracker = JobTracker::new(Arc::clone(&storage));

        let Ok(handle) = tracker.begin("protocols-sync").await else {
            panic!("begin should succeed");
        };
        tracker.fail(handle, "source unavailable: HTTP 503", 17).await;

        let job = storage.only_job();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.records_processed, 17);
        assert_eq!(
            job.error_message.as_deref(),
            Some("source unavailable: HTTP 503")
        );
    }

    #[tokio::test]
    async fn terminal_update_failure_is_swallowed() {
        let storage = Arc::new(MockStorage::new());
        let tracker = JobTracker::new(Arc::clone(&storage));

        let Ok(handle) = tracker.begin("pools-sync").await else {
            panic!("begin should succeed");
        };
        *storage.fail_update_job.lock().unwrap() = true;

        // Must not panic or propagate.
        tracker.succeed(handle, 5).await;
        let job = storage.only_job();
        assert_eq!(job.status, JobStatus::Running);
    }
}
