//! Sync pipeline: dataset kinds, run outcomes, job tracking, and the
//! orchestrator that sequences fetch → map → chunked write → finalize.

pub mod orchestrator;
pub mod tracker;

pub use orchestrator::SyncOrchestrator;
pub use tracker::{JobHandle, JobTracker};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::SyncError;

/// The named datasets the service synchronizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    /// Liquidity pools from the yields API.
    Pools,
    /// Protocols from the main API.
    Protocols,
}

impl DatasetKind {
    /// The `job_type` tag recorded on sync-job rows.
    #[must_use]
    pub const fn job_type(self) -> &'static str {
        match self {
            Self::Pools => "pools-sync",
            Self::Protocols => "protocols-sync",
        }
    }

    /// Plural noun used in log lines and response payloads.
    #[must_use]
    pub const fn noun(self) -> &'static str {
        match self {
            Self::Pools => "pools",
            Self::Protocols => "protocols",
        }
    }
}

/// Aggregate result of one sync run, reported to the scheduler and the
/// manual trigger surface.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Identity of the job row recording this run.
    pub job_id: Uuid,
    /// Number of raw elements the source returned.
    pub total_source_records: usize,
    /// Number of records successfully written (partial on failure).
    pub records_processed: u64,
    /// The triggering error when the run failed.
    pub error: Option<String>,
}

impl SyncOutcome {
    /// Whether the run finalized successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Run capability the scheduler and trigger surface depend on.
///
/// Implemented by [`SyncOrchestrator`]; tests substitute recording
/// fakes.
#[async_trait]
pub trait SyncRunner: Send + Sync {
    /// Executes one end-to-end sync run for the given dataset.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StorageWrite`] only when no job row could be
    /// created; every later failure finalizes the job and surfaces
    /// through [`SyncOutcome::error`] instead.
    async fn run_sync(&self, kind: DatasetKind) -> Result<SyncOutcome, SyncError>;
}
