//! Database models for sync jobs and the synced datasets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::SyncError;

/// Lifecycle state of a [`SyncJob`].
///
/// A job is created `Running` and transitions exactly once to either
/// `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// The sync run is in progress.
    Running,
    /// The sync run finished and every fetched-and-admitted record was
    /// written.
    Completed,
    /// The sync run aborted; `records_processed` holds the partial count
    /// written before the failure.
    Failed,
}

impl JobStatus {
    /// The TEXT value stored in the `status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether this is a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Parses the TEXT value stored in the `status` column.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StorageRead`] for a value outside the
    /// three-state lifecycle, which would indicate a corrupted row.
    pub fn from_db(value: &str) -> Result<Self, SyncError> {
        match value {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(SyncError::StorageRead(format!(
                "unknown job status {other:?}"
            ))),
        }
    }
}

/// One execution attempt of a named sync task (`sync_jobs` row).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SyncJob {
    /// Storage-assigned identity.
    pub id: Uuid,
    /// Task tag, e.g. `"pools-sync"`.
    pub job_type: String,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Set at creation.
    pub started_at: DateTime<Utc>,
    /// Set if and only if the job is terminal.
    pub completed_at: Option<DateTime<Utc>>,
    /// Count of source records successfully written (not fetched).
    pub records_processed: i64,
    /// Present only when `status` is `failed`.
    pub error_message: Option<String>,
}

/// Normalized liquidity-pool snapshot ready for upsert, keyed by
/// `defillama_pool_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPool {
    /// Natural key from the external API.
    pub defillama_pool_id: String,
    /// Pool token symbol, e.g. `"USDC-WETH"`.
    pub symbol: String,
    /// Chain the pool lives on.
    pub chain: String,
    /// Project (protocol slug) the pool belongs to.
    pub project: String,
    /// Total value locked in USD.
    pub tvl_usd: f64,
    /// Current total APY in percent.
    pub apy: f64,
    /// Base (fee-derived) APY component.
    pub apy_base: f64,
    /// Reward-token APY component.
    pub apy_reward: f64,
    /// 1-day traded volume in USD.
    pub volume_usd_1d: f64,
    /// 7-day traded volume in USD.
    pub volume_usd_7d: f64,
    /// 30-day mean APY.
    pub apy_mean_30d: f64,
    /// Fitted mean of the APY distribution.
    pub mu: f64,
    /// Fitted standard deviation of the APY distribution.
    pub sigma: f64,
    /// Number of data points behind the statistical fields.
    pub count: i64,
    /// Whether every pool asset is a stablecoin.
    pub stablecoin: bool,
    /// Whether the aggregator flagged the pool as a statistical outlier.
    pub outlier: bool,
    /// Impermanent-loss risk label (`"yes"` / `"no"`), when known.
    pub il_risk: Option<String>,
    /// Asset exposure label (`"single"` / `"multi"`), when known.
    pub exposure: Option<String>,
    /// Free-form pool qualifier (e.g. lock duration), when present.
    pub pool_meta: Option<String>,
    /// Addresses of the underlying tokens, when present.
    pub underlying_tokens: Option<serde_json::Value>,
    /// Project URL, when present.
    pub url: Option<String>,
    /// Pool inception date as reported by the aggregator, when present.
    pub inception: Option<String>,
}

/// Normalized protocol snapshot ready for upsert, keyed by
/// `defillama_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProtocol {
    /// Natural key: external id, falling back to slug.
    pub defillama_id: String,
    /// Display name.
    pub name: String,
    /// URL-safe identifier.
    pub slug: String,
    /// Total value locked in USD.
    pub tvl: f64,
    /// 1-day TVL change in percent.
    pub change_1d: f64,
    /// 7-day TVL change in percent.
    pub change_7d: f64,
    /// Chains the protocol is deployed on.
    pub chains: Option<serde_json::Value>,
    /// Aggregator category, e.g. `"Dexes"`.
    pub category: Option<String>,
    /// Project URL.
    pub url: Option<String>,
    /// Logo URL.
    pub logo: Option<String>,
}

/// Slim pool row returned by the status surface (`top_pools`).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PoolSummary {
    /// Natural key.
    pub defillama_pool_id: String,
    /// Pool token symbol.
    pub symbol: String,
    /// Chain the pool lives on.
    pub chain: String,
    /// Project the pool belongs to.
    pub project: String,
    /// Total value locked in USD.
    pub tvl_usd: f64,
    /// Current total APY in percent.
    pub apy: f64,
    /// Whether every pool asset is a stablecoin.
    pub stablecoin: bool,
    /// Last upsert time.
    pub updated_at: DateTime<Utc>,
}

/// Slim protocol row returned by the status surface (`top_protocols`).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProtocolSummary {
    /// Natural key.
    pub defillama_id: String,
    /// Display name.
    pub name: String,
    /// Aggregator category, when known.
    pub category: Option<String>,
    /// Total value locked in USD.
    pub tvl: f64,
    /// 1-day TVL change in percent.
    pub change_1d: f64,
    /// Last upsert time.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_db_text() {
        for status in [JobStatus::Running, JobStatus::Completed, JobStatus::Failed] {
            let Ok(parsed) = JobStatus::from_db(status.as_str()) else {
                panic!("status should parse");
            };
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn unknown_status_is_a_read_error() {
        assert!(JobStatus::from_db("queued").is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
