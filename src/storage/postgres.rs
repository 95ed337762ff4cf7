//! PostgreSQL implementation of the storage gateway.
//!
//! Batch upserts build one multi-row `INSERT ... ON CONFLICT DO UPDATE`
//! statement per call via [`sqlx::QueryBuilder`]. PostgreSQL applies a
//! single statement atomically, which is what gives each chunk its
//! all-or-nothing contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::Storage;
use super::models::{JobStatus, NewPool, NewProtocol, PoolSummary, ProtocolSummary, SyncJob};
use crate::config::SyncConfig;
use crate::error::SyncError;

/// Raw `sync_jobs` row as fetched from the database.
type JobRow = (
    Uuid,
    String,
    String,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    i64,
    Option<String>,
);

/// PostgreSQL-backed storage gateway using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Creates a new gateway around an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database described by `config` and runs pending
    /// migrations.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StorageWrite`] when the pool cannot be
    /// established or a migration fails.
    pub async fn connect(config: &SyncConfig) -> Result<Self, SyncError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(std::time::Duration::from_secs(
                config.database_connect_timeout_secs,
            ))
            .connect(&config.database_url)
            .await
            .map_err(|e| SyncError::StorageWrite(format!("connect: {e}")))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| SyncError::StorageWrite(format!("migrate: {e}")))?;

        Ok(Self { pool })
    }

    /// Returns a reference to the inner pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Converts a fetched row into a [`SyncJob`], validating the status text.
fn row_to_job(row: JobRow) -> Result<SyncJob, SyncError> {
    let (id, job_type, status, started_at, completed_at, records_processed, error_message) = row;
    Ok(SyncJob {
        id,
        job_type,
        status: JobStatus::from_db(&status)?,
        started_at,
        completed_at,
        records_processed,
        error_message,
    })
}

const JOB_COLUMNS: &str =
    "id, job_type, status, started_at, completed_at, records_processed, error_message";

#[async_trait]
impl Storage for PostgresStorage {
    async fn upsert_pools(&self, records: &[NewPool]) -> Result<u64, SyncError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO pools (defillama_pool_id, symbol, chain, project, tvl_usd, apy, \
             apy_base, apy_reward, volume_usd_1d, volume_usd_7d, apy_mean_30d, mu, sigma, \
             count, stablecoin, outlier, il_risk, exposure, pool_meta, underlying_tokens, \
             url, inception) ",
        );
        qb.push_values(records, |mut b, r| {
            b.push_bind(&r.defillama_pool_id)
                .push_bind(&r.symbol)
                .push_bind(&r.chain)
                .push_bind(&r.project)
                .push_bind(r.tvl_usd)
                .push_bind(r.apy)
                .push_bind(r.apy_base)
                .push_bind(r.apy_reward)
                .push_bind(r.volume_usd_1d)
                .push_bind(r.volume_usd_7d)
                .push_bind(r.apy_mean_30d)
                .push_bind(r.mu)
                .push_bind(r.sigma)
                .push_bind(r.count)
                .push_bind(r.stablecoin)
                .push_bind(r.outlier)
                .push_bind(&r.il_risk)
                .push_bind(&r.exposure)
                .push_bind(&r.pool_meta)
                .push_bind(&r.underlying_tokens)
                .push_bind(&r.url)
                .push_bind(&r.inception);
        });
        qb.push(
            " ON CONFLICT (defillama_pool_id) DO UPDATE SET \
             symbol = EXCLUDED.symbol, chain = EXCLUDED.chain, project = EXCLUDED.project, \
             tvl_usd = EXCLUDED.tvl_usd, apy = EXCLUDED.apy, apy_base = EXCLUDED.apy_base, \
             apy_reward = EXCLUDED.apy_reward, volume_usd_1d = EXCLUDED.volume_usd_1d, \
             volume_usd_7d = EXCLUDED.volume_usd_7d, apy_mean_30d = EXCLUDED.apy_mean_30d, \
             mu = EXCLUDED.mu, sigma = EXCLUDED.sigma, count = EXCLUDED.count, \
             stablecoin = EXCLUDED.stablecoin, outlier = EXCLUDED.outlier, \
             il_risk = EXCLUDED.il_risk, exposure = EXCLUDED.exposure, \
             pool_meta = EXCLUDED.pool_meta, underlying_tokens = EXCLUDED.underlying_tokens, \
             url = EXCLUDED.url, inception = EXCLUDED.inception, updated_at = NOW()",
        );

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| SyncError::StorageWrite(format!("upsert pools: {e}")))?;

        Ok(result.rows_affected())
    }

    async fn upsert_protocols(&self, records: &[NewProtocol]) -> Result<u64, SyncError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO protocols (defillama_id, name, slug, tvl, change_1d, change_7d, \
             chains, category, url, logo) ",
        );
        qb.push_values(records, |mut b, r| {
            b.push_bind(&r.defillama_id)
                .push_bind(&r.name)
                .push_bind(&r.slug)
                .push_bind(r.tvl)
                .push_bind(r.change_1d)
                .push_bind(r.change_7d)
                .push_bind(&r.chains)
                .push_bind(&r.category)
                .push_bind(&r.url)
                .push_bind(&r.logo);
        });
        qb.push(
            " ON CONFLICT (defillama_id) DO UPDATE SET \
             name = EXCLUDED.name, slug = EXCLUDED.slug, tvl = EXCLUDED.tvl, \
             change_1d = EXCLUDED.change_1d, change_7d = EXCLUDED.change_7d, \
             chains = EXCLUDED.chains, category = EXCLUDED.category, \
             url = EXCLUDED.url, logo = EXCLUDED.logo, updated_at = NOW()",
        );

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| SyncError::StorageWrite(format!("upsert protocols: {e}")))?;

        Ok(result.rows_affected())
    }

    async fn create_job(&self, job_type: &str) -> Result<SyncJob, SyncError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "INSERT INTO sync_jobs (job_type, status) VALUES ($1, 'running') \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(job_type)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SyncError::StorageWrite(format!("create job: {e}")))?;

        row_to_job(row)
    }

    async fn update_job(
        &self,
        id: Uuid,
        status: JobStatus,
        records_processed: i64,
        error_message: Option<&str>,
    ) -> Result<SyncJob, SyncError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "UPDATE sync_jobs SET status = $2, completed_at = NOW(), \
             records_processed = $3, error_message = $4 WHERE id = $1 \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(records_processed)
        .bind(error_message)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SyncError::StorageWrite(format!("update job {id}: {e}")))?;

        row_to_job(row)
    }

    async fn recent_jobs(&self, limit: i64) -> Result<Vec<SyncJob>, SyncError> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM sync_jobs ORDER BY started_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SyncError::StorageRead(format!("recent jobs: {e}")))?;

        rows.into_iter().map(row_to_job).collect()
    }

    async fn count_jobs_since(&self, since: DateTime<Utc>) -> Result<i64, SyncError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sync_jobs WHERE started_at >= $1",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SyncError::StorageRead(format!("count jobs: {e}")))
    }

    async fn top_pools(&self, limit: i64) -> Result<Vec<PoolSummary>, SyncError> {
        let rows = sqlx::query_as::<_, (String, String, String, String, f64, f64, bool, DateTime<Utc>)>(
            "SELECT defillama_pool_id, symbol, chain, project, tvl_usd, apy, stablecoin, \
             updated_at FROM pools ORDER BY tvl_usd DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SyncError::StorageRead(format!("top pools: {e}")))?;

        Ok(rows
            .into_iter()
            .map(
                |(defillama_pool_id, symbol, chain, project, tvl_usd, apy, stablecoin, updated_at)| {
                    PoolSummary {
                        defillama_pool_id,
                        symbol,
                        chain,
                        project,
                        tvl_usd,
                        apy,
                        stablecoin,
                        updated_at,
                    }
                },
            )
            .collect())
    }

    async fn top_protocols(&self, limit: i64) -> Result<Vec<ProtocolSummary>, SyncError> {
        let rows = sqlx::query_as::<_, (String, String, Option<String>, f64, f64, DateTime<Utc>)>(
            "SELECT defillama_id, name, category, tvl, change_1d, updated_at \
             FROM protocols ORDER BY tvl DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SyncError::StorageRead(format!("top protocols: {e}")))?;

        Ok(rows
            .into_iter()
            .map(
                |(defillama_id, name, category, tvl, change_1d, updated_at)| ProtocolSummary {
                    defillama_id,
                    name,
                    category,
                    tvl,
                    change_1d,
                    updated_at,
                },
            )
            .collect())
    }
}
