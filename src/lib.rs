//! # llama-sync
//!
//! Scheduled synchronization service for DeFi market data: periodically
//! pulls the pools and protocols datasets from the DeFiLlama aggregator,
//! normalizes them, and upserts them idempotently into PostgreSQL,
//! recording every run as an auditable sync-job row.
//!
//! ## Architecture
//!
//! ```text
//! Scheduler (cron + timezone, hourly health report)
//!     │
//!     ├── SyncOrchestrator (sync/)
//!     │       │
//!     │       ├── DefiLlamaSource (source/)   fetch raw JSON
//!     │       ├── mapper                      normalize + TVL filter
//!     │       ├── Storage (storage/)          chunked batch upserts
//!     │       └── JobTracker (sync/)          job lifecycle audit
//!     │
//!     └── PostgreSQL
//!
//! REST Handlers (api/) — manual triggers, job audit, status reads
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod error;
pub mod mapper;
pub mod scheduler;
pub mod source;
pub mod storage;
pub mod sync;
