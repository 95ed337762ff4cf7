//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::scheduler::Scheduler;
use crate::source::defillama::DefiLlamaSource;
use crate::storage::postgres::PostgresStorage;
use crate::sync::SyncOrchestrator;

/// The production orchestrator wiring: DeFiLlama in, PostgreSQL out.
pub type LiveOrchestrator = SyncOrchestrator<DefiLlamaSource, PostgresStorage>;

/// The production scheduler wiring.
pub type LiveScheduler = Scheduler<LiveOrchestrator, PostgresStorage>;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Storage gateway for the status surface reads.
    pub storage: Arc<PostgresStorage>,
    /// Orchestrator backing the manual trigger endpoints.
    pub orchestrator: Arc<LiveOrchestrator>,
    /// The process's single scheduler instance.
    pub scheduler: Arc<LiveScheduler>,
}
