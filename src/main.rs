//! llama-sync server entry point.
//!
//! Connects to PostgreSQL, registers the named sync tasks, starts the
//! scheduler, and serves the HTTP surface until SIGINT/SIGTERM.

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use llama_sync::api;
use llama_sync::app_state::AppState;
use llama_sync::config::SyncConfig;
use llama_sync::scheduler::{Scheduler, TaskSpec};
use llama_sync::source::defillama::DefiLlamaSource;
use llama_sync::storage::postgres::PostgresStorage;
use llama_sync::sync::{DatasetKind, SyncOrchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = SyncConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting llama-sync");

    // Storage (runs migrations) and data source
    let storage = Arc::new(PostgresStorage::connect(&config).await?);
    let source = Arc::new(DefiLlamaSource::from_config(&config)?);

    // Sync pipeline
    let orchestrator = Arc::new(SyncOrchestrator::new(
        Arc::clone(&source),
        Arc::clone(&storage),
        &config,
    ));

    // The one scheduler instance for this process
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&orchestrator),
        Arc::clone(&storage),
        &config,
    ));
    scheduler
        .register(TaskSpec {
            name: "pools-sync".to_string(),
            kind: DatasetKind::Pools,
            cron_expr: config.pools_sync_cron.clone(),
        })
        .await?;
    scheduler
        .register(TaskSpec {
            name: "protocols-sync".to_string(),
            kind: DatasetKind::Protocols,
            cron_expr: config.protocols_sync_cron.clone(),
        })
        .await?;

    if config.scheduler_enabled {
        Arc::clone(&scheduler).start().await;
    } else {
        tracing::info!("scheduler disabled; syncs run on manual trigger only");
    }

    // Build application state and router
    let app_state = AppState {
        storage,
        orchestrator,
        scheduler: Arc::clone(&scheduler),
    };

    let app = Router::new()
        .merge(api::build_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(std::time::Duration::from_secs(120))),
        )
        .with_state(app_state);

    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::ApiDoc::openapi()),
        )
    };

    // Serve until a shutdown signal arrives; stopping the scheduler
    // first lets an in-flight sync finish instead of aborting it.
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    let shutdown_scheduler = Arc::clone(&scheduler);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_signal().await;
            tracing::info!("shutdown signal received, stopping scheduler");
            shutdown_scheduler.stop().await;
        })
        .await?;

    Ok(())
}

/// Resolves on SIGINT or, on Unix, SIGTERM.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
