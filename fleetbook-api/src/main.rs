use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use fleetbook_api::{app, state::AppState, worker::{start_refresh_worker, CycleRunner}};
use fleetbook_catalog::{AvailabilityCalculator, Classifier, Normalizer};
use fleetbook_core::StaticCredential;
use fleetbook_order::{RefreshOrchestrator, RefreshSettings, SnapshotStore, StatusGateway};
use fleetbook_store::{BackendClient, Config};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetbook_api=debug,fleetbook_order=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    let rules = config.business_rules.clone();
    tracing::info!("Starting Fleetbook API on port {}", config.server.port);

    // Remote backend
    let backend = Arc::new(BackendClient::new(config.backend.clone()).context("Failed to build backend client")?);

    let normalizer = Normalizer::new(
        Classifier::new(rules.full_vehicle_threshold),
        config.backend.media_base_url.clone(),
    );
    let orchestrator = RefreshOrchestrator::new(
        backend.clone(),
        backend.clone(),
        backend.clone(),
        normalizer,
        RefreshSettings {
            default_capacity: rules.default_vehicle_capacity,
            availability_concurrency: rules.availability_concurrency,
        },
    );

    let snapshots = Arc::new(SnapshotStore::new());
    // Capacity 1: manual refreshes coalesce
    let (refresh_tx, refresh_rx) = mpsc::channel(1);
    let (events_tx, _) = broadcast::channel(100);

    // Background refresh
    let shutdown = CancellationToken::new();
    let runner = CycleRunner {
        orchestrator: Arc::new(orchestrator),
        snapshots: snapshots.clone(),
        events_tx: events_tx.clone(),
        credentials: Arc::new(StaticCredential::new(config.auth.service_token.clone())),
    };
    let worker = tokio::spawn(start_refresh_worker(
        runner,
        Duration::from_secs(rules.refresh_interval_seconds.max(1)),
        refresh_rx,
        shutdown.clone(),
    ));

    let app_state = AppState {
        snapshots,
        gateway: Arc::new(StatusGateway::new(backend.clone())),
        availability: Arc::new(AvailabilityCalculator::new(backend, rules.availability_concurrency)),
        refresh_tx,
        events_tx,
        business_rules: rules,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown.cancel();
    let _ = worker.await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
