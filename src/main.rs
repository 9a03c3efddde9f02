//! bikeshare-orchestrator server entry point.
//!
//! Starts the collection and prediction loops and the Axum HTTP server.
//! `--migrate` applies the database migrations and exits.
//!
//! SIGINT or SIGTERM fires one shared [`Shutdown`]: the server drains and
//! the loops stop concurrently, each bounded by the shutdown timeout.

use std::sync::Arc;

use anyhow::{Context, bail};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use bikeshare_orchestrator::api;
use bikeshare_orchestrator::app_state::AppState;
use bikeshare_orchestrator::config::{AppConfig, LogFormat};
use bikeshare_orchestrator::domain::Shutdown;
use bikeshare_orchestrator::feed::{FeedClient, FeedSource};
use bikeshare_orchestrator::inference::{PredictionClient, PredictionGateway};
use bikeshare_orchestrator::metrics::MetricsHandle;
use bikeshare_orchestrator::persistence::{InMemoryStore, PersistenceGateway, PostgresStore};
use bikeshare_orchestrator::scheduler::{Scheduler, SchedulerStatus};
use bikeshare_orchestrator::server::{self, Drain};
use bikeshare_orchestrator::service::{InferenceService, StationService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(LogFormat::parse(
        &std::env::var("LOG_FORMAT").unwrap_or_default(),
    ));

    let config = AppConfig::from_env().context("load configuration")?;
    let metrics = MetricsHandle::install().context("install metrics recorder")?;
    let migrate_only = std::env::args().skip(1).any(|arg| arg == "--migrate");

    // Persistence
    let store: Arc<dyn PersistenceGateway> = if config.database.persistence_enabled {
        let store = PostgresStore::connect(&config.database)
            .await
            .context("connect to database")?;
        store.run_migrations().await.context("run migrations")?;
        if migrate_only {
            tracing::info!("migrations complete, exiting");
            return Ok(());
        }
        Arc::new(store)
    } else {
        if migrate_only {
            bail!("--migrate requires PERSISTENCE_ENABLED=true");
        }
        tracing::warn!("persistence disabled, data is kept in memory only");
        Arc::new(InMemoryStore::new())
    };

    // Upstream clients
    let feed: Arc<dyn FeedSource> =
        Arc::new(FeedClient::new(config.feed.clone()).context("build feed client")?);
    let prediction_gateway: Arc<dyn PredictionGateway> = Arc::new(
        PredictionClient::new(config.prediction.clone()).context("build prediction client")?,
    );

    // Services
    let stations = Arc::new(StationService::new(feed, Arc::clone(&store)));
    let inference = Arc::new(InferenceService::new(
        Arc::clone(&prediction_gateway),
        Arc::clone(&store),
    ));

    // Shutdown on SIGINT / SIGTERM
    let shutdown = Shutdown::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.trigger();
        }
    });

    // Background loops
    let status = SchedulerStatus::new();
    let scheduler = Scheduler::new(
        config.schedule.clone(),
        Arc::clone(&stations),
        Arc::clone(&inference),
        status.clone(),
    )
    .with_shutdown(shutdown.clone())
    .start();

    // HTTP
    let app_state = AppState {
        store,
        stations,
        inference,
        prediction_gateway,
        scheduler: status,
        metrics,
    };
    let app = api::build_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    let timeout = config.shutdown_timeout;
    let http = async {
        let served = server::serve(listener, app, shutdown.listener(), timeout).await;
        if !shutdown.is_triggered() {
            tracing::error!("http server stopped unexpectedly, stopping background loops");
            shutdown.trigger();
        }
        served
    };
    let background = async {
        shutdown.listener().triggered().await;
        tracing::info!("stopping background loops");
        scheduler.shutdown(timeout).await
    };
    let (served, aborted) = tokio::join!(http, background);

    if aborted > 0 {
        tracing::warn!(aborted, "background tasks aborted at shutdown");
    }
    if served.context("http server")? == Drain::Aborted {
        tracing::warn!("http connections abandoned at shutdown");
    }
    tracing::info!("shutdown complete");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Completes on SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
