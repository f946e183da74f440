use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use merge_queue::bus::EventBus;
use merge_queue::clients::{
    AnyStatusReporter, ChannelBroadcaster, LoggingNotifier, LoggingStatusReporter, MemoryPrInfo,
    TracingMetrics, channel::DEFAULT_CAPACITY,
};
use merge_queue::config::{DEFAULT_LOG_FILTER, ServiceConfig};
use merge_queue::engine::QueueEngine;
use merge_queue::github::GitHubStatusReporter;
use merge_queue::handlers::{BroadcastHandler, MetricsReporter, NotificationDispatcher};
use merge_queue::server::{AppState, build_router};
use merge_queue::store::MemoryStore;
use merge_queue::sync::StatusSynchronizer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env().context("loading configuration")?;
    tracing::info!(?config, "Starting merge queue");

    let store = match &config.state_file {
        Some(path) => MemoryStore::open(path)
            .with_context(|| format!("opening queue state at {}", path.display()))?,
        None => MemoryStore::new(),
    };
    let store = Arc::new(store);

    let bus = EventBus::new();
    let engine = QueueEngine::new(store, bus.clone());

    let reporter = match &config.github_token {
        Some(token) => AnyStatusReporter::GitHub(
            GitHubStatusReporter::from_token(token.as_str(), config.status_context.as_str())
                .context("building GitHub client")?,
        ),
        None => {
            tracing::warn!("GITHUB_TOKEN not set; statuses will only be logged");
            AnyStatusReporter::Logging(LoggingStatusReporter)
        }
    };

    let pr_info = match config.pr_info_file() {
        Some(path) => MemoryPrInfo::open(&path)
            .with_context(|| format!("opening PR info at {}", path.display()))?,
        None => MemoryPrInfo::new(),
    };

    let sync = Arc::new(StatusSynchronizer::new(
        engine.clone(),
        Arc::new(reporter),
        Arc::new(pr_info),
        config.status_context.as_str(),
    ));
    sync.subscribe(&bus);

    Arc::new(
        NotificationDispatcher::new(engine.clone(), Arc::new(LoggingNotifier))
            .with_debounce(config.checks_debounce),
    )
    .subscribe(&bus);
    Arc::new(MetricsReporter::new(engine.clone(), Arc::new(TracingMetrics))).subscribe(&bus);
    let snapshots = ChannelBroadcaster::new(DEFAULT_CAPACITY);
    Arc::new(BroadcastHandler::new(engine, Arc::new(snapshots.clone()))).subscribe(&bus);

    let app = build_router(AppState::new(sync, snapshots, config.webhook_secret.clone()));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!("listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    tracing::info!("Draining in-flight event handlers");
    bus.drain().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
