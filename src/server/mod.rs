//! HTTP server for the merge queue.
//!
//! # Endpoints
//!
//! - `POST /webhook` - GitHub webhook deliveries (`pull_request`, `status`, `ping`)
//! - `GET /api/v1/queues/{owner}/{repo}/{branch}` - list a queue
//! - `POST /api/v1/queues/{owner}/{repo}/{branch}` - book a PR
//! - `DELETE /api/v1/queues/{owner}/{repo}/{branch}/{number}` - unbook a PR
//! - `GET /api/v1/queues/{owner}/{repo}/{branch}/events` - queue snapshots as server-sent events
//! - `GET /health` - returns 200 if the server is running
//!
//! Branch names containing `/` must be percent-encoded in the path.

use std::sync::Arc;

use crate::clients::{AnyStatusReporter, ChannelBroadcaster, MemoryPrInfo, StatusReporter};
use crate::engine::QueueEngine;
use crate::store::MemoryStore;
use crate::sync::StatusSynchronizer;

pub mod health;
pub mod queue;
pub mod webhook;

pub use health::health_handler;
pub use queue::{ApiError, SNAPSHOT_EVENT, add_handler, events_handler, list_handler, remove_handler};
pub use webhook::{WebhookError, webhook_handler};

/// The synchronizer the server drives.
pub type ServiceSynchronizer<R = AnyStatusReporter> = StatusSynchronizer<MemoryStore, R, MemoryPrInfo>;

/// Shared application state, passed to handlers via axum's `State`
/// extractor.
pub struct AppState<R = AnyStatusReporter> {
    inner: Arc<AppStateInner<R>>,
}

struct AppStateInner<R> {
    sync: Arc<ServiceSynchronizer<R>>,

    /// Feeds the snapshot event streams; the same channel the broadcast
    /// handler publishes to.
    snapshots: ChannelBroadcaster,

    /// Secret for HMAC-SHA256 signature verification.
    webhook_secret: Vec<u8>,
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: StatusReporter> AppState<R> {
    pub fn new(
        sync: Arc<ServiceSynchronizer<R>>,
        snapshots: ChannelBroadcaster,
        webhook_secret: impl Into<Vec<u8>>,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                sync,
                snapshots,
                webhook_secret: webhook_secret.into(),
            }),
        }
    }

    pub fn sync(&self) -> &ServiceSynchronizer<R> {
        &self.inner.sync
    }

    pub fn engine(&self) -> &QueueEngine<MemoryStore> {
        self.inner.sync.engine()
    }

    pub fn snapshots(&self) -> &ChannelBroadcaster {
        &self.inner.snapshots
    }

    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<R: StatusReporter>(app_state: AppState<R>) -> axum::Router {
    use axum::routing::{delete, get, post};

    axum::Router::new()
        .route("/webhook", post(webhook_handler::<R>))
        .route(
            "/api/v1/queues/{owner}/{repo}/{branch}",
            get(list_handler::<R>).post(add_handler::<R>),
        )
        .route(
            "/api/v1/queues/{owner}/{repo}/{branch}/{number}",
            delete(remove_handler::<R>),
        )
        .route(
            "/api/v1/queues/{owner}/{repo}/{branch}/events",
            get(events_handler::<R>),
        )
        .route("/health", get(health_handler))
        .with_state(app_state)
}
