//! Subscriber registry and detached dispatch.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace, warn};

use super::event::BusEvent;
use super::topic::topic_matches;
use crate::clients::ClientError;
use crate::engine::EngineError;
use crate::sync::SyncError;

/// Errors a subscriber may return. They are logged by the bus and go no
/// further: the publisher's mutation has already committed.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("status sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("client error: {0}")]
    Client(#[from] ClientError),
}

/// The future a subscriber returns for one event.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;

type Handler = Arc<dyn Fn(Arc<BusEvent>) -> HandlerFuture + Send + Sync>;

/// Identifies a subscription for [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    name: &'static str,
    pattern: String,
    handler: Handler,
}

struct BusInner {
    /// Kept in registration order.
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
    tracker: TaskTracker,
}

/// Topic-based publish/subscribe fan-out.
///
/// Each matching subscriber runs as its own detached tokio task, spawned in
/// registration order. Publishing never waits for a subscriber; a failing or
/// panicking subscriber affects nobody else. Cloning yields another handle
/// to the same registry.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        EventBus {
            inner: Arc::new(BusInner {
                subscriptions: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(0),
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Registers `handler` for every topic matching `pattern`.
    ///
    /// `name` only appears in logs.
    pub fn subscribe<F>(&self, name: &'static str, pattern: &str, handler: F) -> SubscriptionId
    where
        F: Fn(Arc<BusEvent>) -> HandlerFuture + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let mut subscriptions = self
            .inner
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        subscriptions.push(Subscription {
            id,
            name,
            pattern: pattern.to_string(),
            handler: Arc::new(handler),
        });
        debug!(subscriber = name, pattern, "Registered bus subscriber");
        id
    }

    /// Removes a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self
            .inner
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    /// Number of registered subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Dispatches `event` to every matching subscriber without waiting.
    ///
    /// Must be called from within a tokio runtime. Returns the number of
    /// subscribers the event was handed to.
    pub fn publish(&self, event: impl Into<BusEvent>) -> usize {
        let event = Arc::new(event.into());
        let topic = event.topic();

        let matching: Vec<(&'static str, Handler)> = self
            .inner
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| topic_matches(&s.pattern, topic))
            .map(|s| (s.name, Arc::clone(&s.handler)))
            .collect();

        trace!(topic, subscribers = matching.len(), "Publishing bus event");

        for (name, handler) in &matching {
            let future = handler(Arc::clone(&event));
            let name = *name;
            self.inner.tracker.spawn(async move {
                if let Err(e) = future.await {
                    warn!(subscriber = name, topic, error = %e, "Bus subscriber failed");
                }
            });
        }

        matching.len()
    }

    /// Waits until every dispatched subscriber task, including ones spawned
    /// by subscribers while draining, has finished.
    pub async fn drain(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        self.inner.tracker.reopen();
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("in_flight", &self.inner.tracker.len())
            .finish()
    }
}
