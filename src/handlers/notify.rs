//! Head-of-queue and checks-completed notifications.
//!
//! Two notification kinds are sent to the author of a queue's head item:
//!
//! - "you are now first in queue", once per head occupancy. A repeated
//!   attempt for a head that was already notified is dropped.
//! - "your checks finished", debounced per queue. A newer result for the
//!   same queue, or a change of head, cancels the pending delivery, so
//!   results replace each other instead of stacking. An identical
//!   `(pr, sha, state)` result is delivered at most once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::bus::event::{HEAD_CHECKS_COMPLETED, ITEM_ADD, ITEM_REMOVE};
use crate::bus::{BusEvent, DeliveryFailure, EventBus, FailedEffect, HeadChecksCompleted, QueueEvent};
use crate::clients::{ClientError, Notifier};
use crate::engine::{EngineError, QueueEngine};
use crate::store::QueueStore;
use crate::types::{PrNumber, QueueKey, Sha, StatusState};

/// Default delay before a checks-completed notification goes out.
pub const DEFAULT_CHECKS_DEBOUNCE: Duration = Duration::from_secs(2);

struct PendingChecks {
    generation: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct DispatchState {
    /// Head last notified per queue.
    heads: HashMap<QueueKey, PrNumber>,
    pending: HashMap<QueueKey, PendingChecks>,
    /// Last delivered checks result per queue.
    delivered: HashMap<QueueKey, (PrNumber, Sha, StatusState)>,
    next_generation: u64,
}

pub struct NotificationDispatcher<S, N> {
    engine: QueueEngine<S>,
    notifier: Arc<N>,
    debounce: Duration,
    state: Mutex<DispatchState>,
}

impl<S: QueueStore, N: Notifier> NotificationDispatcher<S, N> {
    pub fn new(engine: QueueEngine<S>, notifier: Arc<N>) -> Self {
        NotificationDispatcher {
            engine,
            notifier,
            debounce: DEFAULT_CHECKS_DEBOUNCE,
            state: Mutex::new(DispatchState::default()),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    fn bus(&self) -> &EventBus {
        self.engine.bus()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, DispatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reacts to a queue mutation that may have produced a new head.
    #[instrument(skip(self, event), fields(queue = %event.key()))]
    pub async fn on_queue_event(&self, event: &QueueEvent) -> Result<(), EngineError> {
        match event {
            QueueEvent::Added {
                key,
                item,
                index: 0,
            } => {
                self.notify_head(key, item.pull_request_number, &item.username)
                    .await;
            }
            QueueEvent::Added { .. } => {}
            QueueEvent::Removed { key, meta, .. } if meta.first_item_changed => {
                match self.engine.get_first_item(key).await? {
                    Some(head) => {
                        self.notify_head(key, head.pull_request_number, &head.username)
                            .await;
                    }
                    None => {
                        let mut state = self.lock_state();
                        state.heads.remove(key);
                        cancel_pending(&mut state, key);
                    }
                }
            }
            QueueEvent::Removed { .. } => {}
        }
        Ok(())
    }

    async fn notify_head(&self, key: &QueueKey, pr: PrNumber, username: &str) {
        {
            let mut state = self.lock_state();
            if state.heads.get(key) == Some(&pr) {
                debug!(pr = %pr, "Head already notified");
                return;
            }
            state.heads.insert(key.clone(), pr);
            cancel_pending(&mut state, key);
        }

        info!(pr = %pr, username, "Notifying new head of queue");
        if let Err(e) = self.notifier.notify_head_of_queue(key, pr, username).await {
            self.delivery_failed(key, pr, e);
        }
    }

    /// Debounces and delivers a checks-completed notification.
    ///
    /// Resolves once the notification is delivered, dropped as a duplicate,
    /// or replaced.
    #[instrument(skip(self, event), fields(queue = %event.key, pr = %event.pull_request_number, state = %event.state))]
    pub async fn on_checks_completed(&self, event: &HeadChecksCompleted) {
        let result = (
            event.pull_request_number,
            event.sha.clone(),
            event.state,
        );

        let (generation, token) = {
            let mut state = self.lock_state();
            if state.delivered.get(&event.key) == Some(&result) {
                debug!("Checks result already delivered");
                return;
            }
            cancel_pending(&mut state, &event.key);
            let generation = state.next_generation;
            state.next_generation += 1;
            let token = CancellationToken::new();
            state.pending.insert(
                event.key.clone(),
                PendingChecks {
                    generation,
                    token: token.clone(),
                },
            );
            (generation, token)
        };

        tokio::select! {
            biased;

            _ = token.cancelled() => {
                debug!("Checks notification replaced");
                return;
            }
            _ = tokio::time::sleep(self.debounce) => {}
        }

        {
            let mut state = self.lock_state();
            let current = state
                .pending
                .get(&event.key)
                .is_some_and(|pending| pending.generation == generation);
            if !current {
                return;
            }
            state.pending.remove(&event.key);
            state.delivered.insert(event.key.clone(), result);
        }

        info!(username = %event.username, "Notifying head that checks completed");
        if let Err(e) = self
            .notifier
            .notify_checks_completed(
                &event.key,
                event.pull_request_number,
                &event.username,
                event.state,
            )
            .await
        {
            self.delivery_failed(&event.key, event.pull_request_number, e);
        }
    }

    /// Number of checks notifications waiting out their debounce delay.
    pub fn pending_checks(&self) -> usize {
        self.lock_state().pending.len()
    }

    fn delivery_failed(&self, key: &QueueKey, pr: PrNumber, error: ClientError) {
        warn!(queue = %key, pr = %pr, error = %error, "Failed to send notification");
        self.bus().publish(BusEvent::DeliveryFailed(DeliveryFailure {
            effect: FailedEffect::Notification,
            key: key.clone(),
            pull_request_number: pr,
            error: error.to_string(),
        }));
    }

    /// Registers the dispatcher for queue and checks events.
    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) {
        for topic in [ITEM_ADD, ITEM_REMOVE] {
            let dispatcher = Arc::clone(self);
            bus.subscribe("notify-head", topic, move |event| {
                let dispatcher = Arc::clone(&dispatcher);
                Box::pin(async move {
                    if let BusEvent::Queue(e) = &*event {
                        dispatcher.on_queue_event(e).await?;
                    }
                    Ok(())
                })
            });
        }

        let dispatcher = Arc::clone(self);
        bus.subscribe("notify-checks", HEAD_CHECKS_COMPLETED, move |event| {
            let dispatcher = Arc::clone(&dispatcher);
            Box::pin(async move {
                if let BusEvent::HeadChecksCompleted(e) = &*event {
                    dispatcher.on_checks_completed(e).await;
                }
                Ok(())
            })
        });
    }
}

fn cancel_pending(state: &mut DispatchState, key: &QueueKey) {
    if let Some(pending) = state.pending.remove(key) {
        pending.token.cancel();
    }
}
