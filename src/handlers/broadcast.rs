//! Real-time queue snapshots.

use std::sync::Arc;

use tracing::warn;

use crate::bus::{BusEvent, EventBus, HandlerError, QueueEvent};
use crate::clients::Broadcaster;
use crate::engine::QueueEngine;
use crate::store::QueueStore;

/// Pushes the full ordered queue to UI consumers after every mutation.
///
/// Snapshots are read after the event, so a burst of mutations may yield
/// several identical snapshots; each one is complete on its own.
pub struct BroadcastHandler<S, B> {
    engine: QueueEngine<S>,
    broadcaster: Arc<B>,
}

impl<S: QueueStore, B: Broadcaster> BroadcastHandler<S, B> {
    pub fn new(engine: QueueEngine<S>, broadcaster: Arc<B>) -> Self {
        BroadcastHandler {
            engine,
            broadcaster,
        }
    }

    pub async fn on_queue_event(&self, event: &QueueEvent) -> Result<(), HandlerError> {
        let key = event.key();
        let items = self.engine.get_items(key).await?;
        if let Err(e) = self.broadcaster.publish_queue_snapshot(key, &items).await {
            warn!(queue = %key, error = %e, "Failed to broadcast queue snapshot");
            return Err(e.into());
        }
        Ok(())
    }

    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) {
        let handler = Arc::clone(self);
        bus.subscribe("broadcast", "item.*", move |event| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                if let BusEvent::Queue(e) = &*event {
                    handler.on_queue_event(e).await?;
                }
                Ok(())
            })
        });
    }
}
