//! Queue metrics.

use std::sync::Arc;

use tracing::trace;

use crate::bus::{BusEvent, EventBus, QueueEvent};
use crate::clients::MetricsSink;
use crate::engine::{EngineError, QueueEngine};
use crate::store::QueueStore;

pub const ITEM_ADD_COUNTER: &str = "queue.item.add";
pub const ITEM_REMOVE_COUNTER: &str = "queue.item.remove";
pub const LENGTH_GAUGE: &str = "queue.length";

/// Counts queue mutations and reports queue length after each one.
pub struct MetricsReporter<S, M> {
    engine: QueueEngine<S>,
    sink: Arc<M>,
}

impl<S: QueueStore, M: MetricsSink> MetricsReporter<S, M> {
    pub fn new(engine: QueueEngine<S>, sink: Arc<M>) -> Self {
        MetricsReporter { engine, sink }
    }

    pub async fn on_queue_event(&self, event: &QueueEvent) -> Result<(), EngineError> {
        let key = event.key();
        let queue = key.to_string();
        let tags = [
            ("owner", key.owner.as_str()),
            ("repo", key.repo.as_str()),
            ("branch", key.branch.as_str()),
            ("queue", queue.as_str()),
        ];

        let counter = match event {
            QueueEvent::Added { .. } => ITEM_ADD_COUNTER,
            QueueEvent::Removed { .. } => ITEM_REMOVE_COUNTER,
        };
        self.sink.increment(counter, &tags);

        let length = self.engine.get_length(key).await?;
        trace!(queue = %key, length, "Queue length");
        self.sink.gauge(LENGTH_GAUGE, length as f64, &tags);
        Ok(())
    }

    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) {
        let reporter = Arc::clone(self);
        bus.subscribe("metrics", "item.*", move |event| {
            let reporter = Arc::clone(&reporter);
            Box::pin(async move {
                if let BusEvent::Queue(e) = &*event {
                    reporter.on_queue_event(e).await?;
                }
                Ok(())
            })
        });
    }
}
