//! Queue snapshots over a tokio broadcast channel.

use std::future::Future;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use super::{Broadcaster, Result};
use crate::types::{QueueItem, QueueKey};

/// Default capacity of the snapshot channel.
pub const DEFAULT_CAPACITY: usize = 256;

/// The full contents of one queue at one moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub key: QueueKey,
    pub items: Vec<QueueItem>,
}

/// Fans queue snapshots out to any number of in-process receivers.
///
/// Having no receivers is not an error; a receiver that falls behind by more
/// than the channel capacity loses the oldest snapshots, which is harmless
/// since every snapshot is complete.
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    sender: broadcast::Sender<QueueSnapshot>,
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        ChannelBroadcaster { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueSnapshot> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn publish_queue_snapshot(
        &self,
        key: &QueueKey,
        items: &[QueueItem],
    ) -> impl Future<Output = Result<()>> + Send {
        let snapshot = QueueSnapshot {
            key: key.clone(),
            items: items.to_vec(),
        };
        match self.sender.send(snapshot) {
            Ok(receivers) => trace!(queue = %key, receivers, "Broadcast queue snapshot"),
            Err(_) => trace!(queue = %key, "No snapshot receivers"),
        }
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrNumber;

    #[tokio::test]
    async fn receivers_get_full_snapshots() {
        let broadcaster = ChannelBroadcaster::default();
        let mut rx = broadcaster.subscribe();
        let key = QueueKey::new("octo", "repo", "main");
        let items = vec![
            QueueItem::new(PrNumber(1), "alice"),
            QueueItem::new(PrNumber(2), "bob"),
        ];

        broadcaster.publish_queue_snapshot(&key, &items).await.unwrap();

        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.key, key);
        assert_eq!(snapshot.items, items);
    }

    #[tokio::test]
    async fn publishing_without_receivers_succeeds() {
        let broadcaster = ChannelBroadcaster::new(4);
        assert_eq!(broadcaster.receiver_count(), 0);

        let key = QueueKey::new("octo", "repo", "main");
        broadcaster.publish_queue_snapshot(&key, &[]).await.unwrap();
    }
}
