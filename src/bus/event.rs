//! Events carried by the bus.
//!
//! Events are created by their publisher, shared read-only between every
//! matching subscriber, and dropped once the last subscriber finishes.
//! Nothing here is persisted.

use serde::{Deserialize, Serialize};

use crate::types::{PrNumber, QueueItem, QueueKey, Sha, StatusState};

/// Topic of [`QueueEvent::Added`].
pub const ITEM_ADD: &str = "item.add";
/// Topic of [`QueueEvent::Removed`].
pub const ITEM_REMOVE: &str = "item.remove";
/// Topic of [`HeadChecksCompleted`].
pub const HEAD_CHECKS_COMPLETED: &str = "head.checks.completed";
/// Topic of a [`DeliveryFailure`] for a commit status report.
pub const STATUS_REPORT_KO: &str = "status.report.ko";
/// Topic of a [`DeliveryFailure`] for a notification.
pub const NOTIFICATION_SENT_KO: &str = "notification.sent.ko";

/// Context of a removal.
///
/// `closed` is supplied by the caller; `first_item_changed` is computed by
/// the engine from the head it read before mutating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveMeta {
    /// The PR was closed (merged or not), as opposed to unbooked while open.
    pub closed: bool,

    /// The removed item was the head of the queue.
    pub first_item_changed: bool,
}

impl RemoveMeta {
    /// Meta for a removal caused by the PR being closed or merged.
    pub fn closed() -> Self {
        RemoveMeta {
            closed: true,
            first_item_changed: false,
        }
    }
}

/// A committed mutation of one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "topic")]
pub enum QueueEvent {
    #[serde(rename = "item.add")]
    Added {
        key: QueueKey,
        item: QueueItem,
        /// Zero-based position the item landed at.
        index: usize,
    },

    #[serde(rename = "item.remove")]
    Removed {
        key: QueueKey,
        item: QueueItem,
        meta: RemoveMeta,
    },
}

impl QueueEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            QueueEvent::Added { .. } => ITEM_ADD,
            QueueEvent::Removed { .. } => ITEM_REMOVE,
        }
    }

    pub fn key(&self) -> &QueueKey {
        match self {
            QueueEvent::Added { key, .. } | QueueEvent::Removed { key, .. } => key,
        }
    }

    pub fn item(&self) -> &QueueItem {
        match self {
            QueueEvent::Added { item, .. } | QueueEvent::Removed { item, .. } => item,
        }
    }
}

/// Upstream checks reached a terminal state on the head item's commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadChecksCompleted {
    pub key: QueueKey,
    pub pull_request_number: PrNumber,
    pub username: String,
    pub sha: Sha,
    pub state: StatusState,
}

/// Which kind of side effect failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedEffect {
    StatusReport,
    Notification,
}

/// A best-effort side effect that could not be delivered.
///
/// Published for observability only; nothing retries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailure {
    pub effect: FailedEffect,
    pub key: QueueKey,
    pub pull_request_number: PrNumber,
    pub error: String,
}

/// Everything that travels over the [`EventBus`](super::EventBus).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Queue(QueueEvent),
    HeadChecksCompleted(HeadChecksCompleted),
    DeliveryFailed(DeliveryFailure),
}

impl BusEvent {
    /// The dotted topic subscribers are matched against.
    pub fn topic(&self) -> &'static str {
        match self {
            BusEvent::Queue(event) => event.topic(),
            BusEvent::HeadChecksCompleted(_) => HEAD_CHECKS_COMPLETED,
            BusEvent::DeliveryFailed(failure) => match failure.effect {
                FailedEffect::StatusReport => STATUS_REPORT_KO,
                FailedEffect::Notification => NOTIFICATION_SENT_KO,
            },
        }
    }
}

impl From<QueueEvent> for BusEvent {
    fn from(event: QueueEvent) -> Self {
        BusEvent::Queue(event)
    }
}
