//! Queue entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::PrNumber;

/// One pull request waiting in a merge queue.
///
/// Items are immutable once enqueued; the queue's insertion order is the
/// merge priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Unique within the repository's membership scope.
    pub pull_request_number: PrNumber,

    /// Login of the user who booked the PR (the author for webhook-driven
    /// bookings).
    pub username: String,

    pub created_at: DateTime<Utc>,
}

impl QueueItem {
    /// Creates an item stamped with the current time.
    pub fn new(pull_request_number: PrNumber, username: impl Into<String>) -> Self {
        QueueItem {
            pull_request_number,
            username: username.into(),
            created_at: Utc::now(),
        }
    }
}
