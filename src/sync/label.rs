//! Queue position to commit status mapping.

use crate::types::{StatusReport, StatusState};

/// Highest rank reported exactly; anything further back is summarised.
pub const MAX_REPORTED_QUEUE_POSITION: usize = 5;

/// The status a PR at `position` should carry; `None` means not queued.
///
/// Only the head is unblocked. Every other state is `failure`, so branch
/// protection keeps those PRs from merging.
pub fn status_for_position(position: Option<usize>) -> StatusReport {
    match position {
        None => StatusReport::new(StatusState::Failure, "Book to merge"),
        Some(0) => StatusReport::new(StatusState::Success, "It's your turn"),
        Some(1) => StatusReport::new(StatusState::Failure, "1 PR before you"),
        Some(i) if i <= MAX_REPORTED_QUEUE_POSITION => {
            StatusReport::new(StatusState::Failure, format!("{i} PRs before you"))
        }
        Some(_) => StatusReport::new(
            StatusState::Failure,
            format!("More than {MAX_REPORTED_QUEUE_POSITION} PRs before you"),
        ),
    }
}

/// Final status of a merged PR.
pub fn merged_status(username: &str) -> StatusReport {
    StatusReport::new(StatusState::Success, format!("Merged by {username}"))
}
