//! Status synchronization.
//!
//! Projects each queued PR's position onto a commit status so that only the
//! head of a queue can merge, and turns PR lifecycle webhooks into queue
//! mutations.
//!
//! # Module Structure
//!
//! - [`label`]: position to status mapping
//! - [`synchronizer`]: lifecycle handlers and bus subscribers

pub mod label;
pub mod synchronizer;


pub use label::{MAX_REPORTED_QUEUE_POSITION, merged_status, status_for_position};
pub use synchronizer::{
    ClosedReason, CommitStatusChange, Result, StatusChangeOutcome, StatusSynchronizer, SyncError,
};
