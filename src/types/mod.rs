//! Core domain types for the merge queue.
//!
//! Identifiers, queue entries and status values shared by every component.

pub mod ids;
pub mod item;
pub mod pr;
pub mod status;

// Re-export commonly used types at the module level
pub use ids::{InstallationId, InvalidSha, PrNumber, QueueKey, RepoId, Sha};
pub use item::QueueItem;
pub use pr::PullRequestInfo;
pub use status::{StatusReport, StatusState, StatusTarget};
