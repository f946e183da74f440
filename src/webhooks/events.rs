//! Typed webhook events the service acts on.

use crate::sync::{ClosedReason, CommitStatusChange};
use crate::types::PullRequestInfo;

/// What happened to a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullRequestAction {
    Opened,
    Reopened,
    /// New commits were pushed to the head branch.
    Synchronize,
    Closed(ClosedReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestEvent {
    pub action: PullRequestAction,
    /// The PR as it is after the action.
    pub info: PullRequestInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    PullRequest(PullRequestEvent),
    Status(CommitStatusChange),
    /// Sent once when the webhook is created.
    Ping,
}
