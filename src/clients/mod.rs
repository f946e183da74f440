//! External collaborators of the merge queue core.
//!
//! The core reaches every outside system through one of these traits, each
//! handed in at construction so tests can substitute recording fakes:
//!
//! | trait | collaborator |
//! |-------|--------------|
//! | [`StatusReporter`] | commit status API |
//! | [`Notifier`] | push notifications to PR authors |
//! | [`MetricsSink`] | counters and gauges |
//! | [`Broadcaster`] | real-time queue snapshots for UIs |
//! | [`PrInfoProvider`] | pull request addressing info |
//!
//! Deliveries are best-effort and at-most-once: the core logs failures and
//! never retries. Clients that want retries implement them internally (see
//! [`crate::github`]).
//!
//! # Module Structure
//!
//! - [`logging`]: implementations that only emit tracing events
//! - [`channel`]: tokio broadcast channel for queue snapshots
//! - [`pr_info`]: in-memory pull request info registry

use std::future::Future;

use thiserror::Error;

use crate::github::{GitHubApiError, GitHubStatusReporter};
use crate::types::{
    PrNumber, PullRequestInfo, QueueItem, QueueKey, RepoId, Sha, StatusReport, StatusState,
    StatusTarget,
};

pub mod channel;
pub mod logging;
pub mod pr_info;

pub use channel::{ChannelBroadcaster, QueueSnapshot};
pub use logging::{LoggingNotifier, LoggingStatusReporter, TracingMetrics};
pub use pr_info::MemoryPrInfo;

/// Errors returned by collaborator clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The remote service could not be reached.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The remote service refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    GitHub(#[from] GitHubApiError),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Posts commit statuses.
pub trait StatusReporter: Send + Sync + 'static {
    fn report(
        &self,
        target: &StatusTarget,
        report: &StatusReport,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// The status reporter a running service is configured with: GitHub when a
/// token is available, logging otherwise.
#[derive(Debug, Clone)]
pub enum AnyStatusReporter {
    GitHub(GitHubStatusReporter),
    Logging(LoggingStatusReporter),
}

impl StatusReporter for AnyStatusReporter {
    fn report(
        &self,
        target: &StatusTarget,
        report: &StatusReport,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            match self {
                AnyStatusReporter::GitHub(reporter) => reporter.report(target, report).await,
                AnyStatusReporter::Logging(reporter) => reporter.report(target, report).await,
            }
        }
    }
}

/// Sends notifications to PR authors.
pub trait Notifier: Send + Sync + 'static {
    /// Tells `username` their PR is now first in the queue.
    fn notify_head_of_queue(
        &self,
        key: &QueueKey,
        pr: PrNumber,
        username: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Tells `username` the checks on their head-of-queue PR finished.
    fn notify_checks_completed(
        &self,
        key: &QueueKey,
        pr: PrNumber,
        username: &str,
        state: StatusState,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Fire-and-forget metrics backend.
pub trait MetricsSink: Send + Sync + 'static {
    fn increment(&self, name: &str, tags: &[(&str, &str)]);

    fn gauge(&self, name: &str, value: f64, tags: &[(&str, &str)]);
}

/// Pushes queue contents to real-time consumers.
pub trait Broadcaster: Send + Sync + 'static {
    fn publish_queue_snapshot(
        &self,
        key: &QueueKey,
        items: &[QueueItem],
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Source of pull request addressing info.
pub trait PrInfoProvider: Send + Sync + 'static {
    fn get_pull_request_info(
        &self,
        repo: &RepoId,
        pr: PrNumber,
    ) -> impl Future<Output = Option<PullRequestInfo>> + Send;

    /// Stores or refreshes the info for `info.pull_request_number`.
    fn record_pull_request_info(&self, info: PullRequestInfo) -> impl Future<Output = ()> + Send;

    fn forget_pull_request_info(
        &self,
        repo: &RepoId,
        pr: PrNumber,
    ) -> impl Future<Output = ()> + Send;

    /// Finds the open PR whose current head commit is `sha`.
    fn find_by_sha(
        &self,
        repo: &RepoId,
        sha: &Sha,
    ) -> impl Future<Output = Option<PullRequestInfo>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logging_reporter_always_succeeds() {
        let reporter = AnyStatusReporter::Logging(LoggingStatusReporter);
        let target = StatusTarget {
            installation_id: None,
            status_url: "https://api.github.com/repos/o/r/statuses/abc".to_string(),
        };

        let result = reporter
            .report(&target, &StatusReport::new(StatusState::Failure, "Book to merge"))
            .await;

        assert!(result.is_ok());
    }
}
