//! Pull request lifecycle handling and status projection.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::label::{MAX_REPORTED_QUEUE_POSITION, merged_status, status_for_position};
use crate::bus::event::{ITEM_ADD, ITEM_REMOVE};
use crate::bus::{
    BusEvent, DeliveryFailure, EventBus, FailedEffect, HeadChecksCompleted, QueueEvent, RemoveMeta,
};
use crate::clients::{PrInfoProvider, StatusReporter};
use crate::engine::{AddOutcome, EngineError, QueueEngine, RemoveOutcome};
use crate::store::QueueStore;
use crate::types::{
    PrNumber, PullRequestInfo, QueueItem, QueueKey, RepoId, Sha, StatusReport, StatusState,
};

/// Errors from synchronizer operations. Status delivery failures are not
/// errors; only queue reads and writes can fail.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl SyncError {
    /// Returns true if the queue store is unreachable.
    pub fn is_unavailable(&self) -> bool {
        match self {
            SyncError::Engine(e) => e.is_unavailable(),
        }
    }
}

/// Result type for synchronizer operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// How a pull request was closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosedReason {
    Merged { by: String },
    NotMerged,
}

/// A commit status observed on some commit of a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitStatusChange {
    pub repo: RepoId,
    pub sha: Sha,
    pub state: StatusState,
    pub context: String,
}

/// What [`StatusSynchronizer::handle_status_change`] decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChangeOutcome {
    /// The status was one of our own reports.
    OwnContext,
    /// No tracked PR has this commit as its head.
    UnknownCommit,
    /// The commit belongs to a PR that is not first in its queue.
    NotHead,
    /// Checks are still running on the head.
    StillPending,
    /// A `head.checks.completed` event was published.
    Published,
}

/// Keeps every queued PR's commit status in line with its queue position.
///
/// Webhook-driven handlers mutate the queue through the engine; status
/// recomputation for queue mutations happens in the bus subscribers
/// registered by [`StatusSynchronizer::subscribe`].
pub struct StatusSynchronizer<S, R, P> {
    engine: QueueEngine<S>,
    reporter: Arc<R>,
    pr_info: Arc<P>,
    status_context: String,
}

impl<S, R, P> StatusSynchronizer<S, R, P>
where
    S: QueueStore,
    R: StatusReporter,
    P: PrInfoProvider,
{
    pub fn new(
        engine: QueueEngine<S>,
        reporter: Arc<R>,
        pr_info: Arc<P>,
        status_context: impl Into<String>,
    ) -> Self {
        StatusSynchronizer {
            engine,
            reporter,
            pr_info,
            status_context: status_context.into(),
        }
    }

    pub fn engine(&self) -> &QueueEngine<S> {
        &self.engine
    }

    pub fn pr_info(&self) -> &P {
        &self.pr_info
    }

    fn bus(&self) -> &EventBus {
        self.engine.bus()
    }

    /// A PR was opened (or reopened): record it and book it at the tail of
    /// its base branch's queue.
    ///
    /// The new item's status is set by the `item.add` subscriber. A PR that
    /// is already queued produces no event, so its current status is
    /// re-applied here instead.
    #[instrument(skip(self, info), fields(repo = %info.repo, pr = %info.pull_request_number))]
    pub async fn handle_opened(&self, info: PullRequestInfo) -> Result<AddOutcome> {
        let key = QueueKey::for_repo(&info.repo, &info.branch);
        self.pr_info.record_pull_request_info(info.clone()).await;

        let item = QueueItem::new(info.pull_request_number, &info.author);
        let outcome = self.engine.add_item(&key, item).await?;
        if outcome == AddOutcome::Duplicate {
            let position = self.engine.position_of(&key, info.pull_request_number).await?;
            self.set_pull_request_status(&key, &info, position).await;
        }
        Ok(outcome)
    }

    /// New commits were pushed: refresh the PR's info and re-apply its
    /// current label to the new head commit. The queue is not touched.
    #[instrument(skip(self, info), fields(repo = %info.repo, pr = %info.pull_request_number))]
    pub async fn handle_sync(&self, info: PullRequestInfo) -> Result<Option<usize>> {
        let key = QueueKey::for_repo(&info.repo, &info.branch);
        self.pr_info.record_pull_request_info(info.clone()).await;

        let position = self.engine.position_of(&key, info.pull_request_number).await?;
        self.set_pull_request_status(&key, &info, position).await;
        Ok(position)
    }

    /// The PR was closed or merged: unbook it and post its final status.
    ///
    /// The remaining items are resynchronised by the `item.remove`
    /// subscriber.
    #[instrument(skip(self, info), fields(repo = %info.repo, pr = %info.pull_request_number))]
    pub async fn handle_closed(
        &self,
        info: &PullRequestInfo,
        reason: ClosedReason,
    ) -> Result<RemoveOutcome> {
        let key = QueueKey::for_repo(&info.repo, &info.branch);
        let outcome = self
            .engine
            .remove_item(&key, info.pull_request_number, RemoveMeta::closed())
            .await?;

        let report = match &reason {
            ClosedReason::Merged { by } => merged_status(by),
            ClosedReason::NotMerged => status_for_position(None),
        };
        self.report(&key, info, report).await;
        self.pr_info
            .forget_pull_request_info(&info.repo, info.pull_request_number)
            .await;

        info!(?reason, "Pull request closed");
        Ok(outcome)
    }

    /// Some CI context changed state on a commit.
    ///
    /// Only a terminal state on the current head item's current commit is
    /// acted upon, by publishing `head.checks.completed`.
    #[instrument(skip(self, change), fields(repo = %change.repo, sha = %change.sha.short(), state = %change.state))]
    pub async fn handle_status_change(
        &self,
        change: &CommitStatusChange,
    ) -> Result<StatusChangeOutcome> {
        if change.context == self.status_context {
            return Ok(StatusChangeOutcome::OwnContext);
        }

        let Some(info) = self.pr_info.find_by_sha(&change.repo, &change.sha).await else {
            debug!("Status for a commit that is no tracked PR's head");
            return Ok(StatusChangeOutcome::UnknownCommit);
        };

        let key = QueueKey::for_repo(&info.repo, &info.branch);
        let head = match self.engine.get_first_item(&key).await? {
            Some(head) if head.pull_request_number == info.pull_request_number => head,
            _ => return Ok(StatusChangeOutcome::NotHead),
        };

        if change.state == StatusState::Pending {
            return Ok(StatusChangeOutcome::StillPending);
        }

        debug!(queue = %key, pr = %head.pull_request_number, "Head checks reached a terminal state");
        self.bus().publish(BusEvent::HeadChecksCompleted(HeadChecksCompleted {
            key,
            pull_request_number: head.pull_request_number,
            username: head.username,
            sha: change.sha.clone(),
            state: change.state,
        }));
        Ok(StatusChangeOutcome::Published)
    }

    /// Re-applies the label of every visible rank of the queue.
    ///
    /// Reads a snapshot of the first `MAX_REPORTED_QUEUE_POSITION + 1`
    /// items; later items all carry the same label and are unaffected by a
    /// single removal. Returns the number of statuses delivered.
    #[instrument(skip(self), fields(queue = %key))]
    pub async fn set_all_pull_requests_statuses(&self, key: &QueueKey) -> Result<usize> {
        let items = self
            .engine
            .get_items_limited(key, MAX_REPORTED_QUEUE_POSITION + 1)
            .await?;
        let repo = key.repo_id();

        let mut delivered = 0;
        for (position, item) in items.iter().enumerate() {
            let Some(info) = self
                .pr_info
                .get_pull_request_info(&repo, item.pull_request_number)
                .await
            else {
                debug!(pr = %item.pull_request_number, "No PR info; skipping status");
                continue;
            };
            if self.set_pull_request_status(key, &info, Some(position)).await {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// Posts the label for `position` on the PR's head commit. Returns false
    /// if delivery failed.
    pub async fn set_pull_request_status(
        &self,
        key: &QueueKey,
        info: &PullRequestInfo,
        position: Option<usize>,
    ) -> bool {
        self.report(key, info, status_for_position(position)).await
    }

    async fn report(&self, key: &QueueKey, info: &PullRequestInfo, report: StatusReport) -> bool {
        let report = report.with_target_url(info.human_url.clone());
        match self.reporter.report(&info.status_target(), &report).await {
            Ok(()) => {
                debug!(
                    pr = %info.pull_request_number,
                    state = %report.state,
                    description = %report.description,
                    "Status reported"
                );
                true
            }
            Err(e) => {
                warn!(pr = %info.pull_request_number, error = %e, "Failed to report status");
                self.bus().publish(BusEvent::DeliveryFailed(DeliveryFailure {
                    effect: FailedEffect::StatusReport,
                    key: key.clone(),
                    pull_request_number: info.pull_request_number,
                    error: e.to_string(),
                }));
                false
            }
        }
    }

    async fn on_added(&self, key: &QueueKey, pr: PrNumber) -> Result<()> {
        let Some(info) = self.pr_info.get_pull_request_info(&key.repo_id(), pr).await else {
            debug!(queue = %key, pr = %pr, "No PR info for added item");
            return Ok(());
        };
        // Re-read: a later removal may already have shifted the item.
        let position = self.engine.position_of(key, pr).await?;
        self.set_pull_request_status(key, &info, position).await;
        Ok(())
    }

    async fn on_removed(&self, key: &QueueKey, item: &QueueItem, meta: RemoveMeta) -> Result<()> {
        self.set_all_pull_requests_statuses(key).await?;

        if !meta.closed
            && let Some(info) = self
                .pr_info
                .get_pull_request_info(&key.repo_id(), item.pull_request_number)
                .await
        {
            self.set_pull_request_status(key, &info, None).await;
        }
        Ok(())
    }

    /// Registers the status subscribers for `item.add` and `item.remove`.
    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) {
        let sync = Arc::clone(self);
        bus.subscribe("status-sync", ITEM_ADD, move |event| {
            let sync = Arc::clone(&sync);
            Box::pin(async move {
                if let BusEvent::Queue(QueueEvent::Added { key, item, .. }) = &*event {
                    sync.on_added(key, item.pull_request_number).await?;
                }
                Ok(())
            })
        });

        let sync = Arc::clone(self);
        bus.subscribe("status-resync", ITEM_REMOVE, move |event| {
            let sync = Arc::clone(&sync);
            Box::pin(async move {
                if let BusEvent::Queue(QueueEvent::Removed { key, item, meta }) = &*event {
                    sync.on_removed(key, item, *meta).await?;
                }
                Ok(())
            })
        });
    }
}
