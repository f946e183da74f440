//! Shared test fixtures, recording fakes and proptest generators.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use crate::bus::EventBus;
use crate::clients::{
    Broadcaster, ClientError, MemoryPrInfo, MetricsSink, Notifier, QueueSnapshot, StatusReporter,
};
use crate::engine::QueueEngine;
use crate::store::{self, MemoryStore, QueueStore};
use crate::types::{
    InstallationId, PrNumber, PullRequestInfo, QueueItem, QueueKey, RepoId, Sha, StatusReport,
    StatusState, StatusTarget,
};

pub fn arb_pr_number() -> impl Strategy<Value = PrNumber> {
    (1u64..10_000).prop_map(PrNumber)
}

pub fn arb_sha() -> impl Strategy<Value = Sha> {
    "[0-9a-f]{40}".prop_map(|s| Sha::parse(s).unwrap())
}

pub fn arb_username() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}".prop_map(String::from)
}

pub fn arb_branch_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9/-]{0,30}".prop_map(String::from)
}

pub fn arb_queue_item() -> impl Strategy<Value = QueueItem> {
    (arb_pr_number(), arb_username()).prop_map(|(pr, user)| QueueItem::new(pr, user))
}

/// A SHA made of one repeated hex digit.
pub fn sha(digit: char) -> Sha {
    Sha::parse(digit.to_string().repeat(40)).unwrap()
}

pub fn main_queue() -> QueueKey {
    QueueKey::new("octo", "repo", "main")
}

pub fn item(n: u64, username: &str) -> QueueItem {
    QueueItem::new(PrNumber(n), username)
}

/// PR info as the webhook layer would record it; `author` is `user{n}`.
pub fn pr_info(owner: &str, repo: &str, branch: &str, n: u64, sha: &Sha) -> PullRequestInfo {
    PullRequestInfo {
        repo: RepoId::new(owner, repo),
        pull_request_number: PrNumber(n),
        status_url: status_url(owner, repo, sha),
        installation_id: Some(InstallationId(42)),
        branch: branch.to_string(),
        title: format!("Change #{n}"),
        author: format!("user{n}"),
        human_url: format!("https://github.com/{owner}/{repo}/pull/{n}"),
        assignees: Vec::new(),
        sha: sha.clone(),
    }
}

pub fn status_url(owner: &str, repo: &str, sha: &Sha) -> String {
    format!("https://api.github.com/repos/{owner}/{repo}/statuses/{sha}")
}

/// An engine over a fresh in-memory store.
pub fn memory_engine() -> (QueueEngine<MemoryStore>, Arc<MemoryStore>, EventBus) {
    let store = Arc::new(MemoryStore::new());
    let bus = EventBus::new();
    let engine = QueueEngine::new(Arc::clone(&store), bus.clone());
    (engine, store, bus)
}

/// Wraps a [`MemoryStore`] and yields to the scheduler before every
/// operation, widening any check-then-act window a caller leaves open.
#[derive(Debug, Default)]
pub struct YieldingStore {
    pub inner: MemoryStore,
}

impl QueueStore for YieldingStore {
    fn is_member(
        &self,
        scope: &str,
        pr: PrNumber,
    ) -> impl Future<Output = store::Result<bool>> + Send {
        async move {
            tokio::task::yield_now().await;
            self.inner.is_member(scope, pr).await
        }
    }

    fn add_member(&self, scope: &str, pr: PrNumber) -> impl Future<Output = store::Result<()>> + Send {
        async move {
            tokio::task::yield_now().await;
            self.inner.add_member(scope, pr).await
        }
    }

    fn remove_member(
        &self,
        scope: &str,
        pr: PrNumber,
    ) -> impl Future<Output = store::Result<()>> + Send {
        async move {
            tokio::task::yield_now().await;
            self.inner.remove_member(scope, pr).await
        }
    }

    fn append(
        &self,
        key: &str,
        item: &QueueItem,
    ) -> impl Future<Output = store::Result<usize>> + Send {
        async move {
            tokio::task::yield_now().await;
            self.inner.append(key, item).await
        }
    }

    fn remove_first_match(
        &self,
        key: &str,
        pr: PrNumber,
    ) -> impl Future<Output = store::Result<bool>> + Send {
        async move {
            tokio::task::yield_now().await;
            self.inner.remove_first_match(key, pr).await
        }
    }

    fn read_range(
        &self,
        key: &str,
        limit: Option<usize>,
    ) -> impl Future<Output = store::Result<Vec<QueueItem>>> + Send {
        async move {
            tokio::task::yield_now().await;
            self.inner.read_range(key, limit).await
        }
    }

    fn length(&self, key: &str) -> impl Future<Output = store::Result<usize>> + Send {
        async move {
            tokio::task::yield_now().await;
            self.inner.length(key).await
        }
    }
}

/// Records every status report; can be switched into failing mode.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(StatusTarget, StatusReport)>>,
    failing: AtomicBool,
}

impl RecordingReporter {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn reports(&self) -> Vec<(StatusTarget, StatusReport)> {
        self.reports.lock().unwrap().clone()
    }

    /// Reports posted to `status_url`, oldest first.
    pub fn reports_for(&self, status_url: &str) -> Vec<StatusReport> {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .filter(|(target, _)| target.status_url == status_url)
            .map(|(_, report)| report.clone())
            .collect()
    }

    pub fn last_for(&self, status_url: &str) -> Option<StatusReport> {
        self.reports_for(status_url).pop()
    }

    pub fn clear(&self) {
        self.reports.lock().unwrap().clear();
    }
}

impl StatusReporter for RecordingReporter {
    fn report(
        &self,
        target: &StatusTarget,
        report: &StatusReport,
    ) -> impl Future<Output = crate::clients::Result<()>> + Send {
        let result = if self.failing.load(Ordering::SeqCst) {
            Err(ClientError::Unavailable("status API down".to_string()))
        } else {
            self.reports
                .lock()
                .unwrap()
                .push((target.clone(), report.clone()));
            Ok(())
        };
        async move { result }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    HeadOfQueue {
        key: QueueKey,
        pr: PrNumber,
        username: String,
    },
    ChecksCompleted {
        key: QueueKey,
        pr: PrNumber,
        username: String,
        state: StatusState,
    },
}

/// Records every notification; can be switched into failing mode.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, notification: Notification) -> crate::clients::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ClientError::Rejected("notification refused".to_string()));
        }
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

impl Notifier for RecordingNotifier {
    fn notify_head_of_queue(
        &self,
        key: &QueueKey,
        pr: PrNumber,
        username: &str,
    ) -> impl Future<Output = crate::clients::Result<()>> + Send {
        let result = self.record(Notification::HeadOfQueue {
            key: key.clone(),
            pr,
            username: username.to_string(),
        });
        async move { result }
    }

    fn notify_checks_completed(
        &self,
        key: &QueueKey,
        pr: PrNumber,
        username: &str,
        state: StatusState,
    ) -> impl Future<Output = crate::clients::Result<()>> + Send {
        let result = self.record(Notification::ChecksCompleted {
            key: key.clone(),
            pr,
            username: username.to_string(),
            state,
        });
        async move { result }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Metric {
    Counter {
        name: String,
        tags: Vec<(String, String)>,
    },
    Gauge {
        name: String,
        value: f64,
        tags: Vec<(String, String)>,
    },
}

#[derive(Debug, Default)]
pub struct RecordingMetrics {
    recorded: Mutex<Vec<Metric>>,
}

impl RecordingMetrics {
    pub fn recorded(&self) -> Vec<Metric> {
        self.recorded.lock().unwrap().clone()
    }

    /// How many times counter `name` was incremented.
    pub fn count(&self, name: &str) -> usize {
        self.recorded()
            .iter()
            .filter(|m| matches!(m, Metric::Counter { name: n, .. } if n == name))
            .count()
    }

    /// Values reported for gauge `name`, oldest first.
    pub fn gauge_values(&self, name: &str) -> Vec<f64> {
        self.recorded()
            .into_iter()
            .filter_map(|m| match m {
                Metric::Gauge { name: n, value, .. } if n == name => Some(value),
                _ => None,
            })
            .collect()
    }
}

fn owned_tags(tags: &[(&str, &str)]) -> Vec<(String, String)> {
    tags.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl MetricsSink for RecordingMetrics {
    fn increment(&self, name: &str, tags: &[(&str, &str)]) {
        self.recorded.lock().unwrap().push(Metric::Counter {
            name: name.to_string(),
            tags: owned_tags(tags),
        });
    }

    fn gauge(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        self.recorded.lock().unwrap().push(Metric::Gauge {
            name: name.to_string(),
            value,
            tags: owned_tags(tags),
        });
    }
}

#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    snapshots: Mutex<Vec<QueueSnapshot>>,
}

impl RecordingBroadcaster {
    pub fn snapshots(&self) -> Vec<QueueSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn publish_queue_snapshot(
        &self,
        key: &QueueKey,
        items: &[QueueItem],
    ) -> impl Future<Output = crate::clients::Result<()>> + Send {
        self.snapshots.lock().unwrap().push(QueueSnapshot {
            key: key.clone(),
            items: items.to_vec(),
        });
        async { Ok(()) }
    }
}

/// Registry pre-filled with the given PRs.
pub async fn pr_registry(infos: impl IntoIterator<Item = PullRequestInfo>) -> MemoryPrInfo {
    use crate::clients::PrInfoProvider;

    let registry = MemoryPrInfo::new();
    for info in infos {
        registry.record_pull_request_info(info).await;
    }
    registry
}
