//! Pull request info registry.
//!
//! Fed from webhook payloads: every pull request event carries everything
//! [`PullRequestInfo`] needs, so the registry is refreshed on open, reopen
//! and synchronize and dropped on close. When opened with a path it is
//! persisted next to the queue store, so statuses can still be posted for
//! queued PRs after a restart.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, trace, warn};

use super::PrInfoProvider;
use crate::store::snapshot::{SCHEMA_VERSION, check_schema, try_read_json, write_json_atomic};
use crate::store;
use crate::types::{PrNumber, PullRequestInfo, RepoId, Sha};

type Entries = HashMap<(RepoId, PrNumber), PullRequestInfo>;

/// On-disk form of the registry.
#[derive(Debug, Serialize, Deserialize)]
struct PrInfoSnapshot {
    schema_version: u32,
    saved_at: DateTime<Utc>,
    entries: Vec<PullRequestInfo>,
}

#[derive(Debug, Default)]
pub struct MemoryPrInfo {
    entries: RwLock<Entries>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryPrInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a registry persisted at `path`, loading the previous snapshot
    /// if one exists.
    pub fn open(path: impl Into<PathBuf>) -> store::Result<Self> {
        let path = path.into();
        let mut entries = Entries::new();
        if let Some(snapshot) = try_read_json::<PrInfoSnapshot>(&path)? {
            check_schema(snapshot.schema_version)?;
            info!(path = %path.display(), prs = snapshot.entries.len(), "Loaded PR info snapshot");
            entries.extend(
                snapshot
                    .entries
                    .into_iter()
                    .map(|info| ((info.repo.clone(), info.pull_request_number), info)),
            );
        }

        Ok(MemoryPrInfo {
            entries: RwLock::new(entries),
            snapshot_path: Some(path),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies `f` and persists the result. The registry is a cache of
    /// webhook data, so a failed write is logged and the change kept.
    fn update(&self, f: impl FnOnce(&mut Entries)) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut entries);

        let Some(path) = &self.snapshot_path else {
            return;
        };
        let mut infos: Vec<PullRequestInfo> = entries.values().cloned().collect();
        infos.sort_by(|a, b| {
            (&a.repo.owner, &a.repo.repo, a.pull_request_number)
                .cmp(&(&b.repo.owner, &b.repo.repo, b.pull_request_number))
        });
        let snapshot = PrInfoSnapshot {
            schema_version: SCHEMA_VERSION,
            saved_at: Utc::now(),
            entries: infos,
        };
        if let Err(e) = write_json_atomic(path, &snapshot) {
            warn!(path = %path.display(), error = %e, "Failed to persist PR info");
        }
    }
}

impl PrInfoProvider for MemoryPrInfo {
    fn get_pull_request_info(
        &self,
        repo: &RepoId,
        pr: PrNumber,
    ) -> impl Future<Output = Option<PullRequestInfo>> + Send {
        let info = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(repo.clone(), pr))
            .cloned();
        async move { info }
    }

    fn record_pull_request_info(&self, info: PullRequestInfo) -> impl Future<Output = ()> + Send {
        trace!(repo = %info.repo, pr = %info.pull_request_number, sha = %info.sha.short(), "Recording PR info");
        self.update(|entries| {
            entries.insert((info.repo.clone(), info.pull_request_number), info);
        });
        async {}
    }

    fn forget_pull_request_info(
        &self,
        repo: &RepoId,
        pr: PrNumber,
    ) -> impl Future<Output = ()> + Send {
        self.update(|entries| {
            entries.remove(&(repo.clone(), pr));
        });
        async {}
    }

    fn find_by_sha(
        &self,
        repo: &RepoId,
        sha: &Sha,
    ) -> impl Future<Output = Option<PullRequestInfo>> + Send {
        let info = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|info| &info.repo == repo && &info.sha == sha)
            .cloned();
        async move { info }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{pr_info, sha};
    use tempfile::tempdir;

    #[tokio::test]
    async fn record_then_get_and_forget() {
        let registry = MemoryPrInfo::new();
        let info = pr_info("octo", "repo", "main", 7, &sha('a'));
        let repo = info.repo.clone();

        registry.record_pull_request_info(info.clone()).await;
        assert_eq!(registry.get_pull_request_info(&repo, PrNumber(7)).await, Some(info));

        registry.forget_pull_request_info(&repo, PrNumber(7)).await;
        assert!(registry.get_pull_request_info(&repo, PrNumber(7)).await.is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn recording_again_replaces_the_head_sha() {
        let registry = MemoryPrInfo::new();
        let old = pr_info("octo", "repo", "main", 7, &sha('a'));
        let new = pr_info("octo", "repo", "main", 7, &sha('b'));
        let repo = old.repo.clone();

        registry.record_pull_request_info(old).await;
        registry.record_pull_request_info(new.clone()).await;

        assert_eq!(registry.len(), 1);
        assert!(registry.find_by_sha(&repo, &sha('a')).await.is_none());
        assert_eq!(registry.find_by_sha(&repo, &sha('b')).await, Some(new));
    }

    #[tokio::test]
    async fn find_by_sha_is_scoped_to_the_repository() {
        let registry = MemoryPrInfo::new();
        registry
            .record_pull_request_info(pr_info("octo", "one", "main", 1, &sha('c')))
            .await;

        let other = RepoId::new("octo", "two");
        assert!(registry.find_by_sha(&other, &sha('c')).await.is_none());
    }

    #[tokio::test]
    async fn persisted_registry_survives_reopening() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.pr-info.json");
        let kept = pr_info("octo", "repo", "main", 1, &sha('a'));
        let repo = kept.repo.clone();

        {
            let registry = MemoryPrInfo::open(&path).unwrap();
            registry.record_pull_request_info(kept.clone()).await;
            registry
                .record_pull_request_info(pr_info("octo", "repo", "main", 2, &sha('b')))
                .await;
            registry.forget_pull_request_info(&repo, PrNumber(2)).await;
        }

        let reopened = MemoryPrInfo::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get_pull_request_info(&repo, PrNumber(1)).await, Some(kept));
        assert!(reopened.find_by_sha(&repo, &sha('b')).await.is_none());
    }

    #[test]
    fn missing_snapshot_opens_empty() {
        let dir = tempdir().unwrap();
        let registry = MemoryPrInfo::open(dir.path().join("absent.json")).unwrap();
        assert!(registry.is_empty());
    }
}
