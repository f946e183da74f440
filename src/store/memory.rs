//! In-process queue store.
//!
//! Holds lists and membership sets in memory behind a single mutex, so every
//! individual operation is atomic. When opened with a snapshot path, each
//! mutation is applied to a copy, persisted atomically, and only then made
//! visible; a failed write leaves the in-memory state untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};

use super::snapshot::{StoreSnapshot, save_snapshot_atomic, try_load_snapshot};
use super::{QueueStore, Result, StoreError};
use crate::types::{PrNumber, QueueItem};

#[derive(Debug, Clone, Default)]
struct StoreState {
    lists: BTreeMap<String, Vec<QueueItem>>,
    sets: BTreeMap<String, BTreeSet<PrNumber>>,
}

/// A [`QueueStore`] kept in process memory.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<StoreState>,

    /// Where to persist the state after each mutation, if anywhere.
    snapshot_path: Option<PathBuf>,

    /// Cleared to simulate an outage of the backing store.
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty, non-persistent store.
    pub fn new() -> Self {
        MemoryStore {
            state: Mutex::new(StoreState::default()),
            snapshot_path: None,
            available: AtomicBool::new(true),
        }
    }

    /// Opens a store persisted at `path`, loading the previous snapshot if
    /// one exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match try_load_snapshot(&path)? {
            Some(snapshot) => {
                info!(
                    path = %path.display(),
                    queues = snapshot.lists.len(),
                    "Loaded queue store snapshot"
                );
                StoreState {
                    lists: snapshot.lists,
                    sets: snapshot.sets,
                }
            }
            None => StoreState::default(),
        };

        Ok(MemoryStore {
            state: Mutex::new(state),
            snapshot_path: Some(path),
            available: AtomicBool::new(true),
        })
    }

    /// Returns the snapshot path, if the store is persistent.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Marks the store reachable or unreachable.
    ///
    /// While unreachable every operation fails with
    /// [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store marked offline".into()))
        }
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> Result<T> {
        self.check_available()?;
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&state))
    }

    fn write<T>(&self, f: impl FnOnce(&mut StoreState) -> T) -> Result<T> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(path) = &self.snapshot_path else {
            return Ok(f(&mut state));
        };

        let mut next = state.clone();
        let result = f(&mut next);
        let snapshot = StoreSnapshot::new(next.lists.clone(), next.sets.clone());
        save_snapshot_atomic(path, &snapshot)?;
        debug!(path = %path.display(), "Persisted queue store snapshot");
        *state = next;
        Ok(result)
    }
}

impl QueueStore for MemoryStore {
    fn is_member(&self, scope: &str, pr: PrNumber) -> impl Future<Output = Result<bool>> + Send {
        let result = self.read(|s| s.sets.get(scope).is_some_and(|set| set.contains(&pr)));
        async move { result }
    }

    fn add_member(&self, scope: &str, pr: PrNumber) -> impl Future<Output = Result<()>> + Send {
        let result = self.write(|s| {
            s.sets.entry(scope.to_string()).or_default().insert(pr);
        });
        async move { result }
    }

    fn remove_member(
        &self,
        scope: &str,
        pr: PrNumber,
    ) -> impl Future<Output = Result<()>> + Send {
        let result = self.write(|s| {
            if let Some(set) = s.sets.get_mut(scope) {
                set.remove(&pr);
                if set.is_empty() {
                    s.sets.remove(scope);
                }
            }
        });
        async move { result }
    }

    fn append(&self, key: &str, item: &QueueItem) -> impl Future<Output = Result<usize>> + Send {
        let result = self.write(|s| {
            let list = s.lists.entry(key.to_string()).or_default();
            list.push(item.clone());
            list.len()
        });
        async move { result }
    }

    fn remove_first_match(
        &self,
        key: &str,
        pr: PrNumber,
    ) -> impl Future<Output = Result<bool>> + Send {
        let result = self.write(|s| {
            let Some(list) = s.lists.get_mut(key) else {
                return false;
            };
            let Some(pos) = list.iter().position(|i| i.pull_request_number == pr) else {
                return false;
            };
            list.remove(pos);
            if list.is_empty() {
                s.lists.remove(key);
            }
            true
        });
        async move { result }
    }

    fn read_range(
        &self,
        key: &str,
        limit: Option<usize>,
    ) -> impl Future<Output = Result<Vec<QueueItem>>> + Send {
        let result = self.read(|s| {
            let list = s.lists.get(key).map(Vec::as_slice).unwrap_or_default();
            let end = limit.map_or(list.len(), |l| l.min(list.len()));
            list[..end].to_vec()
        });
        async move { result }
    }

    fn length(&self, key: &str) -> impl Future<Output = Result<usize>> + Send {
        let result = self.read(|s| s.lists.get(key).map_or(0, Vec::len));
        async move { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const KEY: &str = "octo:repo:main";
    const SCOPE: &str = "octo:repo";

    fn item(n: u64) -> QueueItem {
        QueueItem::new(PrNumber(n), format!("user{}", n))
    }

    #[tokio::test]
    async fn append_returns_new_length_and_keeps_order() {
        let store = MemoryStore::new();
        assert_eq!(store.append(KEY, &item(1)).await.unwrap(), 1);
        assert_eq!(store.append(KEY, &item(2)).await.unwrap(), 2);
        assert_eq!(store.append(KEY, &item(3)).await.unwrap(), 3);

        let numbers: Vec<u64> = store
            .read_range(KEY, None)
            .await
            .unwrap()
            .iter()
            .map(|i| i.pull_request_number.0)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn read_range_respects_limit() {
        let store = MemoryStore::new();
        for n in 1..=4 {
            store.append(KEY, &item(n)).await.unwrap();
        }

        let head = store.read_range(KEY, Some(1)).await.unwrap();
        assert_eq!(head.len(), 1);
        assert_eq!(head[0].pull_request_number, PrNumber(1));
        assert_eq!(store.read_range(KEY, Some(10)).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn absent_keys_behave_as_empty() {
        let store = MemoryStore::new();
        assert_eq!(store.length(KEY).await.unwrap(), 0);
        assert!(store.read_range(KEY, Some(1)).await.unwrap().is_empty());
        assert!(!store.remove_first_match(KEY, PrNumber(1)).await.unwrap());
        assert!(!store.is_member(SCOPE, PrNumber(1)).await.unwrap());
        store.remove_member(SCOPE, PrNumber(1)).await.unwrap();
    }

    #[tokio::test]
    async fn remove_first_match_removes_only_matching_entry() {
        let store = MemoryStore::new();
        for n in 1..=3 {
            store.append(KEY, &item(n)).await.unwrap();
        }

        assert!(store.remove_first_match(KEY, PrNumber(2)).await.unwrap());
        assert!(!store.remove_first_match(KEY, PrNumber(2)).await.unwrap());

        let numbers: Vec<u64> = store
            .read_range(KEY, None)
            .await
            .unwrap()
            .iter()
            .map(|i| i.pull_request_number.0)
            .collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[tokio::test]
    async fn membership_add_and_remove() {
        let store = MemoryStore::new();
        store.add_member(SCOPE, PrNumber(7)).await.unwrap();
        assert!(store.is_member(SCOPE, PrNumber(7)).await.unwrap());
        assert!(!store.is_member("octo:other", PrNumber(7)).await.unwrap());

        store.remove_member(SCOPE, PrNumber(7)).await.unwrap();
        assert!(!store.is_member(SCOPE, PrNumber(7)).await.unwrap());
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = MemoryStore::new();
        store.set_available(false);

        let err = store.append(KEY, &item(1)).await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(store.length(KEY).await.unwrap_err().is_unavailable());

        store.set_available(true);
        assert_eq!(store.length(KEY).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn persistent_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queues.json");

        {
            let store = MemoryStore::open(&path).unwrap();
            store.add_member(SCOPE, PrNumber(1)).await.unwrap();
            store.append(KEY, &item(1)).await.unwrap();
            store.add_member(SCOPE, PrNumber(2)).await.unwrap();
            store.append(KEY, &item(2)).await.unwrap();
            store.remove_first_match(KEY, PrNumber(1)).await.unwrap();
            store.remove_member(SCOPE, PrNumber(1)).await.unwrap();
        }

        let reopened = MemoryStore::open(&path).unwrap();
        assert_eq!(reopened.snapshot_path(), Some(path.as_path()));
        let items = reopened.read_range(KEY, None).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].pull_request_number, PrNumber(2));
        assert!(reopened.is_member(SCOPE, PrNumber(2)).await.unwrap());
        assert!(!reopened.is_member(SCOPE, PrNumber(1)).await.unwrap());
    }

    #[tokio::test]
    async fn failed_persist_leaves_state_untouched() {
        let dir = tempdir().unwrap();
        // A directory where the snapshot file should be makes the rename fail.
        let path = dir.path().join("queues.json");
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("occupied"), b"x").unwrap();

        let store = MemoryStore {
            state: Mutex::new(StoreState::default()),
            snapshot_path: Some(path),
            available: AtomicBool::new(true),
        };

        assert!(store.append(KEY, &item(1)).await.is_err());
        let state = store.state.lock().unwrap();
        assert!(state.lists.is_empty());
    }
}
