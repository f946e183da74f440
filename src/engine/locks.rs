//! Per-scope async mutual exclusion.
//!
//! One lazily created mutex per membership scope (repository). Holding the
//! guard serialises every check-then-act sequence the engine runs against
//! that scope's queues and membership set.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::trace;

use crate::types::RepoId;

#[derive(Debug, Default)]
pub struct ScopeLocks {
    locks: RwLock<HashMap<RepoId, Arc<Mutex<()>>>>,
}

impl ScopeLocks {
    pub fn new() -> Self {
        ScopeLocks {
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Waits for exclusive access to `scope`.
    pub async fn lock(&self, scope: &RepoId) -> OwnedMutexGuard<()> {
        let mutex = self.get_or_create(scope).await;
        mutex.lock_owned().await
    }

    /// Number of scopes that have ever been locked.
    pub async fn len(&self) -> usize {
        self.locks.read().await.len()
    }

    async fn get_or_create(&self, scope: &RepoId) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read().await;
            if let Some(mutex) = locks.get(scope) {
                return Arc::clone(mutex);
            }
        }

        let mut locks = self.locks.write().await;

        // Double-check after acquiring write lock
        if let Some(mutex) = locks.get(scope) {
            return Arc::clone(mutex);
        }

        trace!(scope = %scope, "Creating scope lock");
        let mutex = Arc::new(Mutex::new(()));
        locks.insert(scope.clone(), Arc::clone(&mutex));
        mutex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_scope_reuses_one_mutex() {
        let locks = ScopeLocks::new();
        let repo = RepoId::new("octo", "repo");

        drop(locks.lock(&repo).await);
        drop(locks.lock(&repo).await);
        drop(locks.lock(&RepoId::new("octo", "other")).await);

        assert_eq!(locks.len().await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn holders_of_one_scope_never_overlap() {
        let locks = Arc::new(ScopeLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock(&RepoId::new("octo", "repo")).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_scopes_do_not_block_each_other() {
        let locks = ScopeLocks::new();
        let _a = locks.lock(&RepoId::new("octo", "a")).await;
        // Would hang if scopes shared a mutex.
        let _b = tokio::time::timeout(
            Duration::from_secs(1),
            locks.lock(&RepoId::new("octo", "b")),
        )
        .await
        .expect("independent scope should lock immediately");
    }
}
