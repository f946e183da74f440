//! Queue engine: the only writer of queue lists and membership sets.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use super::locks::ScopeLocks;
use crate::bus::{EventBus, QueueEvent, RemoveMeta};
use crate::store::{QueueStore, StoreError};
use crate::types::{PrNumber, QueueItem, QueueKey};

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The item is missing a required field.
    #[error("invalid queue item: {0}")]
    InvalidItem(&'static str),

    /// The store failed; nothing was published.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Returns true if the failure means the store is unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, EngineError::Store(e) if e.is_unavailable())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// What [`QueueEngine::add_item`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The item was appended at `index`.
    Added { index: usize },
    /// The PR was already queued in this repository; nothing changed.
    Duplicate,
}

/// What [`QueueEngine::remove_item`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The item was removed.
    Removed { item: QueueItem, meta: RemoveMeta },
    /// The PR was not in the queue; nothing was published.
    NotQueued,
}

/// Orchestrates queue mutations and publishes `item.*` events.
///
/// Every read-then-write sequence runs under the repository's scope lock, so
/// concurrent calls for the same repository cannot both pass the duplicate
/// check or both observe the same head. Events are published after the
/// store has accepted the mutation, while the lock is still held, so
/// subscribers see a repository's events in mutation order.
pub struct QueueEngine<S> {
    store: Arc<S>,
    bus: EventBus,
    locks: Arc<ScopeLocks>,
}

impl<S> Clone for QueueEngine<S> {
    fn clone(&self) -> Self {
        QueueEngine {
            store: Arc::clone(&self.store),
            bus: self.bus.clone(),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S: QueueStore> QueueEngine<S> {
    pub fn new(store: Arc<S>, bus: EventBus) -> Self {
        QueueEngine {
            store,
            bus,
            locks: Arc::new(ScopeLocks::new()),
        }
    }

    /// The bus this engine publishes to.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Appends `item` to the tail of the queue unless the PR is already
    /// queued anywhere in the repository.
    ///
    /// A duplicate is logged and reported as [`AddOutcome::Duplicate`]; it
    /// is not an error and publishes nothing.
    #[instrument(skip(self, item), fields(queue = %key, pr = %item.pull_request_number))]
    pub async fn add_item(&self, key: &QueueKey, item: QueueItem) -> Result<AddOutcome> {
        validate_item(&item)?;

        let scope = key.repo_id();
        let scope_key = scope.scope_key();
        let pr = item.pull_request_number;
        let _guard = self.locks.lock(&scope).await;

        if self.store.is_member(&scope_key, pr).await? {
            warn!("Pull request is already queued; ignoring duplicate enqueue");
            return Ok(AddOutcome::Duplicate);
        }

        self.store.add_member(&scope_key, pr).await?;
        let length = match self.store.append(&key.store_key(), &item).await {
            Ok(length) => length,
            Err(e) => {
                // Keep the membership set consistent with the list.
                if let Err(rollback) = self.store.remove_member(&scope_key, pr).await {
                    error!(error = %rollback, "Failed to roll back membership after append failure");
                }
                return Err(e.into());
            }
        };

        let index = length.saturating_sub(1);
        info!(index, "Added pull request to queue");
        self.bus.publish(QueueEvent::Added {
            key: key.clone(),
            item,
            index,
        });

        Ok(AddOutcome::Added { index })
    }

    /// Removes the PR from the queue and its repository's membership set.
    ///
    /// `meta.closed` is taken from the caller; `meta.first_item_changed` is
    /// computed from the head as it was before the removal. Removing a PR
    /// that is not in this branch's queue is a no-op, even if it is queued
    /// on another branch of the repository.
    #[instrument(skip(self, meta), fields(queue = %key, pr = %pr, closed = meta.closed))]
    pub async fn remove_item(
        &self,
        key: &QueueKey,
        pr: PrNumber,
        meta: RemoveMeta,
    ) -> Result<RemoveOutcome> {
        let scope = key.repo_id();
        let scope_key = scope.scope_key();
        let store_key = key.store_key();
        let _guard = self.locks.lock(&scope).await;

        let items = self.store.read_range(&store_key, None).await?;
        let first_item_changed = items
            .first()
            .is_some_and(|head| head.pull_request_number == pr);
        let Some(item) = items.into_iter().find(|i| i.pull_request_number == pr) else {
            // Membership is repository-wide: the PR may be queued on another
            // branch, so the set is left alone.
            debug!("Pull request not queued; nothing to remove");
            return Ok(RemoveOutcome::NotQueued);
        };

        let removed = self.store.remove_first_match(&store_key, pr).await?;
        self.store.remove_member(&scope_key, pr).await?;
        if !removed {
            return Ok(RemoveOutcome::NotQueued);
        }

        let meta = RemoveMeta {
            closed: meta.closed,
            first_item_changed,
        };
        info!(first_item_changed, "Removed pull request from queue");
        self.bus.publish(QueueEvent::Removed {
            key: key.clone(),
            item: item.clone(),
            meta,
        });

        Ok(RemoveOutcome::Removed { item, meta })
    }

    /// The queue in merge order.
    pub async fn get_items(&self, key: &QueueKey) -> Result<Vec<QueueItem>> {
        Ok(self.store.read_range(&key.store_key(), None).await?)
    }

    /// The first `limit` items in merge order.
    pub async fn get_items_limited(&self, key: &QueueKey, limit: usize) -> Result<Vec<QueueItem>> {
        Ok(self.store.read_range(&key.store_key(), Some(limit)).await?)
    }

    /// The head of the queue, if any.
    pub async fn get_first_item(&self, key: &QueueKey) -> Result<Option<QueueItem>> {
        let mut head = self.store.read_range(&key.store_key(), Some(1)).await?;
        Ok(head.pop())
    }

    pub async fn get_length(&self, key: &QueueKey) -> Result<usize> {
        Ok(self.store.length(&key.store_key()).await?)
    }

    /// Zero-based position of `pr`, found by linear search; `None` if it is
    /// not queued.
    pub async fn position_of(&self, key: &QueueKey, pr: PrNumber) -> Result<Option<usize>> {
        let items = self.get_items(key).await?;
        Ok(items.iter().position(|i| i.pull_request_number == pr))
    }
}

/// Rejects items the webhook layer should never have produced.
fn validate_item(item: &QueueItem) -> Result<()> {
    if item.pull_request_number.0 == 0 {
        return Err(EngineError::InvalidItem("pull_request_number must be positive"));
    }
    if item.username.trim().is_empty() {
        return Err(EngineError::InvalidItem("username must not be empty"));
    }
    Ok(())
}
