//! Queue storage collaborator.
//!
//! The queue engine is written against [`QueueStore`]: ordered-list and
//! membership-set primitives addressed by colon-joined string keys
//! (`owner:repo:branch` for lists, `owner:repo` for membership sets).
//!
//! # Atomicity
//!
//! A store serialises conflicting writes to the *same* key, but gives no
//! guarantee across keys and no check-then-act atomicity. Callers that read
//! and then write (duplicate check before append, head read before remove)
//! must provide their own mutual exclusion; see [`crate::engine`].
//!
//! # Module Structure
//!
//! - [`memory`]: in-process store, optionally persisted to a JSON snapshot
//! - [`snapshot`]: atomic snapshot file writes

use std::future::Future;
use std::io;

use thiserror::Error;

use crate::types::{PrNumber, QueueItem};

pub mod memory;
pub mod snapshot;

pub use memory::MemoryStore;

/// Errors surfaced by a queue store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store cannot be reached. Callers should report the
    /// service as unavailable rather than retry in-process.
    #[error("queue store unavailable: {0}")]
    Unavailable(String),

    /// IO error while persisting store state.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Store contents could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Persisted snapshot has an unsupported schema.
    #[error("schema version mismatch: expected {expected}, got {got}")]
    SchemaMismatch { expected: u32, got: u32 },
}

impl StoreError {
    /// Returns true if the error means the store is unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// List and set primitives the queue engine is built on.
///
/// Every operation is asynchronous I/O from the engine's point of view.
/// Operations on absent keys behave as on empty lists/sets and never fail.
pub trait QueueStore: Send + Sync + 'static {
    /// Returns true if `pr` is in the membership set `scope`.
    fn is_member(&self, scope: &str, pr: PrNumber) -> impl Future<Output = Result<bool>> + Send;

    /// Adds `pr` to the membership set `scope`.
    fn add_member(&self, scope: &str, pr: PrNumber) -> impl Future<Output = Result<()>> + Send;

    /// Removes `pr` from the membership set `scope`.
    fn remove_member(&self, scope: &str, pr: PrNumber)
    -> impl Future<Output = Result<()>> + Send;

    /// Appends `item` to the list `key`, returning the new list length.
    fn append(&self, key: &str, item: &QueueItem) -> impl Future<Output = Result<usize>> + Send;

    /// Removes the first entry of `key` whose PR number is `pr`.
    ///
    /// Returns whether an entry was removed.
    fn remove_first_match(
        &self,
        key: &str,
        pr: PrNumber,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Reads the list `key` in order, truncated to `limit` entries if given.
    fn read_range(
        &self,
        key: &str,
        limit: Option<usize>,
    ) -> impl Future<Output = Result<Vec<QueueItem>>> + Send;

    /// Returns the length of the list `key`.
    fn length(&self, key: &str) -> impl Future<Output = Result<usize>> + Send;
}
