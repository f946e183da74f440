//! Merge queue engine.
//!
//! Owns every mutation of the queue lists and membership sets held in a
//! [`QueueStore`](crate::store::QueueStore), and announces each committed
//! mutation on the [`EventBus`](crate::bus::EventBus).
//!
//! # Concurrency
//!
//! The store gives no check-then-act atomicity, so the engine takes an
//! async mutex per repository before any duplicate check or head read.
//! Locking per repository rather than per branch queue also covers the
//! membership set, which all branch queues of a repository share.
//!
//! # Module Structure
//!
//! - [`queue`]: the engine and its outcomes
//! - [`locks`]: lazily created per-repository mutexes

mod locks;
mod queue;


pub use queue::{AddOutcome, EngineError, QueueEngine, RemoveOutcome, Result};
