//! Merge Queue - a per-branch merge queue for GitHub pull requests.
//!
//! Pull requests are booked into a FIFO queue per base branch when they are
//! opened and leave it when they are closed or merged. Every queued PR
//! carries a commit status reflecting its position, so only the head of a
//! queue is ever mergeable.
//!
//! # Modules
//!
//! - [`engine`]: the queue itself, publishing `item.add` / `item.remove`
//! - [`bus`]: topic-based event fan-out to side-effect handlers
//! - [`sync`]: PR lifecycle handling and position-to-status projection
//! - [`handlers`]: notifications, metrics and snapshot broadcasts
//! - [`server`]: webhook intake and the queue HTTP API

pub mod bus;
pub mod clients;
pub mod config;
pub mod engine;
pub mod github;
pub mod handlers;
pub mod server;
pub mod store;
pub mod sync;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub mod test_utils;
