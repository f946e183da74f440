//! In-process event bus.
//!
//! Connects the queue engine to its side effects. The engine publishes a
//! [`QueueEvent`] only after the store mutation has committed; subscribers
//! (status resync, notifications, metrics, broadcast) each run detached and
//! independently, so none of them can delay or undo the mutation.
//!
//! # Topics
//!
//! | topic | payload |
//! |-------|---------|
//! | `item.add` | [`QueueEvent::Added`] |
//! | `item.remove` | [`QueueEvent::Removed`] |
//! | `head.checks.completed` | [`HeadChecksCompleted`] |
//! | `status.report.ko` | [`DeliveryFailure`] |
//! | `notification.sent.ko` | [`DeliveryFailure`] |
//!
//! # Module Structure
//!
//! - [`event`]: event payloads and topic names
//! - [`topic`]: wildcard pattern matching
//! - [`registry`]: subscriber registry and detached dispatch

pub mod event;
pub mod registry;
pub mod topic;

pub use event::{
    BusEvent, DeliveryFailure, FailedEffect, HeadChecksCompleted, QueueEvent, RemoveMeta,
};
pub use registry::{EventBus, HandlerError, HandlerFuture, SubscriptionId};
pub use topic::topic_matches;
