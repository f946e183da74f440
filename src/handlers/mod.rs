//! Side-effect handlers driven by the event bus.
//!
//! Each handler subscribes independently and runs detached from the
//! publisher. Failures are logged and never reach the queue mutation that
//! triggered them.
//!
//! # Module Structure
//!
//! - [`notify`]: head-of-queue and checks-completed notifications
//! - [`metrics`]: mutation counters and the queue length gauge
//! - [`broadcast`]: full queue snapshots for real-time consumers

pub mod broadcast;
pub mod metrics;
pub mod notify;

pub use broadcast::BroadcastHandler;
pub use metrics::MetricsReporter;
pub use notify::{DEFAULT_CHECKS_DEBOUNCE, NotificationDispatcher};
