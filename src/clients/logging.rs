//! Collaborators that only log.
//!
//! Used when the service runs without credentials for the real backends
//! (dry-run mode): every side effect becomes a tracing event.

use std::future::Future;

use tracing::{debug, info};

use super::{MetricsSink, Notifier, Result, StatusReporter};
use crate::types::{PrNumber, QueueKey, StatusReport, StatusState, StatusTarget};

/// Logs status reports instead of posting them.
#[derive(Debug, Clone, Default)]
pub struct LoggingStatusReporter;

impl StatusReporter for LoggingStatusReporter {
    fn report(
        &self,
        target: &StatusTarget,
        report: &StatusReport,
    ) -> impl Future<Output = Result<()>> + Send {
        info!(
            status_url = %target.status_url,
            state = %report.state,
            description = %report.description,
            "Status report (not sent)"
        );
        async { Ok(()) }
    }
}

/// Logs notifications instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify_head_of_queue(
        &self,
        key: &QueueKey,
        pr: PrNumber,
        username: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        info!(queue = %key, pr = %pr, username, "Notification: first in queue");
        async { Ok(()) }
    }

    fn notify_checks_completed(
        &self,
        key: &QueueKey,
        pr: PrNumber,
        username: &str,
        state: StatusState,
    ) -> impl Future<Output = Result<()>> + Send {
        info!(queue = %key, pr = %pr, username, %state, "Notification: checks completed");
        async { Ok(()) }
    }
}

/// Emits metrics as debug events on the `merge_queue::metrics` target.
#[derive(Debug, Clone, Default)]
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn increment(&self, name: &str, tags: &[(&str, &str)]) {
        debug!(target: "merge_queue::metrics", metric = name, ?tags, "counter +1");
    }

    fn gauge(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        debug!(target: "merge_queue::metrics", metric = name, value, ?tags, "gauge");
    }
}
