//! GitHub commit status client.
//!
//! Implements [`StatusReporter`](crate::clients::StatusReporter) on top of
//! octocrab. Retrying transient API failures happens here, inside the
//! client; the queue core treats every delivery as best-effort.

mod client;
mod error;
mod retry;

pub use client::{GitHubStatusReporter, api_route};
pub use error::{GitHubApiError, GitHubErrorKind, classify};
pub use retry::{RetryConfig, retry_with_backoff};
