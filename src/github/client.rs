//! Commit status reporting through the GitHub REST API.

use std::future::Future;

use octocrab::Octocrab;
use serde::Serialize;
use tracing::{debug, instrument};

use super::error::GitHubApiError;
use super::retry::{RetryConfig, retry_with_backoff};
use crate::clients::{self, StatusReporter};
use crate::types::{StatusReport, StatusTarget};

/// GitHub truncates longer status descriptions.
const MAX_DESCRIPTION_LEN: usize = 140;

#[derive(Debug, Serialize)]
struct CreateStatusRequest<'a> {
    state: &'static str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_url: Option<&'a str>,
    context: &'a str,
}

/// Posts commit statuses with octocrab, retrying transient failures.
#[derive(Clone)]
pub struct GitHubStatusReporter {
    client: Octocrab,
    context: String,
    retry: RetryConfig,
}

impl GitHubStatusReporter {
    pub fn new(client: Octocrab, context: impl Into<String>) -> Self {
        GitHubStatusReporter {
            client,
            context: context.into(),
            retry: RetryConfig::DEFAULT,
        }
    }

    pub fn from_token(
        token: impl Into<String>,
        context: impl Into<String>,
    ) -> Result<Self, octocrab::Error> {
        let client = Octocrab::builder().personal_token(token.into()).build()?;
        Ok(Self::new(client, context))
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    #[instrument(skip(self, report), fields(url = %target.status_url, state = %report.state))]
    async fn post_status(
        &self,
        target: &StatusTarget,
        report: &StatusReport,
    ) -> Result<(), GitHubApiError> {
        let route = api_route(&target.status_url)?;
        let body = CreateStatusRequest {
            state: report.state.as_api_str(),
            description: truncate(&report.description, MAX_DESCRIPTION_LEN),
            target_url: report.target_url.as_deref(),
            context: &self.context,
        };
        if let Some(installation) = target.installation_id {
            debug!(%installation, "Posting status for installation");
        }

        let body = &body;
        retry_with_backoff(self.retry, "create_commit_status", || async move {
            let result: Result<serde_json::Value, _> = self.client.post(route, Some(body)).await;
            result.map(|_| ()).map_err(GitHubApiError::from_octocrab)
        })
        .await
    }
}

impl StatusReporter for GitHubStatusReporter {
    fn report(
        &self,
        target: &StatusTarget,
        report: &StatusReport,
    ) -> impl Future<Output = clients::Result<()>> + Send {
        async move { Ok(self.post_status(target, report).await?) }
    }
}

impl std::fmt::Debug for GitHubStatusReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubStatusReporter")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Reduces a statuses URL from a webhook payload to an API route relative to
/// the client's base URI, so GitHub Enterprise prefixes are dropped.
pub fn api_route(status_url: &str) -> Result<&str, GitHubApiError> {
    status_url
        .find("/repos/")
        .map(|idx| &status_url[idx..])
        .ok_or_else(|| GitHubApiError::permanent(format!("not a statuses URL: {status_url}")))
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
