//! Webhook payload parsing.
//!
//! The `X-GitHub-Event` header selects the payload shape. Event types and
//! pull request actions the queue does not care about parse to `Ok(None)`;
//! malformed payloads of a known type are errors.

use serde::Deserialize;
use thiserror::Error;

use super::events::{PullRequestAction, PullRequestEvent, WebhookEvent};
use crate::sync::{ClosedReason, CommitStatusChange};
use crate::types::{InstallationId, PrNumber, PullRequestInfo, RepoId, Sha, StatusState};

#[derive(Debug, Error)]
pub enum ParseError {
    /// The body is not valid JSON or lacks a required field.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid field value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

pub fn parse_webhook(event_type: &str, payload: &[u8]) -> Result<Option<WebhookEvent>, ParseError> {
    match event_type {
        "pull_request" => Ok(parse_pull_request(payload)?.map(WebhookEvent::PullRequest)),
        "status" => Ok(Some(WebhookEvent::Status(parse_status(payload)?))),
        "ping" => Ok(Some(WebhookEvent::Ping)),
        _ => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    owner: RawUser,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawInstallation {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    action: String,
    pull_request: RawPullRequest,
    repository: RawRepository,
    installation: Option<RawInstallation>,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    title: String,
    html_url: String,
    statuses_url: String,
    user: RawUser,
    #[serde(default)]
    assignees: Vec<RawUser>,
    merged: Option<bool>,
    merged_by: Option<RawUser>,
    head: RawRef,
    base: RawRef,
}

#[derive(Debug, Deserialize)]
struct RawRef {
    sha: Option<String>,
    #[serde(rename = "ref")]
    ref_name: String,
}

fn parse_sha(field: &'static str, value: Option<String>) -> Result<Sha, ParseError> {
    let value = value.unwrap_or_default();
    Sha::parse(&value).map_err(|_| ParseError::InvalidField { field, value })
}

fn parse_pull_request(payload: &[u8]) -> Result<Option<PullRequestEvent>, ParseError> {
    let raw: RawPullRequestPayload = serde_json::from_slice(payload)?;
    let pr = raw.pull_request;

    let action = match raw.action.as_str() {
        "opened" => PullRequestAction::Opened,
        "reopened" => PullRequestAction::Reopened,
        "synchronize" => PullRequestAction::Synchronize,
        "closed" if pr.merged.unwrap_or(false) => PullRequestAction::Closed(ClosedReason::Merged {
            // A merge through the API may not report who merged it.
            by: pr
                .merged_by
                .as_ref()
                .map_or_else(|| pr.user.login.clone(), |u| u.login.clone()),
        }),
        "closed" => PullRequestAction::Closed(ClosedReason::NotMerged),
        _ => return Ok(None),
    };

    let info = PullRequestInfo {
        repo: RepoId::new(raw.repository.owner.login, raw.repository.name),
        pull_request_number: PrNumber(pr.number),
        status_url: pr.statuses_url,
        installation_id: raw.installation.map(|i| InstallationId(i.id)),
        branch: pr.base.ref_name,
        title: pr.title,
        author: pr.user.login,
        human_url: pr.html_url,
        assignees: pr.assignees.into_iter().map(|u| u.login).collect(),
        sha: parse_sha("pull_request.head.sha", pr.head.sha)?,
    };

    Ok(Some(PullRequestEvent { action, info }))
}

#[derive(Debug, Deserialize)]
struct RawStatusPayload {
    sha: String,
    state: String,
    context: String,
    repository: RawRepository,
}

fn parse_status(payload: &[u8]) -> Result<CommitStatusChange, ParseError> {
    let raw: RawStatusPayload = serde_json::from_slice(payload)?;

    let state = match raw.state.as_str() {
        "pending" => StatusState::Pending,
        "success" => StatusState::Success,
        "failure" => StatusState::Failure,
        "error" => StatusState::Error,
        other => {
            return Err(ParseError::InvalidField {
                field: "state",
                value: other.to_string(),
            });
        }
    };

    Ok(CommitStatusChange {
        repo: RepoId::new(raw.repository.owner.login, raw.repository.name),
        sha: parse_sha("sha", Some(raw.sha))?,
        state,
        context: raw.context,
    })
}
