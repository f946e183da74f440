//! Commit status values reported for queued pull requests.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::InstallationId;

/// The state of a commit status, as GitHub's status API names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusState {
    Success,
    Failure,
    Pending,
    /// Only ever received from upstream CI; the queue never reports it.
    Error,
}

impl StatusState {
    /// Returns the API string for this state.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            StatusState::Success => "success",
            StatusState::Failure => "failure",
            StatusState::Pending => "pending",
            StatusState::Error => "error",
        }
    }

    /// Returns true if this is a terminal state (not pending).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StatusState::Pending)
    }
}

impl fmt::Display for StatusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

/// Where a status report is sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusTarget {
    pub installation_id: Option<InstallationId>,
    pub status_url: String,
}

/// A derived status for one pull request. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub state: StatusState,
    pub description: String,
    pub target_url: Option<String>,
}

impl StatusReport {
    pub fn new(state: StatusState, description: impl Into<String>) -> Self {
        StatusReport {
            state,
            description: description.into(),
            target_url: None,
        }
    }

    pub fn with_target_url(mut self, target_url: impl Into<String>) -> Self {
        self.target_url = Some(target_url.into());
        self
    }
}
