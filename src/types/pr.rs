//! Pull request addressing info.

use serde::{Deserialize, Serialize};

use super::ids::{InstallationId, PrNumber, RepoId, Sha};
use super::status::StatusTarget;

/// What the synchronizer needs to know about a pull request to report its
/// status: where to post it and who to address.
///
/// Owned by the PR-info collaborator; the queue engine never reads or
/// mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub repo: RepoId,

    pub pull_request_number: PrNumber,

    /// The commit statuses URL of the PR's current head commit.
    pub status_url: String,

    pub installation_id: Option<InstallationId>,

    /// The base branch, i.e. which queue of the repository the PR belongs to.
    pub branch: String,

    pub title: String,

    pub author: String,

    /// The PR's web page.
    pub human_url: String,

    pub assignees: Vec<String>,

    /// The PR's current head commit.
    pub sha: Sha,
}

impl PullRequestInfo {
    /// The status target derived from (installation, statuses URL).
    pub fn status_target(&self) -> StatusTarget {
        StatusTarget {
            installation_id: self.installation_id,
            status_url: self.status_url.clone(),
        }
    }
}
