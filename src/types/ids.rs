//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of identifiers (e.g., passing an
//! installation ID where a PR number is expected) and own the colon-joined
//! key formats the queue store is addressed with.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A pull request number within a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrNumber(pub u64);

impl fmt::Display for PrNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for PrNumber {
    fn from(n: u64) -> Self {
        PrNumber(n)
    }
}

/// Error returned when a string is not a 40-character hex commit SHA.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid commit SHA: {0:?}")]
pub struct InvalidSha(pub String);

/// A git commit SHA (40 lowercase hex characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sha(String);

impl Sha {
    /// Parses and validates a SHA. Uppercase hex is normalised to lowercase.
    pub fn parse(s: impl AsRef<str>) -> Result<Self, InvalidSha> {
        let s = s.as_ref();
        if s.len() == 40 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Sha(s.to_ascii_lowercase()))
        } else {
            Err(InvalidSha(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a short (7-character) version of the SHA for display.
    pub fn short(&self) -> &str {
        self.0.get(..7).unwrap_or(&self.0)
    }
}

impl fmt::Display for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A GitHub App installation ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallationId(pub u64);

impl fmt::Display for InstallationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A repository identifier (owner/repo format).
///
/// Doubles as the membership scope: PR numbers are unique per repository,
/// so duplicate detection spans every branch queue of the repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        RepoId {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// The store key of the membership set: `owner:repo`.
    pub fn scope_key(&self) -> String {
        format!("{}:{}", self.owner, self.repo)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Identity of one ordered merge queue: (owner, repo, branch).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueKey {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl QueueKey {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, branch: impl Into<String>) -> Self {
        QueueKey {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }

    /// Builds the queue key for `branch` of an existing repository.
    pub fn for_repo(repo: &RepoId, branch: impl Into<String>) -> Self {
        QueueKey::new(repo.owner.clone(), repo.repo.clone(), branch)
    }

    /// The repository (membership scope) this queue belongs to.
    pub fn repo_id(&self) -> RepoId {
        RepoId::new(self.owner.clone(), self.repo.clone())
    }

    /// The store key of the ordered list: `owner:repo:branch`.
    pub fn store_key(&self) -> String {
        format!("{}:{}:{}", self.owner, self.repo, self.branch)
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod pr_number {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn serde_roundtrip(n: u64) {
                let pr = PrNumber(n);
                let json = serde_json::to_string(&pr).unwrap();
                let parsed: PrNumber = serde_json::from_str(&json).unwrap();
                prop_assert_eq!(pr, parsed);
            }

            #[test]
            fn display_format(n: u64) {
                prop_assert_eq!(format!("{}", PrNumber(n)), format!("#{}", n));
            }
        }
    }

    mod sha {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_accepts_hex(s in "[0-9a-fA-F]{40}") {
                let sha = Sha::parse(&s).unwrap();
                prop_assert_eq!(sha.as_str(), s.to_ascii_lowercase());
                prop_assert_eq!(sha.short().len(), 7);
            }

            #[test]
            fn parse_rejects_wrong_length(s in "[0-9a-f]{0,39}") {
                prop_assert!(Sha::parse(&s).is_err());
            }
        }

        #[test]
        fn parse_rejects_non_hex() {
            let err = Sha::parse("g".repeat(40)).unwrap_err();
            assert_eq!(err, InvalidSha("g".repeat(40)));
        }
    }

    mod keys {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn store_keys_are_colon_joined(
                owner in "[a-zA-Z][a-zA-Z0-9-]{0,38}",
                repo in "[a-zA-Z][a-zA-Z0-9_-]{0,99}",
                branch in "[a-z][a-z0-9/-]{0,50}",
            ) {
                let key = QueueKey::new(&owner, &repo, &branch);
                prop_assert_eq!(key.store_key(), format!("{}:{}:{}", owner, repo, branch));
                prop_assert_eq!(key.repo_id().scope_key(), format!("{}:{}", owner, repo));
            }
        }

        #[test]
        fn for_repo_keeps_owner_and_name() {
            let repo = RepoId::new("octocat", "hello");
            let key = QueueKey::for_repo(&repo, "main");
            assert_eq!(key, QueueKey::new("octocat", "hello", "main"));
            assert_eq!(key.to_string(), "octocat/hello@main");
        }
    }
}
