//! Domain model: modules on disk and the host-owned resources that track them.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::identity::IdentityKey;

/// A versioned module discovered in the modules repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Directory name holding the manifest, e.g. `DeepSegmenter`.
    pub name: String,
    /// `version` field of the manifest.
    pub version: String,
    pub manifest_path: PathBuf,
    /// `requirements.txt` next to the manifest. May not exist.
    pub pin_path: PathBuf,
}

/// Remote lifecycle state of a PR or issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteState {
    Open,
    Closed,
}

impl RemoteState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for RemoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Handle to a pull request on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub state: RemoteState,
    pub html_url: String,
    /// Source branch of the PR.
    pub head_ref: String,
}

/// Handle to an issue on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub state: RemoteState,
    pub html_url: String,
}

/// Request body for a new draft PR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

/// One named CI check attached to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRun {
    pub name: String,
    /// `queued`, `in_progress` or `completed`.
    pub status: String,
    /// Set once `status` is `completed`, e.g. `success` or `failure`.
    pub conclusion: Option<String>,
}

impl CheckRun {
    pub fn new(
        name: impl Into<String>,
        status: impl Into<String>,
        conclusion: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
            conclusion: conclusion.map(str::to_string),
        }
    }

    pub fn completed(name: impl Into<String>, conclusion: &str) -> Self {
        Self::new(name, "completed", Some(conclusion))
    }

    /// `(name, status, conclusion)` tuple as quoted in fix-issues.
    pub fn tuple(&self) -> String {
        format!(
            "('{}', '{}', {})",
            self.name,
            self.status,
            self.conclusion
                .as_deref()
                .map(|c| format!("'{c}'"))
                .unwrap_or_else(|| "None".to_string())
        )
    }
}

/// Tri-state CI verdict for one commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckVerdict {
    Pending,
    Passed,
    Failed,
}

impl CheckVerdict {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Outcome of deleting a remote branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchDeletion {
    Deleted,
    /// The branch did not exist (already deleted or never pushed).
    NotFound,
}

/// Host API budget, logged before chatty operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    /// Unix seconds at which the budget resets.
    pub reset: i64,
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reset = chrono::DateTime::from_timestamp(self.reset, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| self.reset.to_string());
        write!(f, "{}/{} (resets {})", self.remaining, self.limit, reset)
    }
}

/// An in-flight PR being driven to a terminal outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedPr {
    pub identity: IdentityKey,
    pub module: String,
    pub branch: String,
    pub pr: PullRequest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_run_tuple_formats_missing_conclusion() {
        let run = CheckRun::new("build", "in_progress", None);
        assert_eq!(run.tuple(), "('build', 'in_progress', None)");
        let run = CheckRun::completed("lint", "failure");
        assert_eq!(run.tuple(), "('lint', 'completed', 'failure')");
    }

    #[test]
    fn test_verdict_terminality() {
        assert!(!CheckVerdict::Pending.is_terminal());
        assert!(CheckVerdict::Passed.is_terminal());
        assert!(CheckVerdict::Failed.is_terminal());
    }

    #[test]
    fn test_rate_limit_display() {
        let rl = RateLimit {
            limit: 5000,
            remaining: 4321,
            reset: 0,
        };
        let shown = rl.to_string();
        assert!(shown.starts_with("4321/5000"));
        assert!(shown.contains("1970-01-01"));
    }

    #[test]
    fn test_remote_state_serde() {
        let json = serde_json::to_string(&RemoteState::Closed).unwrap();
        assert_eq!(json, "\"closed\"");
    }
}
