//! Run configuration.
//!
//! [`Settings`] is built once at startup (by the CLI, from flags and
//! environment variables) and passed by reference to every component.
//! Nothing in the core reads the environment on its own.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// How much of the core version distinguishes separate compatibility tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonLevel {
    Major,
    Minor,
    Patch,
}

impl ComparisonLevel {
    pub const ALL: [ComparisonLevel; 3] = [Self::Major, Self::Minor, Self::Patch];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
        }
    }
}

impl fmt::Display for ComparisonLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComparisonLevel {
    type Err = SyncError;

    fn from_str(s: &str) -> SyncResult<Self> {
        match s.trim() {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            other => Err(SyncError::Config(format!(
                "comparison level must be one of major, minor, patch (got '{other}')"
            ))),
        }
    }
}

/// Timing of the batch convergence loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Sleep before the first pass; checks need time to register after a push.
    pub grace: Duration,
    /// Sleep between passes while entries are still pending.
    pub interval: Duration,
    /// Number of passes after which pending entries are abandoned.
    /// `None` polls until every entry is terminal.
    pub max_cycles: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(120),
            interval: Duration::from_secs(5 * 60),
            max_cycles: None,
        }
    }
}

/// Immutable configuration for one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Modules repository on the host, as `owner/name`.
    pub repo: String,
    /// Access token for the host. Never logged.
    #[serde(skip_serializing)]
    pub token: String,
    pub comparison_level: ComparisonLevel,
    /// Retry modules that already have an open fix-issue.
    pub test_again: bool,
    /// Free text appended to fix-issue bodies (e.g. `@org/maintainers`).
    pub tag_in_issues: String,
    /// Local clone of the modules repository.
    pub modules_dir: PathBuf,
    pub default_branch: String,
    pub remote: String,
    /// Display name of the core library in titles and bodies.
    pub core_name: String,
    /// Package name pinned in module requirement files.
    pub core_package: String,
    pub poll: PollPolicy,
}

impl Settings {
    /// Settings with the historical defaults for everything optional.
    pub fn new(
        repo: impl Into<String>,
        token: impl Into<String>,
        comparison_level: ComparisonLevel,
        test_again: bool,
    ) -> Self {
        Self {
            repo: repo.into(),
            token: token.into(),
            comparison_level,
            test_again,
            tag_in_issues: String::new(),
            modules_dir: PathBuf::from("hub_repo"),
            default_branch: "master".to_string(),
            remote: "origin".to_string(),
            core_name: "jina".to_string(),
            core_package: "jina".to_string(),
            poll: PollPolicy::default(),
        }
    }

    /// Reject settings that would make the run fail half-way.
    pub fn validate(&self) -> SyncResult<()> {
        let parts: Vec<&str> = self.repo.split('/').collect();
        if parts.len() != 2 || parts.iter().any(|p| p.trim().is_empty()) {
            return Err(SyncError::Config(format!(
                "repository must be given as owner/name (got '{}')",
                self.repo
            )));
        }
        if self.token.trim().is_empty() {
            return Err(SyncError::Config("access token must be set".to_string()));
        }
        if self.default_branch.trim().is_empty() {
            return Err(SyncError::Config(
                "default branch must not be empty".to_string(),
            ));
        }
        if self.core_package.trim().is_empty() {
            return Err(SyncError::Config(
                "core package name must not be empty".to_string(),
            ));
        }
        if self.poll.max_cycles == Some(0) {
            return Err(SyncError::Config(
                "max poll cycles must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
