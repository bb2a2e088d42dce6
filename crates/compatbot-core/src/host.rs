//! Seams to the outside world.
//!
//! [`ModuleHost`] is the source-control host holding PRs, issues and check
//! runs; [`ScratchRepo`] is the local clone in which test branches are cut.
//! Implement them for real backends, or use the in-memory versions in
//! [`crate::fakes`] for tests.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::SyncResult;
use crate::model::{BranchDeletion, CheckRun, Issue, NewPullRequest, PullRequest, RateLimit};

/// Remote host of the modules repository.
#[async_trait]
pub trait ModuleHost: Send + Sync {
    /// Every PR of the repository, open and closed.
    async fn list_pulls(&self) -> SyncResult<Vec<PullRequest>>;

    /// Every open issue of the repository (PRs excluded).
    async fn list_open_issues(&self) -> SyncResult<Vec<Issue>>;

    async fn create_draft_pull(&self, request: &NewPullRequest) -> SyncResult<PullRequest>;

    /// SHA of the most recently authored commit on the PR.
    async fn latest_commit_sha(&self, pr: &PullRequest) -> SyncResult<String>;

    /// Check runs for `sha`, or `None` when the response lacked the
    /// check-run list.
    async fn check_runs(&self, sha: &str) -> SyncResult<Option<Vec<CheckRun>>>;

    /// Comment on an issue or PR (they share a number space).
    async fn comment(&self, number: u64, body: &str) -> SyncResult<()>;

    async fn close_pull(&self, number: u64) -> SyncResult<()>;

    async fn create_issue(&self, title: &str, body: &str) -> SyncResult<Issue>;

    async fn close_issue(&self, number: u64) -> SyncResult<()>;

    /// Delete a remote branch. Absence is reported, not an error.
    async fn delete_branch(&self, branch: &str) -> SyncResult<BranchDeletion>;

    async fn rate_limit(&self) -> SyncResult<RateLimit>;
}

/// Local clone of the modules repository.
pub trait ScratchRepo: Send + Sync {
    /// Create `branch` at the current HEAD and check it out.
    fn create_branch(&self, branch: &str) -> SyncResult<()>;

    /// Stage every tracked change and commit it.
    fn commit_all(&self, message: &str) -> SyncResult<()>;

    /// Push `branch` to the remote and set its upstream.
    fn push(&self, branch: &str) -> SyncResult<()>;

    /// Force-checkout `branch`, discarding uncommitted changes to tracked files.
    fn restore(&self, branch: &str) -> SyncResult<()>;

    /// Force-delete a local branch. Absence is not an error.
    fn delete_local_branch(&self, branch: &str) -> SyncResult<()>;
}

/// Log the host's remaining API budget. Advisory only; errors are logged.
pub async fn log_rate_limit(host: &dyn ModuleHost) {
    match host.rate_limit().await {
        Ok(rl) => info!(rate_limit = %rl, "host rate limit"),
        Err(e) => warn!(error = %e, "could not read host rate limit"),
    }
}
