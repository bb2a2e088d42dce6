//! In-memory fakes for the host and scratch-repo traits (testing only)
//!
//! `MemoryHost` keeps PRs, issues, comments and remote branches in a
//! `Mutex`, serves scripted check runs per branch, and counts every write.
//! `MemoryRepo` tracks local branches and pushes into a shared `MemoryHost`.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{SyncError, SyncResult};
use crate::host::{ModuleHost, ScratchRepo};
use crate::model::{
    BranchDeletion, CheckRun, Issue, NewPullRequest, PullRequest, RateLimit, RemoteState,
};

// ---------------------------------------------------------------------------
// MemoryHost
// ---------------------------------------------------------------------------

/// Check-run responses served for one branch. The last one repeats.
type CheckScript = VecDeque<Option<Vec<CheckRun>>>;

#[derive(Debug, Default)]
struct HostState {
    next_number: u64,
    pulls: Vec<PullRequest>,
    drafts: BTreeSet<u64>,
    issues: Vec<Issue>,
    comments: Vec<(u64, String)>,
    branches: BTreeSet<String>,
    checks: HashMap<String, CheckScript>,
    writes: usize,
    check_fetch_failures: usize,
    fail_pull_creation: bool,
    fail_close_pull: bool,
}

impl HostState {
    fn number(&mut self) -> u64 {
        self.next_number += 1;
        self.next_number
    }
}

/// In-memory source-control host.
#[derive(Debug)]
pub struct MemoryHost {
    base_url: String,
    state: Mutex<HostState>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            base_url: "https://github.test/org/hub".to_string(),
            state: Mutex::new(HostState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed an existing PR.
    pub fn add_pull(&self, title: &str, state: RemoteState, head_ref: &str) -> PullRequest {
        let mut s = self.lock();
        let number = s.number();
        let pr = PullRequest {
            number,
            title: title.to_string(),
            state,
            html_url: format!("{}/pull/{number}", self.base_url),
            head_ref: head_ref.to_string(),
        };
        if state.is_open() {
            s.branches.insert(head_ref.to_string());
        }
        s.pulls.push(pr.clone());
        pr
    }

    /// Seed an open issue.
    pub fn add_issue(&self, title: &str) -> Issue {
        let mut s = self.lock();
        let number = s.number();
        let issue = Issue {
            number,
            title: title.to_string(),
            state: RemoteState::Open,
            html_url: format!("{}/issues/{number}", self.base_url),
        };
        s.issues.push(issue.clone());
        issue
    }

    pub fn add_branch(&self, branch: &str) {
        self.lock().branches.insert(branch.to_string());
    }

    /// Serve `responses` for commits on `branch`, one per poll. `None`
    /// simulates a response without a check-run list.
    pub fn script_checks(&self, branch: &str, responses: Vec<Option<Vec<CheckRun>>>) {
        self.lock()
            .checks
            .insert(branch.to_string(), responses.into_iter().collect());
    }

    /// Make the next `n` check-run fetches fail with a host error.
    pub fn fail_check_fetches(&self, n: usize) {
        self.lock().check_fetch_failures = n;
    }

    pub fn fail_pull_creation(&self) {
        self.lock().fail_pull_creation = true;
    }

    pub fn fail_close_pull(&self) {
        self.lock().fail_close_pull = true;
    }

    pub fn pulls(&self) -> Vec<PullRequest> {
        self.lock().pulls.clone()
    }

    pub fn pull(&self, number: u64) -> Option<PullRequest> {
        self.lock().pulls.iter().find(|p| p.number == number).cloned()
    }

    pub fn is_draft(&self, number: u64) -> bool {
        self.lock().drafts.contains(&number)
    }

    /// Every issue, open or closed.
    pub fn issues(&self) -> Vec<Issue> {
        self.lock().issues.clone()
    }

    pub fn comments_on(&self, number: u64) -> Vec<String> {
        self.lock()
            .comments
            .iter()
            .filter(|(n, _)| *n == number)
            .map(|(_, body)| body.clone())
            .collect()
    }

    pub fn issue_body(&self, number: u64) -> Option<String> {
        self.comments_on(number).into_iter().next()
    }

    pub fn has_branch(&self, branch: &str) -> bool {
        self.lock().branches.contains(branch)
    }

    /// Number of mutating calls served so far.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }
}

#[async_trait]
impl ModuleHost for MemoryHost {
    async fn list_pulls(&self) -> SyncResult<Vec<PullRequest>> {
        Ok(self.lock().pulls.clone())
    }

    async fn list_open_issues(&self) -> SyncResult<Vec<Issue>> {
        Ok(self
            .lock()
            .issues
            .iter()
            .filter(|i| i.state.is_open())
            .cloned()
            .collect())
    }

    async fn create_draft_pull(&self, request: &NewPullRequest) -> SyncResult<PullRequest> {
        let mut s = self.lock();
        s.writes += 1;
        if s.fail_pull_creation {
            return Err(SyncError::Host("422 Validation Failed".to_string()));
        }
        if !s.branches.contains(&request.head) {
            return Err(SyncError::Host(format!(
                "head branch {} does not exist",
                request.head
            )));
        }
        let number = s.number();
        let pr = PullRequest {
            number,
            title: request.title.clone(),
            state: RemoteState::Open,
            html_url: format!("{}/pull/{number}", self.base_url),
            head_ref: request.head.clone(),
        };
        s.drafts.insert(number);
        // The description is kept as the first comment so tests can read it.
        s.comments.push((number, request.body.clone()));
        s.pulls.push(pr.clone());
        Ok(pr)
    }

    async fn latest_commit_sha(&self, pr: &PullRequest) -> SyncResult<String> {
        Ok(format!("sha-{}", pr.head_ref))
    }

    async fn check_runs(&self, sha: &str) -> SyncResult<Option<Vec<CheckRun>>> {
        let mut s = self.lock();
        if s.check_fetch_failures > 0 {
            s.check_fetch_failures -= 1;
            return Err(SyncError::Host("502 Bad Gateway".to_string()));
        }
        let branch = sha.strip_prefix("sha-").unwrap_or(sha);
        let Some(script) = s.checks.get_mut(branch) else {
            return Ok(Some(Vec::new()));
        };
        let response = if script.len() > 1 {
            script.pop_front().flatten()
        } else {
            script.front().cloned().flatten()
        };
        Ok(response)
    }

    async fn comment(&self, number: u64, body: &str) -> SyncResult<()> {
        let mut s = self.lock();
        s.writes += 1;
        s.comments.push((number, body.to_string()));
        Ok(())
    }

    async fn close_pull(&self, number: u64) -> SyncResult<()> {
        let mut s = self.lock();
        s.writes += 1;
        if s.fail_close_pull {
            return Err(SyncError::Host("500 Internal Server Error".to_string()));
        }
        let pr = s
            .pulls
            .iter_mut()
            .find(|p| p.number == number)
            .ok_or_else(|| SyncError::Host(format!("pull {number} not found")))?;
        pr.state = RemoteState::Closed;
        Ok(())
    }

    async fn create_issue(&self, title: &str, body: &str) -> SyncResult<Issue> {
        let mut s = self.lock();
        s.writes += 1;
        let number = s.number();
        let issue = Issue {
            number,
            title: title.to_string(),
            state: RemoteState::Open,
            html_url: format!("{}/issues/{number}", self.base_url),
        };
        s.comments.push((number, body.to_string()));
        s.issues.push(issue.clone());
        Ok(issue)
    }

    async fn close_issue(&self, number: u64) -> SyncResult<()> {
        let mut s = self.lock();
        s.writes += 1;
        let issue = s
            .issues
            .iter_mut()
            .find(|i| i.number == number)
            .ok_or_else(|| SyncError::Host(format!("issue {number} not found")))?;
        issue.state = RemoteState::Closed;
        Ok(())
    }

    async fn delete_branch(&self, branch: &str) -> SyncResult<BranchDeletion> {
        let mut s = self.lock();
        s.writes += 1;
        if s.branches.remove(branch) {
            Ok(BranchDeletion::Deleted)
        } else {
            Ok(BranchDeletion::NotFound)
        }
    }

    async fn rate_limit(&self) -> SyncResult<RateLimit> {
        Ok(RateLimit {
            limit: 5000,
            remaining: 5000,
            reset: 0,
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryRepo
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct RepoState {
    current: String,
    branches: BTreeSet<String>,
    commits: Vec<(String, String)>,
    fail_push: bool,
    fail_restore: bool,
}

/// In-memory local clone that pushes into a [`MemoryHost`].
#[derive(Debug)]
pub struct MemoryRepo {
    host: Arc<MemoryHost>,
    state: Mutex<RepoState>,
}

impl MemoryRepo {
    /// A clone checked out on `default_branch`.
    pub fn new(host: Arc<MemoryHost>, default_branch: &str) -> Self {
        Self {
            host,
            state: Mutex::new(RepoState {
                current: default_branch.to_string(),
                branches: BTreeSet::from([default_branch.to_string()]),
                commits: Vec::new(),
                fail_push: false,
                fail_restore: false,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RepoState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail_push(&self) {
        self.lock().fail_push = true;
    }

    /// Make every `restore` fail, leaving the clone where it is.
    pub fn fail_restore(&self) {
        self.lock().fail_restore = true;
    }

    pub fn current_branch(&self) -> String {
        self.lock().current.clone()
    }

    pub fn has_local_branch(&self, branch: &str) -> bool {
        self.lock().branches.contains(branch)
    }

    /// `(branch, message)` of every commit made.
    pub fn commits(&self) -> Vec<(String, String)> {
        self.lock().commits.clone()
    }
}

impl ScratchRepo for MemoryRepo {
    fn create_branch(&self, branch: &str) -> SyncResult<()> {
        let mut s = self.lock();
        if !s.branches.insert(branch.to_string()) {
            return Err(SyncError::Git(format!("branch {branch} already exists")));
        }
        s.current = branch.to_string();
        Ok(())
    }

    fn commit_all(&self, message: &str) -> SyncResult<()> {
        let mut s = self.lock();
        let branch = s.current.clone();
        s.commits.push((branch, message.to_string()));
        Ok(())
    }

    fn push(&self, branch: &str) -> SyncResult<()> {
        if self.lock().fail_push {
            return Err(SyncError::Git("push rejected".to_string()));
        }
        self.host.add_branch(branch);
        Ok(())
    }

    fn restore(&self, branch: &str) -> SyncResult<()> {
        let mut s = self.lock();
        if s.fail_restore {
            return Err(SyncError::Git("checkout blocked by local changes".to_string()));
        }
        if !s.branches.contains(branch) {
            return Err(SyncError::Git(format!("unknown branch {branch}")));
        }
        s.current = branch.to_string();
        Ok(())
    }

    fn delete_local_branch(&self, branch: &str) -> SyncResult<()> {
        let mut s = self.lock();
        if s.current == branch {
            return Err(SyncError::Git(format!(
                "cannot delete checked-out branch {branch}"
            )));
        }
        s.branches.remove(branch);
        Ok(())
    }
}
