//! Git-backed scratch repository.
//!
//! Shells out to the `git` binary in the local clone of the modules
//! repository. Used by the reconciler to cut, commit and push test branches.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::host::ScratchRepo;

/// A local clone with a named push remote.
#[derive(Debug, Clone)]
pub struct GitWorkspace {
    dir: PathBuf,
    remote: String,
}

impl GitWorkspace {
    /// Open the clone at `dir`. Fails if `dir` is not inside a git work tree.
    pub fn open(dir: impl Into<PathBuf>, remote: impl Into<String>) -> SyncResult<Self> {
        let dir = dir.into();
        if !is_git_repo(&dir) {
            return Err(SyncError::Git(format!(
                "{} is not a git work tree",
                dir.display()
            )));
        }
        Ok(Self {
            dir,
            remote: remote.into(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Name of the checked-out branch.
    pub fn current_branch(&self) -> SyncResult<String> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    /// Whether a local branch named `branch` exists.
    pub fn has_local_branch(&self, branch: &str) -> bool {
        self.git(&["rev-parse", "--verify", "--quiet", &format!("refs/heads/{branch}")])
            .is_ok()
    }

    fn git(&self, args: &[&str]) -> SyncResult<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.dir)
            .output()
            .map_err(|e| SyncError::Git(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SyncError::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl ScratchRepo for GitWorkspace {
    fn create_branch(&self, branch: &str) -> SyncResult<()> {
        debug!(branch, "creating scratch branch");
        self.git(&["checkout", "-b", branch]).map(|_| ())
    }

    fn commit_all(&self, message: &str) -> SyncResult<()> {
        self.git(&["add", "--update"])?;
        self.git(&["commit", "-m", message]).map(|_| ())
    }

    fn push(&self, branch: &str) -> SyncResult<()> {
        debug!(branch, remote = %self.remote, "pushing scratch branch");
        self.git(&["push", "--set-upstream", &self.remote, branch])
            .map(|_| ())
    }

    fn restore(&self, branch: &str) -> SyncResult<()> {
        self.git(&["checkout", "--force", branch]).map(|_| ())
    }

    fn delete_local_branch(&self, branch: &str) -> SyncResult<()> {
        if !self.has_local_branch(branch) {
            return Ok(());
        }
        self.git(&["branch", "-D", branch]).map(|_| ())
    }
}

/// Check whether a directory is inside a git work tree.
pub fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::process::Command as StdCommand;

    fn run_git(repo_dir: &Path, args: &[&str]) -> String {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// A clone on `master` with one tracked file and a bare `origin`.
    fn make_clone() -> (tempfile::TempDir, tempfile::TempDir) {
        let remote = tempfile::tempdir().unwrap();
        run_git(remote.path(), &["init", "--bare", "--quiet"]);

        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init", "--quiet"]);
        run_git(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/master"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        fs::write(dir.path().join("manifest.yml"), "version: 0.0.1\n").unwrap();
        run_git(dir.path(), &["add", "manifest.yml"]);
        run_git(dir.path(), &["commit", "--quiet", "-m", "initial"]);
        run_git(
            dir.path(),
            &["remote", "add", "origin", &remote.path().to_string_lossy()],
        );
        run_git(dir.path(), &["push", "--quiet", "origin", "master"]);
        (dir, remote)
    }

    #[test]
    fn open_fails_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GitWorkspace::open(dir.path(), "origin").is_err());
        assert!(!is_git_repo(dir.path()));
    }

    #[test]
    fn branch_commit_push_restore_delete() {
        let (dir, remote) = make_clone();
        let ws = GitWorkspace::open(dir.path(), "origin").unwrap();
        assert_eq!(ws.current_branch().unwrap(), "master");

        fs::write(dir.path().join("manifest.yml"), "version: 0.0.1\ntimestamp: 1\n").unwrap();
        ws.create_branch("chore-foo-0.0.1-core-2-3-1").unwrap();
        ws.commit_all("chore: bump foo").unwrap();
        ws.push("chore-foo-0.0.1-core-2-3-1").unwrap();

        let remote_branches = run_git(remote.path(), &["branch", "--list"]);
        assert!(remote_branches.contains("chore-foo-0.0.1-core-2-3-1"));

        ws.restore("master").unwrap();
        assert_eq!(ws.current_branch().unwrap(), "master");
        ws.delete_local_branch("chore-foo-0.0.1-core-2-3-1").unwrap();
        assert!(!ws.has_local_branch("chore-foo-0.0.1-core-2-3-1"));
        assert_eq!(
            fs::read_to_string(dir.path().join("manifest.yml")).unwrap(),
            "version: 0.0.1\n"
        );
    }

    #[test]
    fn restore_discards_uncommitted_changes() {
        let (dir, _remote) = make_clone();
        let ws = GitWorkspace::open(dir.path(), "origin").unwrap();
        fs::write(dir.path().join("manifest.yml"), "version: 9.9.9\n").unwrap();
        ws.restore("master").unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("manifest.yml")).unwrap(),
            "version: 0.0.1\n"
        );
    }

    #[test]
    fn delete_missing_local_branch_is_ok() {
        let (dir, _remote) = make_clone();
        let ws = GitWorkspace::open(dir.path(), "origin").unwrap();
        assert!(ws.delete_local_branch("never-created").is_ok());
    }

    #[test]
    fn push_to_missing_remote_fails() {
        let (dir, _remote) = make_clone();
        let ws = GitWorkspace::open(dir.path(), "upstream").unwrap();
        ws.create_branch("scratch").unwrap();
        let err = ws.push("scratch").unwrap_err();
        assert!(matches!(err, SyncError::Git(_)));
    }
}
