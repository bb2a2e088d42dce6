//! Per-module reconciliation: create, reuse or skip the test PR.
//!
//! | existing PR | state  | decision |
//! |-------------|--------|----------|
//! | none        |        | create   |
//! | found       | open   | reuse    |
//! | found       | closed | skip     |
//!
//! Creating cuts a scratch branch in the local clone. Whatever happens, the
//! clone is restored to the default branch and the local scratch branch is
//! deleted afterwards; on failure the remote branch is deleted too.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::{SyncError, SyncResult};
use crate::host::{ModuleHost, ScratchRepo};
use crate::identity::{branch_name, CoreVersion, IdentityKey};
use crate::lookup::find_pr;
use crate::manifest;
use crate::model::{BranchDeletion, ModuleRecord, NewPullRequest, PullRequest, TrackedPr};

/// What to do with one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "pr")]
pub enum Decision {
    Create,
    /// A previous run left this PR open; poll it again.
    Reuse(PullRequest),
    /// This test already ran to completion.
    Skip(PullRequest),
}

/// Apply the decision table to the PR snapshot.
pub fn decide(identity: &IdentityKey, prs: &[PullRequest]) -> Decision {
    match find_pr(identity, prs) {
        None => Decision::Create,
        Some(pr) if pr.state.is_open() => Decision::Reuse(pr.clone()),
        Some(pr) => Decision::Skip(pr.clone()),
    }
}

/// Drives one module to an in-flight PR, or to nothing.
pub struct Reconciler<'a> {
    settings: &'a Settings,
    host: &'a dyn ModuleHost,
    repo: &'a dyn ScratchRepo,
    core: &'a CoreVersion,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        settings: &'a Settings,
        host: &'a dyn ModuleHost,
        repo: &'a dyn ScratchRepo,
        core: &'a CoreVersion,
    ) -> Self {
        Self {
            settings,
            host,
            repo,
            core,
        }
    }

    /// Reconcile `module` against the PR snapshot.
    ///
    /// Returns the PR to poll, or `None` when the module was already tested.
    pub async fn reconcile(
        &self,
        module: &ModuleRecord,
        prs: &[PullRequest],
    ) -> SyncResult<Option<TrackedPr>> {
        let identity = IdentityKey::for_module(module, self.core, self.settings);
        info!(module = %module.name, version = %module.version, "reconciling module");

        match decide(&identity, prs) {
            Decision::Create => self.create(module, identity).await.map(Some),
            Decision::Reuse(pr) => {
                info!(
                    module = %module.name,
                    pr = %pr.html_url,
                    "PR left open by a previous run, resuming it"
                );
                Ok(Some(TrackedPr {
                    identity,
                    module: module.name.clone(),
                    branch: pr.head_ref.clone(),
                    pr,
                }))
            }
            Decision::Skip(pr) => {
                info!(
                    module = %module.name,
                    core = %self.core,
                    pr = %pr.html_url,
                    "module already tested on this core version, skipping"
                );
                Ok(None)
            }
        }
    }

    async fn create(&self, module: &ModuleRecord, identity: IdentityKey) -> SyncResult<TrackedPr> {
        let branch = branch_name(&module.name, &module.version, self.core);
        let result = self.open_pull(module, &identity, &branch).await;

        let default_branch = &self.settings.default_branch;
        let restored = self.repo.restore(default_branch);
        if let Err(e) = self.repo.delete_local_branch(&branch) {
            warn!(module = %module.name, branch = %branch, error = %e, "failed to delete local scratch branch");
        }

        let outcome = match result {
            Ok(pr) => Ok(TrackedPr {
                identity,
                module: module.name.clone(),
                branch: branch.clone(),
                pr,
            }),
            Err(e) => {
                match self.host.delete_branch(&branch).await {
                    Ok(BranchDeletion::Deleted) => {
                        info!(module = %module.name, branch = %branch, "deleted remote scratch branch after failure")
                    }
                    Ok(BranchDeletion::NotFound) => {}
                    Err(del) => {
                        warn!(module = %module.name, branch = %branch, error = %del, "failed to delete remote scratch branch")
                    }
                }
                Err(e)
            }
        };

        if let Err(e) = restored {
            if let Ok(tracked) = &outcome {
                warn!(
                    module = %module.name,
                    pr = %tracked.pr.html_url,
                    "PR stays open until a later run resumes it"
                );
            }
            return Err(SyncError::Restore {
                branch: default_branch.clone(),
                reason: e.to_string(),
            });
        }
        outcome
    }

    async fn open_pull(
        &self,
        module: &ModuleRecord,
        identity: &IdentityKey,
        branch: &str,
    ) -> SyncResult<PullRequest> {
        let timestamp = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        manifest::stamp_manifest(&module.manifest_path, timestamp)?;
        if manifest::pin_core_version(
            &module.pin_path,
            &self.settings.core_package,
            self.core.as_str(),
        )? {
            info!(module = %module.name, core = %self.core, "pinned core version in requirements");
        }

        // A branch without a PR means the PR was renamed or deleted by hand.
        if self.host.delete_branch(branch).await? == BranchDeletion::Deleted {
            warn!(module = %module.name, branch, "stale remote branch existed and was deleted");
        }

        self.repo.create_branch(branch)?;
        self.repo.commit_all(&format!("chore: bump {}", module.name))?;
        self.repo.push(branch)?;

        let request = NewPullRequest {
            title: identity.title(),
            body: format!(
                "Due to the release of {} core v{}, this draft PR is created in order to \
                 trigger an automatic build & push of the module",
                self.settings.core_name, self.core
            ),
            head: branch.to_string(),
            base: self.settings.default_branch.clone(),
        };
        let pr = self.host.create_draft_pull(&request).await?;
        info!(module = %module.name, pr = %pr.html_url, "opened draft PR");
        Ok(pr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ComparisonLevel;
    use crate::model::RemoteState;

    fn identity() -> IdentityKey {
        IdentityKey::derive(
            "Foo",
            "0.1.0",
            &CoreVersion::parse("2.3.1").unwrap(),
            ComparisonLevel::Minor,
            "jina",
        )
    }

    fn pr(title: &str, state: RemoteState) -> PullRequest {
        PullRequest {
            number: 11,
            title: title.to_string(),
            state,
            html_url: "https://example.test/pull/11".to_string(),
            head_ref: "chore-foo-0.1.0-core-2-3-0".to_string(),
        }
    }

    #[test]
    fn test_decide_create_when_absent() {
        let prs = vec![pr("unrelated", RemoteState::Open)];
        assert_eq!(decide(&identity(), &prs), Decision::Create);
        assert_eq!(decide(&identity(), &[]), Decision::Create);
    }

    #[test]
    fn test_decide_reuse_when_open() {
        let open = pr(&identity().title(), RemoteState::Open);
        assert_eq!(
            decide(&identity(), std::slice::from_ref(&open)),
            Decision::Reuse(open)
        );
    }

    #[test]
    fn test_decide_skip_when_closed() {
        let closed = pr(&identity().title(), RemoteState::Closed);
        assert_eq!(
            decide(&identity(), std::slice::from_ref(&closed)),
            Decision::Skip(closed)
        );
    }

    #[test]
    fn test_decide_serializes_with_action_tag() {
        let json = serde_json::to_value(Decision::Create).unwrap();
        assert_eq!(json["action"], "create");
    }
}
