//! Top-level batch run.
//!
//! Lists PRs and open issues once, reconciles every module against that
//! snapshot, then converges the resulting worklist. One failing module never
//! aborts the run.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::Settings;
use crate::converge::BatchConvergence;
use crate::error::{SyncError, SyncResult};
use crate::host::{log_rate_limit, ModuleHost, ScratchRepo};
use crate::identity::{branch_name, CoreVersion, IdentityKey};
use crate::lookup::{find_open_issue, modules_with_open_issues};
use crate::manifest::discover_modules;
use crate::model::ModuleRecord;
use crate::reconcile::{decide, Decision, Reconciler};
use crate::report::{BatchReport, ReportEntry};
use crate::resolve::OutcomeResolver;

pub struct BatchRunner<'a> {
    settings: &'a Settings,
    host: &'a dyn ModuleHost,
    repo: &'a dyn ScratchRepo,
    core: &'a CoreVersion,
}

impl<'a> BatchRunner<'a> {
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

    /// Discover the modules under `settings.modules_dir` and run them all.
    pub async fn run_all(&self) -> SyncResult<BatchReport> {
        let modules = discover_modules(&self.settings.modules_dir)?;
        self.run(&modules).await
    }

    /// Reconcile `modules` and converge the PRs left in flight.
    ///
    /// Listing failures are fatal (nothing has been written yet); everything
    /// after that is isolated per module.
    pub async fn run(&self, modules: &[ModuleRecord]) -> SyncResult<BatchReport> {
        info!(
            repo = %self.settings.repo,
            core = %self.core,
            level = %self.settings.comparison_level,
            modules = modules.len(),
            "starting batch"
        );
        log_rate_limit(self.host).await;

        let open_issues = self.host.list_open_issues().await?;
        info!(
            modules = ?modules_with_open_issues(&open_issues),
            "modules with open fix-issues"
        );
        let prs = self.host.list_pulls().await?;
        info!(count = prs.len(), "fetched PR snapshot");

        let reconciler = Reconciler::new(self.settings, self.host, self.repo, self.core);
        let mut report = BatchReport::default();
        let mut worklist = Vec::new();

        let mut halted: Option<String> = None;
        for module in modules {
            if let Some(reason) = &halted {
                report.errored.push(
                    ReportEntry::new(&module.name).with_detail(format!("not attempted: {reason}")),
                );
                continue;
            }
            log_rate_limit(self.host).await;
            let blocking = (!self.settings.test_again)
                .then(|| find_open_issue(&module.name, &open_issues))
                .flatten();
            if let Some(issue) = blocking {
                info!(
                    module = %module.name,
                    issue = %issue.html_url,
                    "open fix-issue for module, skipping"
                );
                report
                    .skipped
                    .push(ReportEntry::new(&module.name).with_detail("open fix-issue"));
                continue;
            }

            match reconciler.reconcile(module, &prs).await {
                Ok(Some(tracked)) => worklist.push(tracked),
                Ok(None) => report
                    .skipped
                    .push(ReportEntry::new(&module.name).with_detail("already tested")),
                Err(e @ SyncError::Restore { .. }) => {
                    error!(
                        module = %module.name,
                        error = %e,
                        "clone left off the default branch, creating no more PRs"
                    );
                    report
                        .errored
                        .push(ReportEntry::new(&module.name).with_detail(e.to_string()));
                    halted = Some(e.to_string());
                }
                Err(e) => {
                    error!(module = %module.name, error = %e, "failed to reconcile module");
                    report
                        .errored
                        .push(ReportEntry::new(&module.name).with_detail(e.to_string()));
                }
            }
        }

        let resolver = OutcomeResolver::new(self.settings, self.host, self.core);
        let converged = BatchConvergence::new(self.host, resolver, &self.settings.poll)
            .run(worklist)
            .await;
        report.merge(converged);

        info!(summary = %report.summary(), "batch finished");
        Ok(report)
    }
}

/// What a run would do with a module, without doing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum PlannedAction {
    /// An open fix-issue exists and retries are disabled.
    Blocked { issue_url: String },
    Create { branch: String },
    Reuse { pr_url: String },
    Skip { pr_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedModule {
    pub module: String,
    pub version: String,
    pub title: String,
    pub action: PlannedAction,
}

/// Read-only preview of a batch run.
pub async fn plan_batch(
    settings: &Settings,
    host: &dyn ModuleHost,
    modules: &[ModuleRecord],
    core: &CoreVersion,
) -> SyncResult<Vec<PlannedModule>> {
    let open_issues = host.list_open_issues().await?;
    let prs = host.list_pulls().await?;

    let planned = modules
        .iter()
        .map(|module| {
            let identity = IdentityKey::for_module(module, core, settings);
            let blocking = (!settings.test_again)
                .then(|| find_open_issue(&module.name, &open_issues))
                .flatten();
            let action = match blocking {
                Some(issue) => PlannedAction::Blocked {
                    issue_url: issue.html_url.clone(),
                },
                None => match decide(&identity, &prs) {
                    Decision::Create => PlannedAction::Create {
                        branch: branch_name(&module.name, &module.version, core),
                    },
                    Decision::Reuse(pr) => PlannedAction::Reuse {
                        pr_url: pr.html_url,
                    },
                    Decision::Skip(pr) => PlannedAction::Skip {
                        pr_url: pr.html_url,
                    },
                },
            };
            PlannedModule {
                module: module.name.clone(),
                version: module.version.clone(),
                title: identity.title(),
                action,
            }
        })
        .collect();
    Ok(planned)
}
