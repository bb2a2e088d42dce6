//! Terminal outcomes of a tracked PR.
//!
//! Passed: success comment, close the module's fix-issues, close the PR.
//! Failed: find or open the module's fix-issue, link it from the PR, close
//! the PR. Both delete the PR branch afterwards.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::checks::CheckReport;
use crate::config::Settings;
use crate::error::SyncResult;
use crate::host::ModuleHost;
use crate::identity::CoreVersion;
use crate::lookup::{find_open_issue, fix_issue_title, open_issues_for};
use crate::model::{BranchDeletion, CheckVerdict, Issue, TrackedPr};

pub const SUCCESS_COMMENT: &str = "Automatic build successful. Image has been built and deployed.";

/// What the resolver did with a terminal PR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Resolution {
    Passed {
        /// Fix-issues closed because the module builds again.
        closed_issues: Vec<u64>,
    },
    Failed {
        issue_url: String,
        /// `false` when an open fix-issue already existed.
        issue_created: bool,
    },
}

pub struct OutcomeResolver<'a> {
    settings: &'a Settings,
    host: &'a dyn ModuleHost,
    core: &'a CoreVersion,
}

impl<'a> OutcomeResolver<'a> {
    pub fn new(settings: &'a Settings, host: &'a dyn ModuleHost, core: &'a CoreVersion) -> Self {
        Self {
            settings,
            host,
            core,
        }
    }

    /// Apply the outcome for a terminal `report`. Returns `None` for a
    /// pending report, which has no outcome yet.
    pub async fn resolve(
        &self,
        tracked: &TrackedPr,
        report: &CheckReport,
    ) -> SyncResult<Option<Resolution>> {
        let resolution = match report.verdict {
            CheckVerdict::Pending => return Ok(None),
            CheckVerdict::Passed => self.resolve_passed(tracked).await?,
            CheckVerdict::Failed => self.resolve_failed(tracked, report).await?,
        };

        self.host.close_pull(tracked.pr.number).await?;
        match self.host.delete_branch(&tracked.branch).await? {
            BranchDeletion::Deleted => info!(branch = %tracked.branch, "branch deleted"),
            BranchDeletion::NotFound => {
                warn!(branch = %tracked.branch, "branch was already gone")
            }
        }
        Ok(Some(resolution))
    }

    async fn resolve_passed(&self, tracked: &TrackedPr) -> SyncResult<Resolution> {
        info!(
            module = %tracked.module,
            pr = %tracked.pr.html_url,
            "all checks passed, commenting and closing"
        );
        self.host.comment(tracked.pr.number, SUCCESS_COMMENT).await?;

        let issues = self.host.list_open_issues().await?;
        let related = open_issues_for(&tracked.module, &issues);
        if related.len() > 1 {
            warn!(
                module = %tracked.module,
                count = related.len(),
                "several open fix-issues for module, closing them all"
            );
        }

        let mut closed_issues = Vec::with_capacity(related.len());
        for issue in related {
            self.host
                .comment(
                    issue.number,
                    &format!(
                        "Closing issue as build succeeded on PR {}",
                        tracked.pr.html_url
                    ),
                )
                .await?;
            self.host.close_issue(issue.number).await?;
            info!(module = %tracked.module, issue = %issue.html_url, "closed fix-issue");
            closed_issues.push(issue.number);
        }
        Ok(Resolution::Passed { closed_issues })
    }

    async fn resolve_failed(
        &self,
        tracked: &TrackedPr,
        report: &CheckReport,
    ) -> SyncResult<Resolution> {
        warn!(
            module = %tracked.module,
            pr = %tracked.pr.html_url,
            runs = %report.tuples(),
            "checks failed, opening fix-issue and closing PR"
        );
        let (issue, issue_created) = self.find_or_open_issue(tracked, report).await?;
        self.host
            .comment(
                tracked.pr.number,
                &format!(
                    "Automatic build failed in this PR and we have opened an issue here: {}. \
                     Closing this PR.",
                    issue.html_url
                ),
            )
            .await?;
        Ok(Resolution::Failed {
            issue_url: issue.html_url,
            issue_created,
        })
    }

    async fn find_or_open_issue(
        &self,
        tracked: &TrackedPr,
        report: &CheckReport,
    ) -> SyncResult<(Issue, bool)> {
        let issues = self.host.list_open_issues().await?;
        if let Some(existing) = find_open_issue(&tracked.module, &issues) {
            info!(module = %tracked.module, issue = %existing.html_url, "found existing fix-issue");
            return Ok((existing.clone(), false));
        }

        let issue = self
            .host
            .create_issue(
                &fix_issue_title(&tracked.module),
                &self.issue_body(tracked, report),
            )
            .await?;
        info!(module = %tracked.module, issue = %issue.html_url, "opened fix-issue");
        Ok((issue, true))
    }

    fn issue_body(&self, tracked: &TrackedPr, report: &CheckReport) -> String {
        format!(
            "\n**[This is an automated issue opened as part of the hub modules update GH action. \
             DO NOT EDIT THIS DESCRIPTION]**\n\n\
             Could not build module {module} for {core_name} core version {core} because some of \
             the checks failed:\n\n```\n{runs}\n```\n\nSee {url} for more info. {tag}\n",
            module = tracked.module,
            core_name = self.settings.core_name,
            core = self.core,
            runs = report.tuples(),
            url = tracked.pr.html_url,
            tag = self.settings.tag_in_issues,
        )
    }
}
