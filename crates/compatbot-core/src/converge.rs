//! Batch convergence loop.
//!
//! Each tracked PR is `polling` until its checks reach a terminal verdict,
//! then the [`OutcomeResolver`] closes it. The loop waits a grace period
//! before the first pass, polls every remaining entry once per pass, and
//! sleeps between passes while anything is still pending.
//!
//! Entries are processed one at a time. An error while polling keeps the
//! entry for the next pass; an error while resolving drops it (the PR stays
//! open remotely and is resumed by the next run).

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::checks::{self, CheckReport};
use crate::config::PollPolicy;
use crate::error::SyncResult;
use crate::host::{log_rate_limit, ModuleHost};
use crate::model::TrackedPr;
use crate::report::{BatchReport, ReportEntry};
use crate::resolve::{OutcomeResolver, Resolution};

pub struct BatchConvergence<'a> {
    host: &'a dyn ModuleHost,
    resolver: OutcomeResolver<'a>,
    policy: &'a PollPolicy,
}

impl<'a> BatchConvergence<'a> {
    pub fn new(
        host: &'a dyn ModuleHost,
        resolver: OutcomeResolver<'a>,
        policy: &'a PollPolicy,
    ) -> Self {
        Self {
            host,
            resolver,
            policy,
        }
    }

    /// Drive `worklist` until every entry is resolved or abandoned.
    pub async fn run(&self, worklist: Vec<TrackedPr>) -> BatchReport {
        let mut report = BatchReport::default();
        if worklist.is_empty() {
            return report;
        }

        info!(
            entries = worklist.len(),
            grace_secs = self.policy.grace.as_secs(),
            "waiting for checks to register"
        );
        sleep(self.policy.grace).await;

        let mut pending = worklist;
        let mut cycle: u32 = 0;
        loop {
            cycle += 1;
            let mut next = Vec::with_capacity(pending.len());

            for tracked in pending {
                log_rate_limit(self.host).await;
                info!(module = %tracked.module, pr = %tracked.pr.html_url, cycle, "checking PR");

                let checks = match self.poll(&tracked).await {
                    Ok(checks) => checks,
                    Err(e) => {
                        warn!(module = %tracked.module, error = %e, "polling failed, will retry");
                        next.push(tracked);
                        continue;
                    }
                };

                match self.resolver.resolve(&tracked, &checks).await {
                    Ok(None) => {
                        info!(branch = %tracked.branch, "checks not completed yet, will retry");
                        next.push(tracked);
                    }
                    Ok(Some(resolution)) => record(&mut report, &tracked, resolution),
                    Err(e) => {
                        error!(
                            module = %tracked.module,
                            pr = %tracked.pr.html_url,
                            error = %e,
                            "failed to resolve PR"
                        );
                        report.errored.push(
                            ReportEntry::new(&tracked.module)
                                .with_pr(&tracked.pr.html_url)
                                .with_detail(e.to_string()),
                        );
                    }
                }
            }

            pending = next;
            info!(cycle, remaining = pending.len(), "polling pass finished");
            if pending.is_empty() {
                break;
            }
            if self.policy.max_cycles.is_some_and(|max| cycle >= max) {
                for tracked in pending {
                    warn!(
                        module = %tracked.module,
                        pr = %tracked.pr.html_url,
                        cycles = cycle,
                        "checks still pending after cycle budget, abandoning"
                    );
                    report.abandoned.push(
                        ReportEntry::new(&tracked.module).with_pr(&tracked.pr.html_url),
                    );
                }
                break;
            }

            info!(
                interval_secs = self.policy.interval.as_secs(),
                "waiting before next polling pass"
            );
            sleep(self.policy.interval).await;
        }

        info!(summary = %report.summary(), "batch converged");
        report
    }

    async fn poll(&self, tracked: &TrackedPr) -> SyncResult<CheckReport> {
        let sha = self.host.latest_commit_sha(&tracked.pr).await?;
        checks::poll(self.host, &sha).await
    }
}

fn record(report: &mut BatchReport, tracked: &TrackedPr, resolution: Resolution) {
    let entry = ReportEntry::new(&tracked.module).with_pr(&tracked.pr.html_url);
    match resolution {
        Resolution::Passed { .. } => report.passed.push(entry),
        Resolution::Failed { issue_url, .. } => report.failed.push(entry.with_detail(issue_url)),
    }
}
