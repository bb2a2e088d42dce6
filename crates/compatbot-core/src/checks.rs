//! CI check polling and verdict reduction.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::SyncResult;
use crate::host::ModuleHost;
use crate::model::{CheckRun, CheckVerdict};

/// Verdict for one commit plus the runs it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub sha: String,
    pub verdict: CheckVerdict,
    pub runs: Vec<CheckRun>,
}

impl CheckReport {
    /// `(name, status, conclusion)` tuples, as quoted in fix-issues.
    pub fn tuples(&self) -> String {
        let inner: Vec<String> = self.runs.iter().map(CheckRun::tuple).collect();
        format!("[{}]", inner.join(", "))
    }
}

/// Reduce check runs to a verdict.
///
/// - any run not `completed` -> `Pending`
/// - otherwise any `failure` conclusion -> `Failed`
/// - otherwise `Passed`
///
/// No runs at all is `Pending`: checks take a while to register after a push.
pub fn reduce(runs: &[CheckRun]) -> CheckVerdict {
    if runs.is_empty() || runs.iter().any(|r| r.status != "completed") {
        return CheckVerdict::Pending;
    }
    if runs
        .iter()
        .any(|r| r.conclusion.as_deref() == Some("failure"))
    {
        CheckVerdict::Failed
    } else {
        CheckVerdict::Passed
    }
}

/// Fetch the check runs of `sha` and reduce them.
///
/// A response without a check-run list is treated as `Pending` so the entry
/// is retried on the next cycle. Transport errors are returned to the caller.
pub async fn poll(host: &dyn ModuleHost, sha: &str) -> SyncResult<CheckReport> {
    let Some(runs) = host.check_runs(sha).await? else {
        warn!(sha, "check-run list missing from response, will retry");
        return Ok(CheckReport {
            sha: sha.to_string(),
            verdict: CheckVerdict::Pending,
            runs: Vec::new(),
        });
    };

    let report = CheckReport {
        sha: sha.to_string(),
        verdict: reduce(&runs),
        runs,
    };
    info!(
        sha,
        count = report.runs.len(),
        verdict = ?report.verdict,
        runs = %report.tuples(),
        "polled check runs"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_pending() {
        assert_eq!(reduce(&[]), CheckVerdict::Pending);
    }

    #[test]
    fn test_single_success_passes() {
        let runs = vec![CheckRun::completed("build", "success")];
        assert_eq!(reduce(&runs), CheckVerdict::Passed);
    }

    #[test]
    fn test_incomplete_run_is_pending() {
        let runs = vec![
            CheckRun::completed("build", "success"),
            CheckRun::new("test", "in_progress", None),
        ];
        assert_eq!(reduce(&runs), CheckVerdict::Pending);
    }

    #[test]
    fn test_failure_dominates() {
        let runs = vec![
            CheckRun::completed("build", "failure"),
            CheckRun::completed("test", "success"),
        ];
        assert_eq!(reduce(&runs), CheckVerdict::Failed);
    }

    #[test]
    fn test_pending_wins_over_failure() {
        let runs = vec![
            CheckRun::completed("build", "failure"),
            CheckRun::new("test", "queued", None),
        ];
        assert_eq!(reduce(&runs), CheckVerdict::Pending);
    }

    #[test]
    fn test_non_failure_conclusions_pass() {
        let runs = vec![
            CheckRun::completed("build", "success"),
            CheckRun::completed("docs", "skipped"),
            CheckRun::completed("lint", "neutral"),
        ];
        assert_eq!(reduce(&runs), CheckVerdict::Passed);
    }

    #[test]
    fn test_report_tuples() {
        let report = CheckReport {
            sha: "abc".to_string(),
            verdict: CheckVerdict::Failed,
            runs: vec![
                CheckRun::completed("build", "failure"),
                CheckRun::completed("test", "success"),
            ],
        };
        assert_eq!(
            report.tuples(),
            "[('build', 'completed', 'failure'), ('test', 'completed', 'success')]"
        );
    }
}
