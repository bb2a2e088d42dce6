//! Per-run summary of what happened to every module.

use serde::{Deserialize, Serialize};

/// One module's line in a [`BatchReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub module: String,
    pub pr_url: Option<String>,
    /// Issue URL for failures, reason for skips, message for errors.
    pub detail: Option<String>,
}

impl ReportEntry {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            pr_url: None,
            detail: None,
        }
    }

    pub fn with_pr(mut self, url: impl Into<String>) -> Self {
        self.pr_url = Some(url.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Outcome of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub passed: Vec<ReportEntry>,
    pub failed: Vec<ReportEntry>,
    pub skipped: Vec<ReportEntry>,
    /// Still pending when the cycle budget ran out; left open remotely.
    pub abandoned: Vec<ReportEntry>,
    pub errored: Vec<ReportEntry>,
}

impl BatchReport {
    pub fn merge(&mut self, other: BatchReport) {
        self.passed.extend(other.passed);
        self.failed.extend(other.failed);
        self.skipped.extend(other.skipped);
        self.abandoned.extend(other.abandoned);
        self.errored.extend(other.errored);
    }

    /// `true` when no module failed, errored or was abandoned.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.errored.is_empty() && self.abandoned.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} passed, {} failed, {} skipped, {} abandoned, {} errored",
            self.passed.len(),
            self.failed.len(),
            self.skipped.len(),
            self.abandoned.len(),
            self.errored.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_and_summary() {
        let mut a = BatchReport::default();
        a.skipped.push(ReportEntry::new("A").with_detail("already tested"));
        let mut b = BatchReport::default();
        b.passed.push(ReportEntry::new("B").with_pr("https://example.test/pull/1"));
        a.merge(b);
        assert_eq!(
            a.summary(),
            "1 passed, 0 failed, 1 skipped, 0 abandoned, 0 errored"
        );
        assert!(a.is_clean());
    }

    #[test]
    fn test_abandoned_is_not_clean() {
        let mut r = BatchReport::default();
        r.abandoned.push(ReportEntry::new("C"));
        assert!(!r.is_clean());
    }
}
