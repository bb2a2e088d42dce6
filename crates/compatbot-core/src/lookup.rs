//! Lookups over pre-fetched host snapshots.
//!
//! The caller lists PRs and issues once per run; every function here is a
//! pure search over those lists, so no lookup costs an API call.

use tracing::{debug, info, warn};

use crate::identity::IdentityKey;
use crate::model::{Issue, PullRequest};

const FIX_MODULE_PREFIX: &str = "fix module ";

/// Title of the tracking issue for a broken module.
pub fn fix_issue_title(module: &str) -> String {
    format!("{FIX_MODULE_PREFIX}{module}")
}

/// Find the PR (any state) carrying `identity`.
///
/// Several matches are a warning, not an error; the first one wins.
pub fn find_pr<'a>(identity: &IdentityKey, prs: &'a [PullRequest]) -> Option<&'a PullRequest> {
    let matches: Vec<&PullRequest> = prs
        .iter()
        .filter(|pr| identity.matches_title(&pr.title))
        .collect();

    match matches.as_slice() {
        [] => {
            debug!(identity = %identity, "no existing PR for identity");
            None
        }
        [only] => {
            info!(identity = %identity, pr = %only.html_url, "found existing PR");
            Some(*only)
        }
        [first, ..] => {
            let urls: Vec<&str> = matches.iter().map(|pr| pr.html_url.as_str()).collect();
            warn!(
                identity = %identity,
                matched = ?urls,
                "several PRs carry the same identity, using the first"
            );
            Some(*first)
        }
    }
}

/// Module named by a fix-issue title, taken verbatim after `fix module `.
///
/// Inverse of [`fix_issue_title`]; every fix-issue lookup goes through it.
pub fn fix_issue_module(title: &str) -> Option<&str> {
    title
        .strip_prefix(FIX_MODULE_PREFIX)
        .filter(|name| !name.is_empty())
}

/// All open fix-issues for `module`, in listing order.
pub fn open_issues_for<'a>(module: &str, issues: &'a [Issue]) -> Vec<&'a Issue> {
    issues
        .iter()
        .filter(|i| i.state.is_open() && fix_issue_module(&i.title) == Some(module))
        .collect()
}

/// The open fix-issue for `module`, if any.
pub fn find_open_issue<'a>(module: &str, issues: &'a [Issue]) -> Option<&'a Issue> {
    open_issues_for(module, issues).into_iter().next()
}

/// Names of modules that currently have an open fix-issue.
pub fn modules_with_open_issues(issues: &[Issue]) -> Vec<&str> {
    issues
        .iter()
        .filter(|i| i.state.is_open())
        .filter_map(|i| fix_issue_module(&i.title))
        .collect()
}
