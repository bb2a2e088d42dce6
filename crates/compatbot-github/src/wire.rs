//! GitHub REST payloads, reduced to the fields compatbot reads.

use chrono::{DateTime, Utc};
use compatbot_core::{CheckRun, Issue, PullRequest, RateLimit, RemoteState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct WirePull {
    pub number: u64,
    pub title: String,
    pub state: RemoteState,
    pub html_url: String,
    pub head: WireRef,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireRef {
    #[serde(rename = "ref")]
    pub name: String,
}

impl From<WirePull> for PullRequest {
    fn from(w: WirePull) -> Self {
        PullRequest {
            number: w.number,
            title: w.title,
            state: w.state,
            html_url: w.html_url,
            head_ref: w.head.name,
        }
    }
}

/// Issues endpoint entry. PRs are returned by that endpoint too and carry
/// a `pull_request` object.
#[derive(Debug, Deserialize)]
pub(crate) struct WireIssue {
    pub number: u64,
    pub title: String,
    pub state: RemoteState,
    pub html_url: String,
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

impl WireIssue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

impl From<WireIssue> for Issue {
    fn from(w: WireIssue) -> Self {
        Issue {
            number: w.number,
            title: w.title,
            state: w.state,
            html_url: w.html_url,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatePull<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub head: &'a str,
    pub base: &'a str,
    pub draft: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateIssue<'a> {
    pub title: &'a str,
    pub body: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CommentBody<'a> {
    pub body: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct StateChange {
    pub state: RemoteState,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WirePullCommit {
    pub sha: String,
    pub commit: WireCommitDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireCommitDetail {
    #[serde(default)]
    pub author: Option<WireSignature>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireSignature {
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl WirePullCommit {
    fn authored_at(&self) -> Option<DateTime<Utc>> {
        self.commit.author.as_ref().and_then(|a| a.date)
    }
}

/// SHA of the most recently authored commit. Ties go to the later entry.
pub(crate) fn latest_commit(commits: &[WirePullCommit]) -> Option<&str> {
    commits
        .iter()
        .max_by_key(|c| c.authored_at())
        .map(|c| c.sha.as_str())
}

/// Check-runs response. `check_runs` is absent on some error payloads.
#[derive(Debug, Deserialize)]
pub(crate) struct WireCheckRuns {
    #[serde(default)]
    pub total_count: Option<usize>,
    #[serde(default)]
    pub check_runs: Option<Vec<WireCheckRun>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireCheckRun {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
}

impl From<WireCheckRun> for CheckRun {
    fn from(w: WireCheckRun) -> Self {
        CheckRun {
            name: w.name,
            status: w.status,
            conclusion: w.conclusion,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireRateLimit {
    pub resources: WireResources,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireResources {
    pub core: RateLimit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_from_api_json() {
        let json = r#"{
            "number": 42,
            "title": "chore: testing/building Foo (0.1.0) on new jina core: 2.3.",
            "state": "closed",
            "html_url": "https://github.com/org/hub/pull/42",
            "draft": true,
            "head": {"ref": "chore-foo-0.1.0-core-2-3-1", "sha": "abc"}
        }"#;
        let pr: PullRequest = serde_json::from_str::<WirePull>(json).unwrap().into();
        assert_eq!(pr.number, 42);
        assert_eq!(pr.state, RemoteState::Closed);
        assert_eq!(pr.head_ref, "chore-foo-0.1.0-core-2-3-1");
    }

    #[test]
    fn test_issue_listing_flags_pull_requests() {
        let json = r#"[
            {"number": 1, "title": "fix module Foo", "state": "open",
             "html_url": "https://github.com/org/hub/issues/1"},
            {"number": 2, "title": "some PR", "state": "open",
             "html_url": "https://github.com/org/hub/pull/2",
             "pull_request": {"url": "https://api.github.com/repos/org/hub/pulls/2"}}
        ]"#;
        let issues: Vec<WireIssue> = serde_json::from_str(json).unwrap();
        assert!(!issues[0].is_pull_request());
        assert!(issues[1].is_pull_request());
    }

    #[test]
    fn test_latest_commit_picks_most_recent_author_date() {
        let json = r#"[
            {"sha": "b", "commit": {"author": {"date": "2021-06-02T10:00:00Z"}}},
            {"sha": "c", "commit": {"author": {"date": "2021-06-03T09:00:00Z"}}},
            {"sha": "a", "commit": {"author": {"date": "2021-06-01T10:00:00Z"}}}
        ]"#;
        let commits: Vec<WirePullCommit> = serde_json::from_str(json).unwrap();
        assert_eq!(latest_commit(&commits), Some("c"));
        assert_eq!(latest_commit(&[]), None);
    }

    #[test]
    fn test_check_runs_missing_key_is_none() {
        let wire: WireCheckRuns =
            serde_json::from_str(r#"{"message": "Not Found"}"#).unwrap();
        assert!(wire.check_runs.is_none());

        let wire: WireCheckRuns = serde_json::from_str(
            r#"{"total_count": 2, "check_runs": [
                {"name": "build", "status": "completed", "conclusion": "success"},
                {"name": "push", "status": "queued", "conclusion": null}
            ]}"#,
        )
        .unwrap();
        let runs: Vec<CheckRun> = wire
            .check_runs
            .unwrap()
            .into_iter()
            .map(CheckRun::from)
            .collect();
        assert_eq!(runs[1], CheckRun::new("push", "queued", None));
    }

    #[test]
    fn test_rate_limit_reads_core_resource() {
        let json = r#"{"resources": {
            "core": {"limit": 5000, "remaining": 4990, "reset": 1623000000, "used": 10},
            "search": {"limit": 30, "remaining": 30, "reset": 1623000000}
        }}"#;
        let wire: WireRateLimit = serde_json::from_str(json).unwrap();
        assert_eq!(wire.resources.core.remaining, 4990);
    }

    #[test]
    fn test_create_pull_body_is_draft() {
        let body = serde_json::to_value(CreatePull {
            title: "t",
            body: "b",
            head: "h",
            base: "master",
            draft: true,
        })
        .unwrap();
        assert_eq!(body["draft"], true);
        assert_eq!(body["base"], "master");
        let close = serde_json::to_value(StateChange {
            state: RemoteState::Closed,
        })
        .unwrap();
        assert_eq!(close["state"], "closed");
    }
}
