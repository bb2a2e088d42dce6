//! GitHub REST client implementing [`ModuleHost`].

use std::time::Duration;

use async_trait::async_trait;
use compatbot_core::{
    BranchDeletion, CheckRun, Issue, ModuleHost, NewPullRequest, PullRequest, RateLimit,
    RemoteState, SyncResult,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::GithubError;
use crate::wire::{
    latest_commit, CommentBody, CreateIssue, CreatePull, StateChange, WireCheckRuns, WireIssue,
    WirePull, WirePullCommit, WireRateLimit,
};
use crate::Result;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const ACCEPT: &str = "application/vnd.github.v3+json";
const PER_PAGE: usize = 100;

/// GitHub connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// API root, e.g. `https://api.github.com`
    pub api_url: String,
    /// Repository as `owner/name`
    pub repo: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub timeout: Duration,
}

impl GithubConfig {
    pub fn new(repo: &str, token: &str) -> Self {
        GithubConfig {
            api_url: DEFAULT_API_URL.to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Point the client at another API root (GitHub Enterprise, tests)
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }
}

/// [`ModuleHost`] backed by the GitHub REST API
pub struct GithubHost {
    config: GithubConfig,
    http: reqwest::Client,
}

impl GithubHost {
    pub fn new(config: GithubConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("compatbot/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;
        Ok(GithubHost { config, http })
    }

    pub fn config(&self) -> &GithubConfig {
        &self.config
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}", self.config.api_url, self.config.repo, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("Authorization", format!("token {}", self.config.token))
            .header("Accept", ACCEPT)
    }

    async fn send(&self, builder: RequestBuilder, url: &str) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GithubError::Status {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, url), url).await?;
        Ok(response.json().await?)
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .send(self.request(method, url).json(body), url)
            .await?;
        Ok(response.json().await?)
    }

    /// Fetch every page of a list endpoint.
    async fn get_all<T: DeserializeOwned>(&self, path: &str, query: &str) -> Result<Vec<T>> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let paging = format!("per_page={PER_PAGE}&page={page}");
            let url = if query.is_empty() {
                self.repo_url(&format!("{path}?{paging}"))
            } else {
                self.repo_url(&format!("{path}?{query}&{paging}"))
            };
            let batch: Vec<T> = self.get_json(&url).await?;
            let done = batch.len() < PER_PAGE;
            all.extend(batch);
            if done {
                break;
            }
            page += 1;
        }
        debug!(path, pages = page, count = all.len(), "listed");
        Ok(all)
    }

    async fn set_state(&self, path: &str, state: RemoteState) -> Result<()> {
        let url = self.repo_url(path);
        let _: serde_json::Value = self
            .send_json(Method::PATCH, &url, &StateChange { state })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ModuleHost for GithubHost {
    async fn list_pulls(&self) -> SyncResult<Vec<PullRequest>> {
        let pulls: Vec<WirePull> = self.get_all("pulls", "state=all").await?;
        Ok(pulls.into_iter().map(PullRequest::from).collect())
    }

    async fn list_open_issues(&self) -> SyncResult<Vec<Issue>> {
        let issues: Vec<WireIssue> = self.get_all("issues", "state=open").await?;
        Ok(issues
            .into_iter()
            .filter(|i| !i.is_pull_request())
            .map(Issue::from)
            .collect())
    }

    async fn create_draft_pull(&self, request: &NewPullRequest) -> SyncResult<PullRequest> {
        let url = self.repo_url("pulls");
        let body = CreatePull {
            title: &request.title,
            body: &request.body,
            head: &request.head,
            base: &request.base,
            draft: true,
        };
        let pull: WirePull = self.send_json(Method::POST, &url, &body).await?;
        Ok(pull.into())
    }

    async fn latest_commit_sha(&self, pr: &PullRequest) -> SyncResult<String> {
        let commits: Vec<WirePullCommit> = self
            .get_all(&format!("pulls/{}/commits", pr.number), "")
            .await?;
        let sha = latest_commit(&commits).ok_or_else(|| {
            GithubError::Decode(format!("pull request {} has no commits", pr.number))
        })?;
        Ok(sha.to_string())
    }

    async fn check_runs(&self, sha: &str) -> SyncResult<Option<Vec<CheckRun>>> {
        let mut runs = Vec::new();
        let mut page = 1;
        loop {
            let url = self.repo_url(&format!(
                "commits/{sha}/check-runs?per_page={PER_PAGE}&page={page}"
            ));
            let wire: WireCheckRuns = self.get_json(&url).await?;
            let Some(batch) = wire.check_runs else {
                return Ok(None);
            };
            let fetched = batch.len();
            runs.extend(batch.into_iter().map(CheckRun::from));
            let total = wire.total_count.unwrap_or(runs.len());
            if fetched == 0 || runs.len() >= total {
                break;
            }
            page += 1;
        }
        debug!(sha, pages = page, count = runs.len(), "fetched check runs");
        Ok(Some(runs))
    }

    async fn comment(&self, number: u64, body: &str) -> SyncResult<()> {
        let url = self.repo_url(&format!("issues/{number}/comments"));
        let _: serde_json::Value = self
            .send_json(Method::POST, &url, &CommentBody { body })
            .await?;
        Ok(())
    }

    async fn close_pull(&self, number: u64) -> SyncResult<()> {
        self.set_state(&format!("pulls/{number}"), RemoteState::Closed)
            .await?;
        info!(pr = number, "closed pull request");
        Ok(())
    }

    async fn create_issue(&self, title: &str, body: &str) -> SyncResult<Issue> {
        let url = self.repo_url("issues");
        let issue: WireIssue = self
            .send_json(Method::POST, &url, &CreateIssue { title, body })
            .await?;
        Ok(issue.into())
    }

    async fn close_issue(&self, number: u64) -> SyncResult<()> {
        self.set_state(&format!("issues/{number}"), RemoteState::Closed)
            .await?;
        Ok(())
    }

    async fn delete_branch(&self, branch: &str) -> SyncResult<BranchDeletion> {
        let url = self.repo_url(&format!("git/refs/heads/{branch}"));
        let response = self
            .request(Method::DELETE, &url)
            .send()
            .await
            .map_err(GithubError::from)?;
        let status = response.status();
        let deletion = deletion_for(status).ok_or_else(|| GithubError::Status {
            status: status.as_u16(),
            url,
            body: String::new(),
        })?;
        debug!(branch, status = status.as_u16(), ?deletion, "branch deletion");
        Ok(deletion)
    }

    async fn rate_limit(&self) -> SyncResult<RateLimit> {
        let url = format!("{}/rate_limit", self.config.api_url);
        let wire: WireRateLimit = self.get_json(&url).await?;
        Ok(wire.resources.core)
    }
}

/// 204 means deleted. GitHub answers 422 ("Reference does not exist") or
/// 404 for missing refs.
fn deletion_for(status: StatusCode) -> Option<BranchDeletion> {
    match status {
        StatusCode::NO_CONTENT | StatusCode::OK => Some(BranchDeletion::Deleted),
        StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => Some(BranchDeletion::NotFound),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{serve, Canned};

    fn host(api_url: &str) -> GithubHost {
        GithubHost::new(GithubConfig::new("org/hub", "secret").with_api_url(api_url)).unwrap()
    }

    #[test]
    fn test_config_defaults_and_trailing_slash() {
        let config = GithubConfig::new("org/hub", "t");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        let config = config.with_api_url("https://ghe.example.com/api/v3/");
        assert_eq!(config.api_url, "https://ghe.example.com/api/v3");
        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("token").is_none());
    }

    #[test]
    fn test_deletion_status_mapping() {
        assert_eq!(
            deletion_for(StatusCode::NO_CONTENT),
            Some(BranchDeletion::Deleted)
        );
        assert_eq!(
            deletion_for(StatusCode::UNPROCESSABLE_ENTITY),
            Some(BranchDeletion::NotFound)
        );
        assert_eq!(
            deletion_for(StatusCode::NOT_FOUND),
            Some(BranchDeletion::NotFound)
        );
        assert_eq!(deletion_for(StatusCode::FORBIDDEN), None);
    }

    #[tokio::test]
    async fn test_check_runs_request_and_parse() {
        let server = serve(vec![Canned::json(
            200,
            r#"{"total_count": 1, "check_runs": [
                {"name": "build", "status": "completed", "conclusion": "failure"}
            ]}"#,
        )])
        .await;

        let runs = host(&server.url).check_runs("abc123").await.unwrap().unwrap();
        assert_eq!(runs, vec![CheckRun::completed("build", "failure")]);

        let requests = server.requests().await;
        let request = &requests[0];
        assert!(request.starts_with("GET /repos/org/hub/commits/abc123/check-runs"));
        assert!(request.contains("authorization: token secret"));
        assert!(request.contains("accept: application/vnd.github.v3+json"));
        assert!(request.contains("user-agent: compatbot/"));
    }

    #[tokio::test]
    async fn test_check_runs_follow_total_count_across_pages() {
        let first: Vec<serde_json::Value> = (0..PER_PAGE)
            .map(|i| {
                serde_json::json!({
                    "name": format!("job-{i}"),
                    "status": "completed",
                    "conclusion": "success"
                })
            })
            .collect();
        let first = serde_json::json!({"total_count": PER_PAGE + 1, "check_runs": first});
        let server = serve(vec![
            Canned::json(200, &first.to_string()),
            Canned::json(
                200,
                r#"{"total_count": 101, "check_runs": [
                    {"name": "push", "status": "completed", "conclusion": "failure"}
                ]}"#,
            ),
        ])
        .await;

        let runs = host(&server.url).check_runs("abc123").await.unwrap().unwrap();
        assert_eq!(runs.len(), PER_PAGE + 1);
        assert_eq!(runs.last(), Some(&CheckRun::completed("push", "failure")));

        let requests = server.requests().await;
        assert_eq!(requests.len(), 2);
        assert!(requests[0].contains("check-runs?per_page=100&page=1 "));
        assert!(requests[1].contains("check-runs?per_page=100&page=2 "));
    }

    #[tokio::test]
    async fn test_open_issues_exclude_pull_requests() {
        let server = serve(vec![Canned::json(
            200,
            r#"[
                {"number": 3, "title": "fix module Foo", "state": "open",
                 "html_url": "https://github.com/org/hub/issues/3"},
                {"number": 4, "title": "a PR", "state": "open",
                 "html_url": "https://github.com/org/hub/pull/4",
                 "pull_request": {}}
            ]"#,
        )])
        .await;

        let issues = host(&server.url).list_open_issues().await.unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].title, "fix module Foo");
    }

    #[tokio::test]
    async fn test_delete_missing_branch_is_not_found() {
        let server = serve(vec![Canned::json(
            422,
            r#"{"message": "Reference does not exist"}"#,
        )])
        .await;

        let deletion = host(&server.url).delete_branch("gone").await.unwrap();
        assert_eq!(deletion, BranchDeletion::NotFound);
        let requests = server.requests().await;
        assert!(requests[0].starts_with("DELETE /repos/org/hub/git/refs/heads/gone"));
    }

    #[tokio::test]
    async fn test_error_status_becomes_host_error() {
        let server = serve(vec![Canned::json(
            422,
            r#"{"message": "Validation Failed"}"#,
        )])
        .await;

        let request = NewPullRequest {
            title: "t".to_string(),
            body: "b".to_string(),
            head: "h".to_string(),
            base: "master".to_string(),
        };
        let err = host(&server.url)
            .create_draft_pull(&request)
            .await
            .unwrap_err();
        assert!(matches!(err, compatbot_core::SyncError::Host(_)));
        assert!(err.to_string().contains("Validation Failed"));

        let requests = server.requests().await;
        assert!(requests[0].starts_with("POST /repos/org/hub/pulls"));
        assert!(requests[0].contains(r#""draft":true"#));
    }
}
