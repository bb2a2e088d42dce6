//! Error types for compatbot-github

use compatbot_core::SyncError;
use thiserror::Error;

/// Errors that can occur talking to the GitHub API
#[derive(Error, Debug)]
pub enum GithubError {
    /// Transport failure (connection, TLS, timeout)
    #[error("HTTP error: {0}")]
    Http(String),

    /// The API answered with a non-success status
    #[error("GitHub API returned {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// The response body did not have the expected shape
    #[error("unexpected GitHub response: {0}")]
    Decode(String),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for GithubError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GithubError::Decode(err.to_string())
        } else {
            GithubError::Http(err.to_string())
        }
    }
}

impl From<GithubError> for SyncError {
    fn from(err: GithubError) -> Self {
        SyncError::Host(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_converts_to_host_error() {
        let err = GithubError::Status {
            status: 422,
            url: "https://api.github.com/repos/org/hub/pulls".to_string(),
            body: "Validation Failed".to_string(),
        };
        let sync: SyncError = err.into();
        assert!(matches!(sync, SyncError::Host(_)));
        assert!(sync.to_string().contains("422"));
        assert!(sync.to_string().contains("Validation Failed"));
    }
}
