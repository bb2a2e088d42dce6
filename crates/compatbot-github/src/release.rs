//! Latest released core version.

use serde::Deserialize;
use tracing::info;

use crate::error::GithubError;
use crate::Result;

pub const DEFAULT_CORE_VERSION_URL: &str = "https://api.jina.ai/latest";

#[derive(Debug, Deserialize)]
struct LatestRelease {
    version: String,
}

/// Fetch `{"version": "..."}` from `url`.
///
/// The value is returned as-is; callers parse it into a core version.
pub async fn fetch_latest_version(url: &str) -> Result<String> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("compatbot/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(GithubError::Status {
            status: status.as_u16(),
            url: url.to_string(),
            body: response.text().await.unwrap_or_default(),
        });
    }
    let latest: LatestRelease = response.json().await?;
    info!(url, version = %latest.version, "fetched latest core version");
    Ok(latest.version)
}
