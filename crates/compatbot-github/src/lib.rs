//! compatbot-github: GitHub REST backend for compatbot
//!
//! Implements `compatbot_core::ModuleHost` over the GitHub v3 API and
//! fetches the latest released core version.

pub mod client;
mod error;
pub mod release;
mod wire;

#[cfg(test)]
mod testing;

pub use client::{GithubConfig, GithubHost, DEFAULT_API_URL};
pub use error::GithubError;
pub use release::{fetch_latest_version, DEFAULT_CORE_VERSION_URL};

/// Result type for compatbot-github operations
pub type Result<T> = std::result::Result<T, GithubError>;
