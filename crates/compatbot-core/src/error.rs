//! Error types for the compatibility workflow.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the reconciliation core and its adapters.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or invalid configuration. Fatal at startup.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The core version could not be parsed. Fatal at startup.
    #[error("invalid core version '{version}': {reason}")]
    InvalidCoreVersion { version: String, reason: String },

    /// A module manifest could not be read or rewritten.
    #[error("manifest error at {}: {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },

    /// A local git operation failed.
    #[error("git error: {0}")]
    Git(String),

    /// The clone could not be put back on the default branch. Later modules
    /// would branch from the wrong commit, so the batch stops creating PRs.
    #[error("could not restore clone to '{branch}': {reason}")]
    Restore { branch: String, reason: String },

    /// A call to the source-control host failed.
    #[error("host error: {0}")]
    Host(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience result alias.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
