//! Identity of a compatibility test.
//!
//! A test is the triple (module, module version, core version) with the core
//! version truncated to the configured [`ComparisonLevel`]. The identity is
//! rendered into the PR title, and the host's PR list is the only record of
//! which tests already ran, so the title format is a compatibility contract:
//!
//! ```text
//! chore: testing/building <module> (<module version>) on new <core name> core: <key>
//! ```
//!
//! `<key>` is `2.` at `major`, `2.3.` at `minor` and `2.3.1` at `patch`.
//! Lookups match the module, module version and core name literally and
//! parse only the core version back out of existing titles, so `foo` never
//! matches `foo-bar`, `2.1` never matches `2.10` and extra human text around
//! the identity is tolerated.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{ComparisonLevel, Settings};
use crate::error::{SyncError, SyncResult};
use crate::model::ModuleRecord;

const TITLE_PREFIX: &str = "chore: testing/building";

/// A parsed core-library version. Construction fails on non-semver input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreVersion {
    raw: String,
    parsed: semver::Version,
}

impl CoreVersion {
    pub fn parse(input: &str) -> SyncResult<Self> {
        let raw = input.trim();
        let parsed =
            semver::Version::parse(raw).map_err(|e| SyncError::InvalidCoreVersion {
                version: input.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            raw: raw.to_string(),
            parsed,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn major(&self) -> u64 {
        self.parsed.major
    }

    pub fn minor(&self) -> u64 {
        self.parsed.minor
    }

    /// Part of the version that distinguishes tests at `level`.
    pub fn truncate(&self, level: ComparisonLevel) -> String {
        match level {
            ComparisonLevel::Major => self.parsed.major.to_string(),
            ComparisonLevel::Minor => format!("{}.{}", self.parsed.major, self.parsed.minor),
            ComparisonLevel::Patch => self.raw.clone(),
        }
    }
}

impl fmt::Display for CoreVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for CoreVersion {
    type Err = SyncError;

    fn from_str(s: &str) -> SyncResult<Self> {
        Self::parse(s)
    }
}

/// Deduplication key of a compatibility test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityKey {
    pub module: String,
    pub module_version: String,
    pub core_name: String,
    pub level: ComparisonLevel,
    /// Truncated core version, e.g. `2.3` at `minor`.
    pub core_key: String,
}

impl IdentityKey {
    pub fn derive(
        module: &str,
        module_version: &str,
        core: &CoreVersion,
        level: ComparisonLevel,
        core_name: &str,
    ) -> Self {
        Self {
            module: module.to_string(),
            module_version: module_version.to_string(),
            core_name: core_name.to_string(),
            level,
            core_key: core.truncate(level),
        }
    }

    pub fn for_module(module: &ModuleRecord, core: &CoreVersion, settings: &Settings) -> Self {
        Self::derive(
            &module.name,
            &module.version,
            core,
            settings.comparison_level,
            &settings.core_name,
        )
    }

    /// Canonical PR title. Byte-identical for equal keys.
    pub fn title(&self) -> String {
        let rendered = match self.level {
            ComparisonLevel::Major | ComparisonLevel::Minor => format!("{}.", self.core_key),
            ComparisonLevel::Patch => self.core_key.clone(),
        };
        format!(
            "{TITLE_PREFIX} {} ({}) on new {} core: {}",
            self.module, self.module_version, self.core_name, rendered
        )
    }

    /// Whether `title` carries an identity equal to this one.
    ///
    /// The core version embedded in the title is truncated to this key's
    /// level first, so a title written at `patch` level still matches a
    /// `minor` key with the same major.minor.
    pub fn matches_title(&self, title: &str) -> bool {
        let head = format!(
            "{TITLE_PREFIX} {} ({}) on new {} core: ",
            self.module, self.module_version, self.core_name
        );
        title.match_indices(&head).any(|(at, _)| {
            CORE_IN_TITLE
                .find(&title[at + head.len()..])
                .and_then(|m| truncate_embedded(m.as_str(), self.level))
                .is_some_and(|embedded| embedded == self.core_key)
        })
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} x {} {} ({})",
            self.module, self.module_version, self.core_name, self.core_key, self.level
        )
    }
}

/// Core version as written after `core: `, possibly truncated (`2.` / `2.3.`).
static CORE_IN_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9][0-9A-Za-z.+\-]*").expect("core version regex is valid"));

/// Truncate a core version taken from a title to `level`.
///
/// Returns `None` when the title does not carry enough components, e.g. a
/// `major` title (`2.`) compared at `minor` level.
fn truncate_embedded(core: &str, level: ComparisonLevel) -> Option<String> {
    let trimmed = core.trim_end_matches('.');
    let numeric = |s: &&str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    let mut parts = trimmed.split('.');
    match level {
        ComparisonLevel::Major => parts.next().filter(numeric).map(str::to_string),
        ComparisonLevel::Minor => {
            let major = parts.next().filter(numeric)?;
            let minor = parts.next().filter(numeric)?;
            Some(format!("{major}.{minor}"))
        }
        ComparisonLevel::Patch => Some(trimmed.to_string()),
    }
}

/// Deterministic scratch branch name for a test.
///
/// `chore-<module lowercased>-<module version>-core-<core version, dots as dashes>`.
pub fn branch_name(module: &str, module_version: &str, core: &CoreVersion) -> String {
    format!(
        "chore-{}-{}-core-{}",
        module.to_lowercase().replace('/', "-"),
        module_version.replace('/', "-"),
        core.as_str().replace(['.', '/'], "-")
    )
}
