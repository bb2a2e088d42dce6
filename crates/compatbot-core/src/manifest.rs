//! Module manifests and dependency pins on disk.
//!
//! Every directory holding a `manifest.yml` is a module. The manifest's
//! `version` field is the module version; a `requirements.txt` next to it
//! may pin the core package.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{SyncError, SyncResult};
use crate::model::ModuleRecord;

pub const MANIFEST_FILE: &str = "manifest.yml";
pub const PIN_FILE: &str = "requirements.txt";

/// Find every module under `root`, sorted by manifest path.
///
/// Modules whose manifest cannot be read are logged and left out.
pub fn discover_modules(root: &Path) -> SyncResult<Vec<ModuleRecord>> {
    if !root.is_dir() {
        return Err(SyncError::Config(format!(
            "modules directory {} does not exist",
            root.display()
        )));
    }

    let mut manifests: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == MANIFEST_FILE)
        .map(|e| e.into_path())
        .collect();
    manifests.sort();

    let mut modules = Vec::with_capacity(manifests.len());
    for manifest_path in manifests {
        let Some(dir) = manifest_path.parent() else {
            continue;
        };
        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match read_version(&manifest_path) {
            Ok(version) => modules.push(ModuleRecord {
                name: name.to_string(),
                version,
                pin_path: dir.join(PIN_FILE),
                manifest_path,
            }),
            Err(e) => warn!(module = %name, error = %e, "skipping module with unreadable manifest"),
        }
    }

    info!(count = modules.len(), root = %root.display(), "discovered modules");
    Ok(modules)
}

fn parse_mapping(path: &Path, content: &str) -> SyncResult<Mapping> {
    match serde_yaml::from_str::<Value>(content)? {
        Value::Mapping(map) => Ok(map),
        _ => Err(SyncError::Manifest {
            path: path.to_path_buf(),
            reason: "top level is not a mapping".to_string(),
        }),
    }
}

/// The manifest's `version` field. Numeric versions (`0.10`) are read as
/// written, not as the number YAML would make of them.
pub fn read_version(path: &Path) -> SyncResult<String> {
    let content = fs::read_to_string(path)?;
    let map = parse_mapping(path, &content)?;
    match map.get("version") {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(top_level_scalar(&content, "version")
            .map(str::to_string)
            .unwrap_or_else(|| n.to_string())),
        _ => Err(SyncError::Manifest {
            path: path.to_path_buf(),
            reason: "missing or empty 'version' field".to_string(),
        }),
    }
}

/// Set the manifest's `timestamp` field so the branch has a diff to commit.
///
/// Only the `timestamp` line is written; every other line is kept verbatim.
pub fn stamp_manifest(path: &Path, timestamp: f64) -> SyncResult<()> {
    let content = fs::read_to_string(path)?;
    parse_mapping(path, &content)?;

    let stamp = format!("timestamp: {timestamp:?}");
    let mut replaced = false;
    let mut lines: Vec<&str> = content
        .lines()
        .map(|line| {
            if top_level_key(line) == Some("timestamp") {
                replaced = true;
                stamp.as_str()
            } else {
                line
            }
        })
        .collect();
    if !replaced {
        lines.push(&stamp);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    fs::write(path, out)?;
    debug!(path = %path.display(), timestamp, "stamped manifest");
    Ok(())
}

/// Key of an unindented `key: value` line.
fn top_level_key(line: &str) -> Option<&str> {
    if line.starts_with(|c: char| c.is_whitespace() || c == '#' || c == '-') {
        return None;
    }
    let (key, _) = line.split_once(':')?;
    Some(key.trim())
}

/// Plain scalar text of a top-level `key: value` line, comment stripped.
fn top_level_scalar<'a>(content: &'a str, key: &str) -> Option<&'a str> {
    let line = content.lines().find(|l| top_level_key(l) == Some(key))?;
    let (_, value) = line.split_once(':')?;
    let value = value.split(" #").next().unwrap_or(value).trim();
    (!value.is_empty()).then_some(value)
}

/// Rewrite the pin of `package` in a requirements file to `package==version`.
///
/// Returns `false` (and leaves the file alone) when the file does not exist
/// or does not mention the package. Other lines are kept verbatim.
pub fn pin_core_version(path: &Path, package: &str, version: &str) -> SyncResult<bool> {
    if !path.is_file() {
        return Ok(false);
    }
    let content = fs::read_to_string(path)?;
    let wanted = normalize(package);

    let mut updated = false;
    let lines: Vec<String> = content
        .lines()
        .map(|line| match requirement_name(line) {
            Some(name) if normalize(name) == wanted => {
                updated = true;
                format!("{package}=={version}")
            }
            _ => line.to_string(),
        })
        .collect();

    if updated {
        let mut out = lines.join("\n");
        if content.ends_with('\n') {
            out.push('\n');
        }
        fs::write(path, out)?;
        debug!(path = %path.display(), package, version, "pinned core package");
    }
    Ok(updated)
}

/// Project name at the start of a requirement line, if the line is one.
fn requirement_name(line: &str) -> Option<&str> {
    let line = line.trim_start();
    if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
        return None;
    }
    let end = line
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(line.len());
    (end > 0).then(|| &line[..end])
}

fn normalize(name: &str) -> String {
    name.to_ascii_lowercase().replace(['_', '.'], "-")
}
