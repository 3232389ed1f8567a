//! Project inspection shared by all adapters: config-file lookup and
//! `package.json` dependency scanning.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

/// Result of asking one adapter whether it governs a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub detected: bool,
    /// Config file that triggered detection, if detection was file-based.
    pub config_path: Option<PathBuf>,
    /// Canonical adapter name when detected.
    pub framework: Option<&'static str>,
}

impl Detection {
    pub fn not_detected() -> Self {
        Self {
            detected: false,
            config_path: None,
            framework: None,
        }
    }

    pub fn found(framework: &'static str, config_path: Option<PathBuf>) -> Self {
        Self {
            detected: true,
            config_path,
            framework: Some(framework),
        }
    }
}

/// The subset of `package.json` that detection looks at.
#[derive(Debug, Default, Deserialize)]
struct PackageManifest {
    #[serde(default)]
    dependencies: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: Option<serde_json::Map<String, serde_json::Value>>,
}

/// First config file from `candidates` (in priority order) present in `dir`.
pub fn find_config_file(dir: &Path, candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Names of all runtime and dev dependencies declared in `dir/package.json`.
///
/// A missing or malformed manifest yields an empty set.
pub fn manifest_dependencies(dir: &Path) -> BTreeSet<String> {
    let path = dir.join("package.json");
    let Ok(contents) = std::fs::read_to_string(&path) else {
        return BTreeSet::new();
    };

    let manifest: PackageManifest = match serde_json::from_str(&contents) {
        Ok(m) => m,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "ignoring malformed package.json");
            return BTreeSet::new();
        }
    };

    manifest
        .dependencies
        .into_iter()
        .chain(manifest.dev_dependencies)
        .flat_map(|deps| deps.into_iter().map(|(name, _)| name))
        .collect()
}

/// Run the standard two-step detection: config files first, then manifest
/// dependencies. Returns the first match.
pub fn detect_with(
    dir: &Path,
    framework: &'static str,
    config_files: &[&str],
    is_framework_dependency: fn(&str) -> bool,
) -> Detection {
    if let Some(path) = find_config_file(dir, config_files) {
        return Detection::found(framework, Some(path));
    }

    if manifest_dependencies(dir)
        .iter()
        .any(|dep| is_framework_dependency(dep))
    {
        return Detection::found(framework, None);
    }

    Detection::not_detected()
}
