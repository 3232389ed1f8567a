//! Cypress: no native per-spec exclude flag.
//!
//! Exclusions are passed as `--env TESTLEDGER_EXCLUDE=a,b,...`; the project's
//! `cypress.config.*` must read that variable and feed it into
//! `excludeSpecPattern` for the exclusion to take effect.

use std::path::Path;

use super::detect::{Detection, detect_with};

pub const NAME: &str = "cypress";

pub const CONFIG_FILES: &[&str] = &[
    "cypress.config.js",
    "cypress.config.ts",
    "cypress.config.mjs",
    "cypress.json",
];

/// Environment key the project config is expected to honor.
pub const EXCLUDE_ENV_KEY: &str = "TESTLEDGER_EXCLUDE";

fn is_framework_dependency(name: &str) -> bool {
    name == "cypress"
}

pub fn detect(dir: &Path) -> Detection {
    detect_with(dir, NAME, CONFIG_FILES, is_framework_dependency)
}

pub fn exclude_args(specs: &[String]) -> Vec<String> {
    if specs.is_empty() {
        return Vec::new();
    }
    vec![
        "--env".to_owned(),
        format!("{EXCLUDE_ENV_KEY}={}", specs.join(",")),
    ]
}

pub fn default_command() -> Vec<String> {
    vec!["npx".into(), "cypress".into(), "run".into()]
}

/// A single `--spec a,b,...` flag.
pub fn spec_selection_args(specs: &[String]) -> Vec<String> {
    if specs.is_empty() {
        return Vec::new();
    }
    vec!["--spec".to_owned(), specs.join(",")]
}
