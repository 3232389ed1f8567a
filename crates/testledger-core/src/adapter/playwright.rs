//! Playwright: name-based exclusion through one `--grep-invert` pattern.
//!
//! Specs are reduced to their base names (all extensions stripped), so two
//! files with the same name in different directories collapse into one
//! alternative and are excluded together.

use std::path::Path;

use tracing::warn;

use super::detect::{Detection, detect_with};

pub const NAME: &str = "playwright";

pub const CONFIG_FILES: &[&str] = &[
    "playwright.config.ts",
    "playwright.config.js",
    "playwright.config.mjs",
];

fn is_framework_dependency(name: &str) -> bool {
    name == "@playwright/test" || name == "playwright"
}

pub fn detect(dir: &Path) -> Detection {
    detect_with(dir, NAME, CONFIG_FILES, is_framework_dependency)
}

/// `a/b/login.spec.ts` -> `login`, `.smoke.spec.ts` -> `smoke`.
fn base_name(spec: &str) -> &str {
    let file = spec.rsplit(['/', '\\']).next().unwrap_or(spec);
    file.split('.').find(|part| !part.is_empty()).unwrap_or("")
}

fn escape_regex(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `--grep-invert base1|base2|...`, or nothing when there is nothing to skip.
pub fn exclude_args(specs: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for spec in specs {
        let name = escape_regex(base_name(spec));
        if name.is_empty() {
            warn!(spec = %spec, "spec has no base name to exclude by; it will run");
            continue;
        }
        if !names.contains(&name) {
            names.push(name);
        }
    }

    if names.is_empty() {
        return Vec::new();
    }
    vec!["--grep-invert".to_owned(), names.join("|")]
}

pub fn default_command() -> Vec<String> {
    vec!["npx".into(), "playwright".into(), "test".into()]
}

/// Playwright takes the files to run as positional arguments.
pub fn spec_selection_args(specs: &[String]) -> Vec<String> {
    specs.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn same_base_name_in_different_directories_collapses() {
        // Name-based matching cannot tell these apart; both are excluded by
        // the single `foo` alternative.
        let args = exclude_args(&strings(&["a/foo.spec.ts", "b/foo.spec.ts"]));
        assert_eq!(args, strings(&["--grep-invert", "foo"]));
    }

    #[test]
    fn alternatives_are_joined_with_pipe() {
        let args = exclude_args(&strings(&["tests/login.spec.ts", "cart.test.js"]));
        assert_eq!(args, strings(&["--grep-invert", "login|cart"]));
    }

    #[test]
    fn regex_metacharacters_are_escaped() {
        let args = exclude_args(&strings(&["tests/a+b(1).spec.ts"]));
        assert_eq!(args, strings(&["--grep-invert", r"a\+b\(1\)"]));
    }

    #[test]
    fn leading_dot_is_skipped_when_naming_a_spec() {
        let args = exclude_args(&strings(&["e2e/.smoke.spec.ts", "login.spec.ts"]));
        assert_eq!(args, strings(&["--grep-invert", "smoke|login"]));
    }

    #[test]
    fn nothing_to_exclude_emits_no_flag() {
        assert!(exclude_args(&[]).is_empty());
    }

    #[test]
    fn selection_is_positional() {
        let specs = strings(&["a.spec.ts", "dir/b.spec.ts"]);
        assert_eq!(spec_selection_args(&specs), specs);
    }

    #[test]
    fn detects_playwright_packages() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"devDependencies":{"@playwright/test":"^1.40"}}"#,
        )
        .unwrap();
        assert!(detect(dir.path()).detected);
    }
}
