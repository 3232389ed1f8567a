//! WebdriverIO: exact per-file exclusion through the native `--exclude` flag.

use std::path::Path;

use super::detect::{Detection, detect_with, find_config_file};

pub const NAME: &str = "webdriverio";

pub const CONFIG_FILES: &[&str] = &["wdio.conf.js", "wdio.conf.ts", "wdio.conf.mjs"];

const FALLBACK_CONFIG: &str = "wdio.conf.js";

fn is_framework_dependency(name: &str) -> bool {
    name.starts_with("@wdio/")
}

pub fn detect(dir: &Path) -> Detection {
    detect_with(dir, NAME, CONFIG_FILES, is_framework_dependency)
}

/// One `--exclude <spec>` pair per spec, in input order.
pub fn exclude_args(specs: &[String]) -> Vec<String> {
    specs
        .iter()
        .flat_map(|spec| ["--exclude".to_owned(), spec.clone()])
        .collect()
}

/// `npx wdio run <config>`, naming the discovered config when there is one.
pub fn default_command(dir: &Path) -> Vec<String> {
    let config = find_config_file(dir, CONFIG_FILES)
        .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| FALLBACK_CONFIG.to_owned());
    vec!["npx".into(), "wdio".into(), "run".into(), config]
}

/// One `--spec <file>` pair per assigned spec.
pub fn spec_selection_args(specs: &[String]) -> Vec<String> {
    specs
        .iter()
        .flat_map(|spec| ["--spec".to_owned(), spec.clone()])
        .collect()
}
