//! Spec file discovery for creating orchestration sessions.

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};
use wildmatch::WildMatch;

/// Pattern used when the caller gives none.
pub const DEFAULT_SPEC_PATTERN: &str = "**/*.spec.*";

/// Directories never searched for specs.
const IGNORED_DIRS: &[&str] = &["node_modules", ".git", "dist", "build", "coverage"];

fn is_ignored(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| IGNORED_DIRS.contains(&name))
}

/// Find spec files under `root` whose root-relative path matches `pattern`.
///
/// Paths use `/` separators and come back sorted, so every node and every
/// run sees the same list. `*` and `?` stay within one path segment; `**`
/// spans any number of segments, including none. An empty result is an
/// error.
pub fn find_specs(root: &Path, pattern: &str) -> Result<Vec<String>> {
    let glob = SpecGlob::new(pattern);
    let mut specs = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_ignored(e))
    {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if glob.matches(&segments) {
            specs.push(segments.join("/"));
        }
    }

    if specs.is_empty() {
        bail!(
            "no spec files matching {pattern} found in {}",
            root.display()
        );
    }

    specs.sort();
    debug!(count = specs.len(), pattern, "discovered spec files");
    Ok(specs)
}

enum Segment {
    AnyDepth,
    Name(WildMatch),
}

/// A `/`-separated glob matched one path segment at a time.
struct SpecGlob {
    segments: Vec<Segment>,
}

impl SpecGlob {
    fn new(pattern: &str) -> Self {
        let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "**" => Segment::AnyDepth,
                name => Segment::Name(WildMatch::new(name)),
            })
            .collect();
        Self { segments }
    }

    fn matches(&self, path: &[String]) -> bool {
        match_segments(&self.segments, path)
    }
}

fn match_segments(pattern: &[Segment], path: &[String]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        }
        Some((Segment::Name(matcher), rest)) => path
            .split_first()
            .is_some_and(|(first, tail)| matcher.matches(first) && match_segments(rest, tail)),
    }
}
