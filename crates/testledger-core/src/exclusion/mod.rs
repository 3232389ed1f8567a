//! Which specs to skip for a run, and why.
//!
//! An [`ExclusionSet`] is built once per invocation from the health report
//! and handed, read-only, to exactly one adapter.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use testledger_api::models::{ExclusionCategory, HealthQuery, HealthReport};

/// How flaky specs are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlakyMode {
    /// Exclude flaky specs from the run.
    #[default]
    Skip,
    /// Run flaky specs; a failing run additionally logs a warning.
    Warn,
    /// Run flaky specs like any other.
    Fail,
}

impl fmt::Display for FlakyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Skip => "skip",
            Self::Warn => "warn",
            Self::Fail => "fail",
        };
        f.write_str(s)
    }
}

impl FromStr for FlakyMode {
    type Err = FlakyModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "warn" => Ok(Self::Warn),
            "fail" => Ok(Self::Fail),
            other => Err(FlakyModeParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`FlakyMode`] string.
#[derive(Debug, Clone)]
pub struct FlakyModeParseError(pub String);

impl fmt::Display for FlakyModeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid flaky mode {:?} (expected skip, warn or fail)", self.0)
    }
}

impl std::error::Error for FlakyModeParseError {}

// ---------------------------------------------------------------------------

/// Specs to skip, grouped by reason. Each category has set semantics and
/// keeps first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    specs_to_skip: Vec<String>,
    quarantined: Vec<String>,
    flaky: Vec<String>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip(&mut self, spec: impl Into<String>) -> bool {
        insert_unique(&mut self.specs_to_skip, spec.into())
    }

    pub fn quarantine(&mut self, spec: impl Into<String>) -> bool {
        insert_unique(&mut self.quarantined, spec.into())
    }

    pub fn mark_flaky(&mut self, spec: impl Into<String>) -> bool {
        insert_unique(&mut self.flaky, spec.into())
    }

    pub fn specs_to_skip(&self) -> &[String] {
        &self.specs_to_skip
    }

    pub fn quarantined(&self) -> &[String] {
        &self.quarantined
    }

    pub fn flaky(&self) -> &[String] {
        &self.flaky
    }

    /// Union of all three categories with duplicates removed.
    ///
    /// Order: explicit skips, then quarantined, then flaky; within a
    /// category, insertion order. This is what adapters translate.
    pub fn unique(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.specs_to_skip
            .iter()
            .chain(&self.quarantined)
            .chain(&self.flaky)
            .filter(|spec| seen.insert(spec.as_str()))
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.specs_to_skip.is_empty() && self.quarantined.is_empty() && self.flaky.is_empty()
    }
}

fn insert_unique(bucket: &mut Vec<String>, spec: String) -> bool {
    if bucket.contains(&spec) {
        return false;
    }
    bucket.push(spec);
    true
}

// ---------------------------------------------------------------------------

/// Service-side thresholds that decide when a spec counts as flaky.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HealthThresholds {
    pub min_flaky_count: Option<u32>,
    pub min_flaky_percent: Option<f64>,
    pub min_total_runs: Option<u32>,
}

/// Inputs to the exclusion computation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExclusionPolicy {
    pub flaky_mode: FlakyMode,
    /// Run quarantined specs anyway.
    pub include_quarantined: bool,
    pub thresholds: HealthThresholds,
}

impl ExclusionPolicy {
    /// The health-config filter for this policy.
    pub fn health_query(&self, project_id: i64, version: Option<&str>) -> HealthQuery {
        HealthQuery {
            project_id,
            version: version.map(str::to_owned),
            include_flaky: Some(self.flaky_mode != FlakyMode::Fail),
            include_quarantined: Some(!self.include_quarantined),
            min_flaky_count: self.thresholds.min_flaky_count,
            min_flaky_percent: self.thresholds.min_flaky_percent,
            min_total_runs: self.thresholds.min_total_runs,
        }
    }

    /// Turn a health report into the exclusions for this run.
    ///
    /// - Flaky specs are excluded only under [`FlakyMode::Skip`].
    /// - Quarantined specs are excluded unless `include_quarantined` is set.
    pub fn exclusions_from(&self, report: &HealthReport) -> ExclusionSet {
        let mut exclusions = ExclusionSet::new();

        if self.flaky_mode == FlakyMode::Skip {
            for spec in report.specs_in(ExclusionCategory::Flaky) {
                exclusions.mark_flaky(&spec.spec_file);
            }
        }

        if !self.include_quarantined {
            for spec in report.specs_in(ExclusionCategory::Quarantined) {
                exclusions.quarantine(&spec.spec_file);
            }
        }

        exclusions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testledger_api::models::{HealthStatus, SkipSpec};

    fn report() -> HealthReport {
        HealthReport {
            skip_specs: vec![
                SkipSpec::new("login.spec.ts", HealthStatus::Flaky),
                SkipSpec::new("cart.spec.ts", HealthStatus::Quarantined),
                SkipSpec::new("legacy.spec.ts", HealthStatus::Disabled),
                SkipSpec::new("broken.spec.ts", HealthStatus::Broken),
            ],
            ..HealthReport::default()
        }
    }

    #[test]
    fn unique_collapses_duplicates_across_categories() {
        let mut set = ExclusionSet::new();
        set.skip("a.spec.ts");
        set.quarantine("b.spec.ts");
        set.quarantine("a.spec.ts");
        set.mark_flaky("b.spec.ts");
        set.mark_flaky("c.spec.ts");

        assert_eq!(set.unique(), vec!["a.spec.ts", "b.spec.ts", "c.spec.ts"]);
    }

    #[test]
    fn categories_have_set_semantics() {
        let mut set = ExclusionSet::new();
        assert!(set.mark_flaky("a.spec.ts"));
        assert!(!set.mark_flaky("a.spec.ts"));
        assert_eq!(set.flaky(), ["a.spec.ts"]);
    }

    #[test]
    fn skip_mode_excludes_flaky_and_quarantined() {
        let policy = ExclusionPolicy::default();
        let set = policy.exclusions_from(&report());
        assert_eq!(set.flaky(), ["login.spec.ts"]);
        assert_eq!(set.quarantined(), ["cart.spec.ts", "legacy.spec.ts"]);
        assert!(!set.unique().contains(&"broken.spec.ts".to_owned()));
    }

    #[test]
    fn warn_and_fail_modes_keep_flaky_specs() {
        for mode in [FlakyMode::Warn, FlakyMode::Fail] {
            let policy = ExclusionPolicy {
                flaky_mode: mode,
                ..ExclusionPolicy::default()
            };
            let set = policy.exclusions_from(&report());
            assert!(set.flaky().is_empty(), "mode {mode} should not exclude flaky");
            assert_eq!(set.quarantined().len(), 2);
        }
    }

    #[test]
    fn include_quarantined_runs_them() {
        let policy = ExclusionPolicy {
            include_quarantined: true,
            ..ExclusionPolicy::default()
        };
        let set = policy.exclusions_from(&report());
        assert!(set.quarantined().is_empty());
        assert_eq!(set.flaky(), ["login.spec.ts"]);
    }

    #[test]
    fn health_query_reflects_policy() {
        let policy = ExclusionPolicy {
            flaky_mode: FlakyMode::Fail,
            include_quarantined: true,
            thresholds: HealthThresholds {
                min_flaky_count: Some(3),
                min_flaky_percent: None,
                min_total_runs: Some(5),
            },
        };
        let query = policy.health_query(12, Some("2.0.0"));
        assert_eq!(query.project_id, 12);
        assert_eq!(query.version.as_deref(), Some("2.0.0"));
        assert_eq!(query.include_flaky, Some(false));
        assert_eq!(query.include_quarantined, Some(false));
        assert_eq!(query.min_flaky_count, Some(3));
        assert_eq!(query.min_total_runs, Some(5));

        let query = ExclusionPolicy::default().health_query(12, None);
        assert_eq!(query.include_flaky, Some(true));
        assert_eq!(query.include_quarantined, Some(true));
    }

    #[test]
    fn flaky_mode_parses_case_insensitively() {
        assert_eq!("WARN".parse::<FlakyMode>().unwrap(), FlakyMode::Warn);
        assert!("sometimes".parse::<FlakyMode>().is_err());
    }
}
