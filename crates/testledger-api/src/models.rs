use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Health classification the service assigns to a spec file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Flaky,
    Broken,
    Disabled,
    Quarantined,
    InsufficientData,
    /// Any status string this client does not know about yet.
    #[serde(other)]
    Unknown,
}

/// The exclusion bucket a health status feeds into, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExclusionCategory {
    Flaky,
    Quarantined,
}

impl HealthStatus {
    /// Map a health status onto the exclusion category it belongs to.
    ///
    /// `disabled` is a policy decision, so it is treated like `quarantined`.
    /// Broken, healthy and under-sampled specs always run.
    pub fn exclusion_category(self) -> Option<ExclusionCategory> {
        match self {
            Self::Flaky => Some(ExclusionCategory::Flaky),
            Self::Quarantined | Self::Disabled => Some(ExclusionCategory::Quarantined),
            Self::Healthy | Self::Broken | Self::InsufficientData | Self::Unknown => None,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Healthy => "healthy",
            Self::Flaky => "flaky",
            Self::Broken => "broken",
            Self::Disabled => "disabled",
            Self::Quarantined => "quarantined",
            Self::InsufficientData => "insufficient_data",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------

/// How the service hands out specs to claiming nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStrategy {
    #[default]
    RoundRobin,
    DurationBased,
}

impl fmt::Display for SessionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RoundRobin => "round_robin",
            Self::DurationBased => "duration_based",
        };
        f.write_str(s)
    }
}

impl FromStr for SessionStrategy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_robin" => Ok(Self::RoundRobin),
            "duration_based" => Ok(Self::DurationBased),
            other => Err(ParseEnumError::new("session strategy", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Open,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------

/// Outcome reported for a single claimed spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecResult {
    Passed,
    Failed,
    Skipped,
}

impl fmt::Display for SpecResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

impl FromStr for SpecResult {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passed" => Ok(Self::Passed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            other => Err(ParseEnumError::new("spec result", other)),
        }
    }
}

/// Error returned when parsing an unknown enum string.
#[derive(Debug, Clone)]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

// ---------------------------------------------------------------------------
// Health report
// ---------------------------------------------------------------------------

/// One spec the service reports as unhealthy. Read-only on this side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipSpec {
    pub spec_file: String,
    pub reason: HealthStatus,
    #[serde(default, alias = "flaky_count", skip_serializing_if = "Option::is_none")]
    pub occurrence_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flaky_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_runs: Option<u32>,
}

impl SkipSpec {
    pub fn new(spec_file: impl Into<String>, reason: HealthStatus) -> Self {
        Self {
            spec_file: spec_file.into(),
            reason,
            occurrence_count: None,
            flaky_percent: None,
            pass_rate: None,
            total_runs: None,
        }
    }
}

/// Aggregate counts returned alongside the skip list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCounts {
    pub flaky: u32,
    pub quarantined: u32,
    pub broken: u32,
    pub disabled: u32,
    pub total: u32,
}

/// Response of the health/exclusion config endpoint.
///
/// Missing or `null` collections decode as empty so a partial response never
/// aborts a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    #[serde(default, deserialize_with = "null_as_default")]
    pub skip_specs: Vec<SkipSpec>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub counts: HealthCounts,
    #[serde(default)]
    pub project_id: Option<i64>,
}

impl HealthReport {
    /// Specs whose status maps to the given exclusion category.
    pub fn specs_in(&self, category: ExclusionCategory) -> impl Iterator<Item = &SkipSpec> {
        self.skip_specs
            .iter()
            .filter(move |s| s.reason.exclusion_category() == Some(category))
    }
}

/// Filter for the health/exclusion config endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthQuery {
    pub project_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_flaky: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_quarantined: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_flaky_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_flaky_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_total_runs: Option<u32>,
}

impl HealthQuery {
    pub fn new(project_id: i64) -> Self {
        Self {
            project_id,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Body of the create-session call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    pub project_id: i64,
    pub total_specs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub node_count: u32,
    pub strategy: SessionStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: String,
    pub total_specs_count: usize,
}

/// Body of the claim call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub session_id: String,
    pub node_id: String,
    pub batch_size: u32,
}

/// Specs handed to one node by one claim call. An empty list means the
/// session has nothing left to give out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimBatch {
    #[serde(default, deserialize_with = "null_as_default")]
    pub specs: Vec<String>,
    #[serde(default, alias = "remaining_count")]
    pub remaining: u64,
}

impl ClaimBatch {
    pub fn is_exhausted(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Body of the per-spec completion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub session_id: String,
    pub spec_file: String,
    pub result: SpecResult,
    /// Wall-clock duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

/// Generic acknowledgement body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ack {
    pub status: String,
}

/// Server-side aggregate view of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    #[serde(default)]
    pub project_id: Option<i64>,
    pub status: SessionState,
    #[serde(default)]
    pub strategy: SessionStrategy,
    pub total_specs: u64,
    #[serde(default)]
    pub claimed_count: u64,
    #[serde(default)]
    pub completed_count: u64,
    #[serde(default)]
    pub passed_count: u64,
    #[serde(default)]
    pub failed_count: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl SessionSummary {
    /// Completed specs as a rounded percentage of the total.
    pub fn progress_percent(&self) -> u64 {
        if self.total_specs == 0 {
            return 0;
        }
        ((self.completed_count as f64 / self.total_specs as f64) * 100.0).round() as u64
    }
}

/// Per-node breakdown inside a session status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeProgress {
    pub node_id: String,
    #[serde(default)]
    pub claimed: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub passed: u64,
    #[serde(default)]
    pub failed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session: SessionSummary,
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<NodeProgress>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_maps_to_categories() {
        assert_eq!(
            HealthStatus::Flaky.exclusion_category(),
            Some(ExclusionCategory::Flaky)
        );
        assert_eq!(
            HealthStatus::Quarantined.exclusion_category(),
            Some(ExclusionCategory::Quarantined)
        );
        assert_eq!(
            HealthStatus::Disabled.exclusion_category(),
            Some(ExclusionCategory::Quarantined)
        );
        assert_eq!(HealthStatus::Broken.exclusion_category(), None);
        assert_eq!(HealthStatus::Healthy.exclusion_category(), None);
        assert_eq!(HealthStatus::InsufficientData.exclusion_category(), None);
    }

    #[test]
    fn unknown_health_status_does_not_fail_decoding() {
        let spec: SkipSpec =
            serde_json::from_str(r#"{"spec_file":"a.spec.ts","reason":"mystery"}"#).unwrap();
        assert_eq!(spec.reason, HealthStatus::Unknown);
        assert_eq!(spec.reason.exclusion_category(), None);
    }

    #[test]
    fn skip_spec_accepts_legacy_flaky_count() {
        let spec: SkipSpec = serde_json::from_str(
            r#"{"spec_file":"a.spec.ts","reason":"flaky","flaky_count":4,"flaky_percent":25.0}"#,
        )
        .unwrap();
        assert_eq!(spec.occurrence_count, Some(4));
        assert_eq!(spec.flaky_percent, Some(25.0));
    }

    #[test]
    fn health_report_tolerates_nulls_and_missing_fields() {
        let report: HealthReport =
            serde_json::from_str(r#"{"status":"ok","skip_specs":null}"#).unwrap();
        assert!(report.skip_specs.is_empty());
        assert_eq!(report.counts, HealthCounts::default());

        let report: HealthReport = serde_json::from_str(r#"{"counts":{"flaky":2}}"#).unwrap();
        assert_eq!(report.counts.flaky, 2);
        assert_eq!(report.counts.quarantined, 0);
    }

    #[test]
    fn specs_in_filters_by_category() {
        let report = HealthReport {
            skip_specs: vec![
                SkipSpec::new("a.spec.ts", HealthStatus::Flaky),
                SkipSpec::new("b.spec.ts", HealthStatus::Disabled),
                SkipSpec::new("c.spec.ts", HealthStatus::Broken),
                SkipSpec::new("d.spec.ts", HealthStatus::Quarantined),
            ],
            ..HealthReport::default()
        };
        let flaky: Vec<_> = report
            .specs_in(ExclusionCategory::Flaky)
            .map(|s| s.spec_file.as_str())
            .collect();
        let quarantined: Vec<_> = report
            .specs_in(ExclusionCategory::Quarantined)
            .map(|s| s.spec_file.as_str())
            .collect();
        assert_eq!(flaky, vec!["a.spec.ts"]);
        assert_eq!(quarantined, vec!["b.spec.ts", "d.spec.ts"]);
    }

    #[test]
    fn health_query_omits_unset_knobs() {
        let mut query = HealthQuery::new(7);
        query.include_flaky = Some(true);
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json, serde_json::json!({"project_id": 7, "include_flaky": true}));
    }

    #[test]
    fn claim_batch_accepts_remaining_count_alias() {
        let batch: ClaimBatch =
            serde_json::from_str(r#"{"specs":["a","b"],"remaining_count":3}"#).unwrap();
        assert_eq!(batch.specs, vec!["a", "b"]);
        assert_eq!(batch.remaining, 3);
        assert!(!batch.is_exhausted());

        let empty: ClaimBatch = serde_json::from_str(r#"{"specs":null}"#).unwrap();
        assert!(empty.is_exhausted());
    }

    #[test]
    fn strategy_and_result_round_trip_through_strings() {
        for strategy in [SessionStrategy::RoundRobin, SessionStrategy::DurationBased] {
            assert_eq!(strategy.to_string().parse::<SessionStrategy>().unwrap(), strategy);
        }
        assert_eq!("passed".parse::<SpecResult>().unwrap(), SpecResult::Passed);
        let err = "sideways".parse::<SessionStrategy>().unwrap_err();
        assert!(err.to_string().contains("sideways"));
    }

    #[test]
    fn progress_percent_rounds_and_handles_empty_sessions() {
        let mut summary = SessionSummary {
            session_id: "s".to_owned(),
            project_id: None,
            status: SessionState::Open,
            strategy: SessionStrategy::RoundRobin,
            total_specs: 3,
            claimed_count: 3,
            completed_count: 2,
            passed_count: 2,
            failed_count: 0,
            created_at: None,
        };
        assert_eq!(summary.progress_percent(), 67);
        summary.total_specs = 0;
        summary.completed_count = 0;
        assert_eq!(summary.progress_percent(), 0);
    }
}
