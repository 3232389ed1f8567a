//! `testledger status` command: show which specs the service currently
//! considers flaky or quarantined. Read-only.

use anyhow::{Context, Result};

use testledger_api::Coordinator;
use testledger_api::models::{ExclusionCategory, HealthQuery, HealthReport, SkipSpec};

/// Specs listed per category before the rest are summarized.
const MAX_PER_CATEGORY: usize = 15;

/// Run the status command.
pub async fn run_status(
    coordinator: &dyn Coordinator,
    project_id: i64,
    version: Option<String>,
) -> Result<()> {
    let query = HealthQuery {
        version,
        include_flaky: Some(true),
        include_quarantined: Some(true),
        ..HealthQuery::new(project_id)
    };
    let report = coordinator
        .health_config(&query)
        .await
        .with_context(|| format!("failed to fetch test health for project {project_id}"))?;

    print!("{}", render_report(project_id, &report));
    Ok(())
}

fn render_report(project_id: i64, report: &HealthReport) -> String {
    let counts = &report.counts;
    let mut out = format!("Test health for project {project_id}\n");
    out.push_str(&format!(
        "  flaky={} quarantined={} broken={} disabled={} total={}\n",
        counts.flaky, counts.quarantined, counts.broken, counts.disabled, counts.total
    ));

    let flaky: Vec<&SkipSpec> = report.specs_in(ExclusionCategory::Flaky).collect();
    let quarantined: Vec<&SkipSpec> = report.specs_in(ExclusionCategory::Quarantined).collect();

    if flaky.is_empty() && quarantined.is_empty() {
        out.push_str("\nNo flaky or quarantined specs.\n");
        return out;
    }
    render_section(&mut out, "Flaky", &flaky);
    render_section(&mut out, "Quarantined", &quarantined);
    out
}

fn render_section(out: &mut String, title: &str, specs: &[&SkipSpec]) {
    if specs.is_empty() {
        return;
    }
    out.push_str(&format!("\n{title} ({}):\n", specs.len()));
    for spec in specs.iter().take(MAX_PER_CATEGORY) {
        out.push_str(&format!("  {}", spec.spec_file));
        if let Some(percent) = spec.flaky_percent {
            out.push_str(&format!("  {percent:.1}% flaky"));
        }
        if let Some(runs) = spec.total_runs {
            out.push_str(&format!("  {runs} runs"));
        }
        if spec.reason.exclusion_category() == Some(ExclusionCategory::Quarantined) {
            out.push_str(&format!("  [{}]", spec.reason));
        }
        out.push('\n');
    }
    if specs.len() > MAX_PER_CATEGORY {
        out.push_str(&format!("  ... and {} more\n", specs.len() - MAX_PER_CATEGORY));
    }
}
