//! `testledger orchestrate` commands: create, inspect and close the sessions
//! that split one suite across CI nodes.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Subcommand;

use testledger_api::Coordinator;
use testledger_api::models::{NewSession, SessionStatus, SessionStrategy};
use testledger_core::discovery::{self, DEFAULT_SPEC_PATTERN};

#[derive(Debug, Clone, Subcommand)]
pub enum OrchestrateCommands {
    /// Discover spec files and open a session for them
    Create {
        /// Glob for spec files, relative to --dir
        #[arg(long, default_value = DEFAULT_SPEC_PATTERN)]
        pattern: String,
        /// Number of nodes that will claim from this session
        #[arg(long, default_value_t = 1)]
        nodes: u32,
        /// Distribution strategy: round_robin or duration_based
        #[arg(long, default_value_t = SessionStrategy::RoundRobin)]
        strategy: SessionStrategy,
        /// Application version the session belongs to
        #[arg(long = "version")]
        app_version: Option<String>,
        /// Directory to search for specs
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Show progress of a session
    Status {
        /// Session ID
        session_id: String,
    },
    /// Close a session so no further specs are handed out
    Close {
        /// Session ID
        session_id: String,
    },
}

/// Dispatch an orchestrate subcommand.
pub async fn run_orchestrate_command(
    command: OrchestrateCommands,
    coordinator: &dyn Coordinator,
    project_id: Option<i64>,
) -> Result<()> {
    match command {
        OrchestrateCommands::Create {
            pattern,
            nodes,
            strategy,
            app_version,
            dir,
        } => {
            let Some(project_id) = project_id else {
                bail!("project ID not found; set TESTLEDGER_PROJECT_ID or pass --project-id");
            };
            let request = CreateRequest {
                project_id,
                pattern: &pattern,
                nodes,
                strategy,
                version: app_version,
                dir: &dir,
            };
            let session_id = create_session(coordinator, request).await?;
            if let Some(path) = std::env::var_os("GITHUB_OUTPUT").filter(|p| !p.is_empty()) {
                write_github_output(Path::new(&path), &session_id)?;
            }
            Ok(())
        }
        OrchestrateCommands::Status { session_id } => show_status(coordinator, &session_id).await,
        OrchestrateCommands::Close { session_id } => {
            coordinator
                .close_session(&session_id)
                .await
                .with_context(|| format!("failed to close session {session_id}"))?;
            println!("Session {session_id} closed.");
            Ok(())
        }
    }
}

struct CreateRequest<'a> {
    project_id: i64,
    pattern: &'a str,
    nodes: u32,
    strategy: SessionStrategy,
    version: Option<String>,
    dir: &'a Path,
}

/// Discover specs, open the session, print how nodes join it. Returns the
/// new session ID.
async fn create_session(coordinator: &dyn Coordinator, request: CreateRequest<'_>) -> Result<String> {
    let specs = discovery::find_specs(request.dir, request.pattern)?;
    println!("Found {} spec file(s) matching {}", specs.len(), request.pattern);

    let session = NewSession {
        project_id: request.project_id,
        total_specs: specs,
        version: request.version,
        node_count: request.nodes.max(1),
        strategy: request.strategy,
    };
    let created = coordinator
        .create_session(&session)
        .await
        .context("failed to create orchestration session")?;

    println!();
    println!("Session: {}", created.session_id);
    println!("  specs:    {}", created.total_specs_count);
    println!("  nodes:    {}", session.node_count);
    println!("  strategy: {}", session.strategy);
    println!();
    println!("Run on each node:");
    println!("  testledger run --session-id {}", created.session_id);

    Ok(created.session_id)
}

/// Append `session_id=<id>` to the GitHub Actions output file.
fn write_github_output(path: &Path, session_id: &str) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open GITHUB_OUTPUT at {}", path.display()))?;
    writeln!(file, "session_id={session_id}")
        .with_context(|| format!("failed to write GITHUB_OUTPUT at {}", path.display()))?;
    Ok(())
}

async fn show_status(coordinator: &dyn Coordinator, session_id: &str) -> Result<()> {
    let status = coordinator
        .session_status(session_id)
        .await
        .with_context(|| format!("failed to fetch status of session {session_id}"))?;
    print!("{}", render_status(&status));
    Ok(())
}

fn render_status(status: &SessionStatus) -> String {
    let s = &status.session;
    let mut out = String::new();
    out.push_str(&format!("Session: {} ({})\n", s.session_id, s.status));
    if let Some(created_at) = s.created_at {
        out.push_str(&format!(
            "Created: {}\n",
            created_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    out.push_str(&format!(
        "Progress: {}% ({}/{} completed)\n",
        s.progress_percent(),
        s.completed_count,
        s.total_specs
    ));
    out.push_str(&format!(
        "  claimed={} passed={} failed={}\n",
        s.claimed_count, s.passed_count, s.failed_count
    ));

    if !status.nodes.is_empty() {
        out.push('\n');
        out.push_str(&format!(
            "{:<30} {:>8} {:>10} {:>7} {:>7}\n",
            "NODE", "CLAIMED", "COMPLETED", "PASSED", "FAILED"
        ));
        for node in &status.nodes {
            out.push_str(&format!(
                "{:<30} {:>8} {:>10} {:>7} {:>7}\n",
                node.node_id, node.claimed, node.completed, node.passed, node.failed
            ));
        }
    }
    out
}
