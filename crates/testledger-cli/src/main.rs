mod config;
mod login_cmd;
mod orchestrate_cmds;
mod run_cmd;
mod status_cmd;
#[cfg(test)]
mod test_util;

use anyhow::Context;
use clap::{Parser, Subcommand};

use testledger_api::HttpCoordinator;

use config::{ConfigOverrides, ResolvedConfig};
use orchestrate_cmds::OrchestrateCommands;
use run_cmd::RunArgs;

#[derive(Parser)]
#[command(
    name = "testledger",
    about = "CI test runner that skips flaky and quarantined specs and splits suites across nodes"
)]
struct Cli {
    /// API base URL (overrides TESTLEDGER_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// API token (overrides TESTLEDGER_API_TOKEN)
    #[arg(long, global = true)]
    api_token: Option<String>,
    /// Basic-auth user name (overrides TESTLEDGER_USERNAME)
    #[arg(long, global = true)]
    username: Option<String>,
    /// Project ID (overrides TESTLEDGER_PROJECT_ID)
    #[arg(long, global = true)]
    project_id: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run tests, skipping flaky and quarantined specs
    Run(RunArgs),
    /// Manage sessions that split a suite across CI nodes
    Orchestrate {
        #[command(subcommand)]
        command: OrchestrateCommands,
    },
    /// Show flaky and quarantined specs for the project
    Status {
        /// Application version the health data is scoped to
        #[arg(long = "version")]
        app_version: Option<String>,
    },
    /// Verify credentials and save connection settings
    Login,
    /// Print getting-started guidance
    Init,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            api_url: self.api_url.clone(),
            api_token: self.api_token.clone(),
            username: self.username.clone(),
            project_id: self.project_id,
        }
    }
}

fn coordinator_for(resolved: &ResolvedConfig) -> anyhow::Result<HttpCoordinator> {
    HttpCoordinator::new(resolved.api_config()?).context("failed to build API client")
}

/// Dispatch the parsed command. Returns the process exit code.
async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let overrides = cli.overrides();
    let resolve = || -> anyhow::Result<ResolvedConfig> {
        let resolved = ResolvedConfig::resolve(&overrides)?;
        tracing::debug!(config = ?resolved, "resolved configuration");
        Ok(resolved)
    };

    match cli.command {
        Commands::Init => {
            login_cmd::run_init();
            Ok(0)
        }
        Commands::Run(args) => run_cmd::run_tests(&resolve()?, args).await,
        Commands::Orchestrate { command } => {
            let resolved = resolve()?;
            let coordinator = coordinator_for(&resolved)?;
            orchestrate_cmds::run_orchestrate_command(command, &coordinator, resolved.project_id)
                .await?;
            Ok(0)
        }
        Commands::Status { app_version } => {
            let resolved = resolve()?;
            let project_id = resolved.require_project_id()?;
            let coordinator = coordinator_for(&resolved)?;
            status_cmd::run_status(&coordinator, project_id, app_version).await?;
            Ok(0)
        }
        Commands::Login => {
            let resolved = resolve()?;
            let coordinator = coordinator_for(&resolved)?;
            login_cmd::run_login(&coordinator, &resolved, &config::config_path()).await?;
            Ok(0)
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}
