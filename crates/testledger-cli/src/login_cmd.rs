//! `testledger login` and `testledger init`.

use std::path::Path;

use anyhow::{Context, Result, bail};

use testledger_api::Coordinator;

use crate::config::{self, ConnectionSettings, ENV_API_TOKEN, ResolvedConfig};

/// Verify the resolved credentials, then record the connection settings at
/// `config_path`. The token is never written.
pub async fn run_login(
    coordinator: &dyn Coordinator,
    resolved: &ResolvedConfig,
    config_path: &Path,
) -> Result<()> {
    let accepted = coordinator
        .verify_credentials()
        .await
        .with_context(|| format!("failed to reach {}", resolved.api_url))?;
    if !accepted {
        bail!(
            "credentials rejected by {}; check the token in {ENV_API_TOKEN} or --api-token",
            resolved.api_url
        );
    }

    let settings = ConnectionSettings {
        api_url: resolved.api_url.clone(),
        username: resolved.username.clone(),
        project_id: resolved.project_id,
    };
    config::write_connection_settings(config_path, &settings)?;

    println!("Credentials verified against {}", resolved.api_url);
    println!("Connection settings written to {}", config_path.display());
    if let Some(project_id) = resolved.project_id {
        println!("  project_id = {project_id}");
    }
    println!();
    println!("The API token is not stored. Provide it on each run via {ENV_API_TOKEN}.");
    Ok(())
}

/// Print getting-started guidance.
pub fn run_init() {
    let path = config::config_path();
    println!("testledger skips flaky and quarantined specs and splits suites across CI nodes.");
    println!();
    println!("1. Export your API token:");
    println!("     export {ENV_API_TOKEN}=<token>");
    println!("2. Verify it and save your project:");
    println!("     testledger login --project-id <id>");
    println!("3. Run your tests:");
    println!("     testledger run");
    println!("     testledger run -- npx playwright test --project=chromium");
    println!();
    println!("Parallel CI:");
    println!("     testledger orchestrate create --nodes 4");
    println!("     testledger run --session-id <id>      # on every node");
    println!();
    if path.exists() {
        println!("Config file: {}", path.display());
    } else {
        println!("Config file (not created yet): {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use testledger_test_utils::FakeCoordinator;

    fn resolved() -> ResolvedConfig {
        ResolvedConfig {
            api_url: "https://api.example".to_string(),
            api_token: Some("tok".to_string()),
            username: None,
            project_id: Some(12),
        }
    }

    #[tokio::test]
    async fn login_writes_settings_without_token() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("testledger").join("config.toml");

        run_login(&FakeCoordinator::new(), &resolved(), &path)
            .await
            .unwrap();

        let loaded = config::load_config_from(&path).unwrap().unwrap();
        assert_eq!(loaded.api_url.as_deref(), Some("https://api.example"));
        assert_eq!(loaded.project_id, Some(12));
        assert!(loaded.api_token.is_none());
    }

    #[tokio::test]
    async fn rejected_credentials_write_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        let coordinator = FakeCoordinator::new();
        coordinator.reject_credentials();
        let err = run_login(&coordinator, &resolved(), &path)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("credentials rejected"));
        assert!(!path.exists());
    }
}
