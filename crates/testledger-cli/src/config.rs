//! Configuration file management for testledger.
//!
//! Provides a TOML config file at `~/.config/testledger/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use testledger_api::ApiConfig;

pub const ENV_API_TOKEN: &str = "TESTLEDGER_API_TOKEN";
pub const ENV_API_URL: &str = "TESTLEDGER_API_URL";
pub const ENV_PROJECT_ID: &str = "TESTLEDGER_PROJECT_ID";
pub const ENV_USERNAME: &str = "TESTLEDGER_USERNAME";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// Only ever read. `login` does not write it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the testledger config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/testledger` or
/// `~/.config/testledger`, including on macOS.
pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg).join("testledger");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("testledger")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load the config file at `path`. A missing file is `Ok(None)`; a file
/// that exists but does not parse is an error.
pub fn load_config_from(path: &Path) -> Result<Option<ConfigFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

/// Settings `login` records after a successful credential check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub api_url: String,
    pub username: Option<String>,
    pub project_id: Option<i64>,
}

/// Write connection settings into the config file at `path`, keeping any
/// other keys and comments already there. Creates the file (0600 on Unix)
/// when it does not exist.
pub fn write_connection_settings(path: &Path, settings: &ConnectionSettings) -> Result<()> {
    let content = if path.exists() {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at {}", path.display()))?
    } else {
        String::new()
    };

    let mut doc: toml_edit::DocumentMut = content
        .parse()
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;

    doc["api_url"] = toml_edit::value(settings.api_url.as_str());
    if let Some(username) = &settings.username {
        doc["username"] = toml_edit::value(username.as_str());
    }
    if let Some(project_id) = settings.project_id {
        doc["project_id"] = toml_edit::value(project_id);
    }

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }
    std::fs::write(path, doc.to_string())
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // Owner read/write only.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub username: Option<String>,
    pub project_id: Option<i64>,
}

/// Fully resolved configuration, built once per invocation and passed to
/// each command handler.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub username: Option<String>,
    pub project_id: Option<i64>,
}

impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("api_url", &self.api_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .field("project_id", &self.project_id)
            .finish()
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl ResolvedConfig {
    /// Resolve using the default config file location.
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        let file = load_config_from(&config_path())?;
        Self::resolve_with(overrides, file.unwrap_or_default())
    }

    /// Resolve with the chain: CLI flag > env var > config file > default.
    ///
    /// - API URL: `--api-url` > `TESTLEDGER_API_URL` > `api_url` > hosted service
    /// - API token: `--api-token` > `TESTLEDGER_API_TOKEN` > `api_token`
    /// - Username: `--username` > `TESTLEDGER_USERNAME` > `username`
    /// - Project: `--project-id` > `TESTLEDGER_PROJECT_ID` > `project_id`
    pub fn resolve_with(overrides: &ConfigOverrides, file: ConfigFile) -> Result<Self> {
        let api_url = overrides
            .api_url
            .clone()
            .or_else(|| env_var(ENV_API_URL))
            .or(file.api_url)
            .unwrap_or_else(|| ApiConfig::DEFAULT_URL.to_owned());

        let api_token = overrides
            .api_token
            .clone()
            .or_else(|| env_var(ENV_API_TOKEN))
            .or(file.api_token);

        let username = overrides
            .username
            .clone()
            .or_else(|| env_var(ENV_USERNAME))
            .or(file.username);

        let project_id = match overrides.project_id {
            Some(id) => Some(id),
            None => match env_var(ENV_PROJECT_ID) {
                Some(raw) => Some(
                    raw.trim()
                        .parse::<i64>()
                        .with_context(|| format!("{ENV_PROJECT_ID} is not a number: {raw}"))?,
                ),
                None => file.project_id,
            },
        };

        Ok(Self {
            api_url,
            api_token,
            username,
            project_id,
        })
    }

    /// Connection settings for the API client. Fails without a token.
    pub fn api_config(&self) -> Result<ApiConfig> {
        let Some(token) = &self.api_token else {
            bail!("API token not found; set {ENV_API_TOKEN} or pass --api-token");
        };
        let config = ApiConfig::new(&self.api_url, token);
        Ok(match &self.username {
            Some(username) => config.with_username(username),
            None => config,
        })
    }

    pub fn require_project_id(&self) -> Result<i64> {
        match self.project_id {
            Some(id) => Ok(id),
            None => bail!(
                "project ID not found; set {ENV_PROJECT_ID}, pass --project-id, or run `testledger login --project-id <id>`"
            ),
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
