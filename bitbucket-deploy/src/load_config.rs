/// `load_config` module: loads the static YAML config and injects Bitbucket secrets from the environment.
///
/// The YAML file carries no secrets. Credentials come from `BITBUCKET_USER` and
/// `BITBUCKET_PASSWORD` (an app password), optionally provided through a `.env` file.
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use bitbucket_deploy_core::bitbucket::Credentials;
use bitbucket_deploy_core::config::{BitbucketSettings, Layout, SyncConfig};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const USER_ENV: &str = "BITBUCKET_USER";
pub const PASSWORD_ENV: &str = "BITBUCKET_PASSWORD";

#[derive(Debug)]
pub struct CliConfig {
    pub repository: String,
    pub branch: String,
    /// Commit hash. Defaults to the head of `branch` when not set.
    pub revision: Option<String>,
    pub sync: SyncConfig,
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    repository: String,
    branch: String,
    #[serde(default)]
    revision: Option<String>,
    #[serde(default)]
    bitbucket: BitbucketSettings,
    #[serde(default)]
    layout: Layout,
}

fn required_env(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        Ok(_) => {
            error!(var = key, "Environment variable is empty");
            Err(anyhow::anyhow!("{key} environment variable is empty"))
        }
        Err(e) => {
            error!(error = ?e, var = key, "Environment variable not set");
            Err(anyhow::anyhow!("{key} environment variable not set: {e}"))
        }
    }
}

/// Loads a static YAML config file (no secrets) and injects required env vars for secrets.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let credentials = Credentials {
        username: required_env(USER_ENV)?,
        password: required_env(PASSWORD_ENV)?,
    };
    info!(username = %credentials.username, "Bitbucket credentials found in env");

    let sync = SyncConfig {
        bitbucket: raw.bitbucket,
        layout: Layout::new(raw.layout.base_dir),
    };
    sync.trace_loaded();

    Ok(CliConfig {
        repository: raw.repository,
        branch: raw.branch,
        revision: raw.revision,
        sync,
        credentials,
    })
}
