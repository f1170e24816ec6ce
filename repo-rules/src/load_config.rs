/// `load_config` module: loads the YAML rule file and the secrets file into typed structs.
///
/// This module is the only place where untrusted YAML is parsed and mapped to the
/// strongly-typed config of `repo-rules-core`.
///
/// # Responsibilities
/// - Parse the rule file (`config.yaml`) into [`RulesConfig`]
/// - Validate what serde cannot: ruleset references, regex syntax, concurrency
/// - Read the API token from `secrets.yaml`, falling back to `GITHUB_TOKEN`
///   (a `.env` file is honoured). The token itself is never logged.
///
/// # Errors
/// All errors use `anyhow::Error` with the offending path in the message and are
/// surfaced at the CLI boundary.
use anyhow::{Context, Result};
use repo_rules_core::config::RulesConfig;
use repo_rules_core::matcher::compile_rule_groups;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{error, info};

pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

#[derive(Deserialize)]
struct Secrets {
    token: String,
}

/// Loads and validates the rule file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RulesConfig> {
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

    let config: RulesConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML {:?}: {e}", path_ref));
        }
    };

    config
        .validate()
        .with_context(|| format!("Invalid config {:?}", path_ref))?;
    compile_rule_groups(&config.repositories)
        .with_context(|| format!("Invalid repository pattern in {:?}", path_ref))?;

    config.trace_loaded();
    Ok(config)
}

/// Loads the API token from the secrets file, or from the environment when
/// the file does not exist.
pub fn load_token<P: AsRef<Path>>(path: P) -> Result<String> {
    let path_ref = path.as_ref();
    match fs::read_to_string(path_ref) {
        Ok(content) => {
            let secrets: Secrets = serde_yaml::from_str(&content).map_err(|e| {
                error!(error = ?e, secrets_path = ?path_ref, "Failed to parse secrets YAML");
                anyhow::anyhow!("Failed to parse secrets YAML {:?}: {e}", path_ref)
            })?;
            info!(secrets_path = ?path_ref, "Loaded API token from secrets file");
            Ok(secrets.token)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            dotenvy::dotenv().ok();
            match std::env::var(TOKEN_ENV_VAR) {
                Ok(token) => {
                    info!(env = TOKEN_ENV_VAR, "Loaded API token from environment");
                    Ok(token)
                }
                Err(_) => {
                    error!(secrets_path = ?path_ref, env = TOKEN_ENV_VAR, "No API token available");
                    anyhow::bail!(
                        "No secrets file at {:?} and {TOKEN_ENV_VAR} is not set",
                        path_ref
                    )
                }
            }
        }
        Err(e) => {
            error!(error = ?e, secrets_path = ?path_ref, "Failed to read secrets file");
            Err(anyhow::anyhow!(
                "Failed to read secrets file {:?}: {}",
                path_ref,
                e
            ))
        }
    }
}
