/// `load_config` module: reads the YAML configuration file, injects secrets from the
/// environment and validates the result into the core [`Config`].
///
/// # Responsibilities
/// - Parse the user-supplied YAML file into the strongly-typed core structs
/// - Fill empty `access_key` / `secret_key` fields from `PORTALS_ACCESS_KEY` /
///   `PORTALS_SECRET_KEY`, so credentials can stay out of the file
/// - Reject configurations the pipeline cannot run with, with a clear message
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{Context, Result};
use portals_core::config::Config;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const ACCESS_KEY_ENV: &str = "PORTALS_ACCESS_KEY";
pub const SECRET_KEY_ENV: &str = "PORTALS_SECRET_KEY";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: Config = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let access_key = std::env::var(ACCESS_KEY_ENV).ok();
    let secret_key = std::env::var(SECRET_KEY_ENV).ok();
    for portal in &mut config.portals {
        if portal.access_key.is_empty() {
            if let Some(key) = &access_key {
                portal.access_key = key.clone();
            }
        }
        if portal.secret_key.is_empty() {
            if let Some(key) = &secret_key {
                portal.secret_key = key.clone();
            }
        }
    }

    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path_ref.display()))?;
    config.trace_loaded();
    Ok(config)
}
