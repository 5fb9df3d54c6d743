//! File loading and environment overrides.

use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::info;

use crate::defaults::{ENV_ENABLED, ENV_MACHINE_ADDR, ENV_TIMEOUT_SECS};
use crate::directory::{DirectoryDocument, StaticDirectory};
use crate::error::{ConfigError, ConfigResult};
use crate::model::DistributionConfig;
use crate::validate::validate_config;

/// Parse `contents` as YAML or JSON based on the extension of `path`.
///
/// # Errors
///
/// Returns an error for unknown extensions or malformed documents.
pub fn parse_document<T: DeserializeOwned>(path: &Path, contents: &str) -> ConfigResult<T> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("yaml" | "yml") => serde_yaml::from_str(contents).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        }),
        Some("json") => serde_json::from_str(contents).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        }),
        _ => Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

fn read(path: &Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "read_config",
        path: path.to_path_buf(),
        source,
    })
}

/// Load the engine configuration, apply environment overrides, validate.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed, an override is
/// malformed, or validation fails.
pub fn load_config(path: &Path) -> ConfigResult<DistributionConfig> {
    let contents = read(path)?;
    let config: DistributionConfig = parse_document(path, &contents)?;
    let config = apply_env_overrides(config, |name| std::env::var(name).ok())?;
    validate_config(&config)?;
    info!(
        path = %path.display(),
        enabled = config.enabled,
        timeout_secs = config.timeout_secs,
        "distribution configuration loaded"
    );
    Ok(config)
}

/// Load and validate a rules-and-accounts document.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed, or when any rule
/// or account fails validation.
pub fn load_directory(path: &Path) -> ConfigResult<StaticDirectory> {
    let contents = read(path)?;
    let document: DirectoryDocument = parse_document(path, &contents)?;
    StaticDirectory::from_document(document)
}

/// Apply `COURIER_*` overrides read through `lookup`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnv`] when an override cannot be parsed.
pub fn apply_env_overrides<F>(
    mut config: DistributionConfig,
    lookup: F,
) -> ConfigResult<DistributionConfig>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_ENABLED) {
        config.enabled = parse_bool(&value).ok_or(ConfigError::InvalidEnv {
            name: ENV_ENABLED,
            value,
        })?;
    }
    if let Some(value) = lookup(ENV_TIMEOUT_SECS) {
        config.timeout_secs = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv {
                name: ENV_TIMEOUT_SECS,
                value: value.clone(),
            })?;
    }
    if let Some(value) = lookup(ENV_MACHINE_ADDR) {
        config.machine_addr = value.trim().to_string();
    }
    Ok(config)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
