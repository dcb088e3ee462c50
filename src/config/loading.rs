//! Configuration loading functionality.
//!
//! Resolves which file to read, parses it as JSON or TOML, folds legacy
//! fields and validates the result. Loading never exits the process: the
//! scheduler calls it every tick and treats an error as "skip this tick".

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::GlobalConfig;
use super::validation::validate_config;
use crate::common::constants::*;

/// Failure to produce a usable config snapshot.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("invalid configuration in {}: {message}", path.display())]
    Invalid { path: PathBuf, message: String },
}

/// Decide which config file to use.
///
/// Precedence: explicit `--config` path, the `LIGHTKEEPER_CONFIG`
/// environment variable, `./config.json` if it exists, then
/// `<config dir>/lightkeeper/config.json`.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }

    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join("lightkeeper").join(DEFAULT_CONFIG_FILE))
}

/// Load, migrate and validate the configuration at `path`.
pub fn load_from_path(path: &Path) -> Result<GlobalConfig, ConfigLoadError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut config = parse(path, &content)?;

    config.migrate_legacy_fields();

    validate_config(&config).map_err(|e| ConfigLoadError::Invalid {
        path: path.to_path_buf(),
        message: format!("{e:#}"),
    })?;

    Ok(config)
}

fn parse(path: &Path, content: &str) -> Result<GlobalConfig, ConfigLoadError> {
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let parsed = if is_toml {
        toml::from_str(content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(content).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        message,
    })
}
