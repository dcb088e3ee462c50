//! Command-line command handlers for lightkeeper.
//!
//! One-shot commands that share the daemon's config, environment and
//! decision logic but never enter the scheduler loop (except `simulate`).

pub mod help;
pub mod simulate;
pub mod status;
pub mod toggle;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{self, GlobalConfig};

/// Resolve and load the config for a one-shot command.
pub(crate) fn load_config(explicit: Option<&str>) -> Result<(PathBuf, GlobalConfig)> {
    let path = config::resolve_config_path(explicit.map(Path::new))?;
    let config = config::load_from_path(&path)
        .with_context(|| format!("could not use {}", path.display()))?;
    Ok((path, config))
}
