//! Application context that holds the resolved configuration
//!
//! The configuration file is chosen in this order:
//! 1. `--config` flag
//! 2. `REGTAG_CONFIG` environment variable
//! 3. `<config dir>/regtag/config.yaml`, when it exists
//!
//! Without any of them the library defaults apply.

use libregtag::Regtag;
use std::path::{Path, PathBuf};

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;

/// Application context shared by all commands
#[derive(Debug, Clone)]
pub struct AppContext {
    /// Client built from the resolved configuration
    pub regtag: Regtag,
    /// Configuration file in use, if any
    pub config_path: Option<PathBuf>,
}

impl AppContext {
    /// Build the context from the explicit config path (flag or env var).
    pub fn build(explicit: Option<&Path>) -> Result<Self, String> {
        let config_path = resolve_config_path(explicit, dirs::config_dir());
        Self::from_config_path(config_path)
    }

    fn from_config_path(config_path: Option<PathBuf>) -> Result<Self, String> {
        let mut builder = Regtag::builder();
        if let Some(path) = &config_path {
            builder = builder.with_config_file(path.clone());
        }
        let regtag = builder.build().map_err(|e| match &config_path {
            Some(path) => format!("{} ({})", e, path.display()),
            None => e.to_string(),
        })?;

        Ok(Self {
            regtag,
            config_path,
        })
    }
}

/// Pick the configuration file to load.
///
/// An explicit path is always returned, so a missing file is reported
/// instead of silently ignored. The default location is only used when the
/// file exists.
pub fn resolve_config_path(explicit: Option<&Path>, config_dir: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    config_dir
        .map(|dir| dir.join("regtag").join("config.yaml"))
        .filter(|path| path.is_file())
}
