//! Library configuration.
//!
//! Settings have sensible defaults and can be overridden from a YAML file.
//! Missing sections and keys keep their default values.

use crate::error::{RegtagError, Result};
use config::{Config as ConfigRs, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};


/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub registries: Registries,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub auth: Auth,
}

impl Config {
    /// Parses a `Config` from a YAML string.
    ///
    /// # Examples
    ///
    /// ```
    /// use libregtag::config::Config;
    ///
    /// let config = Config::from_yaml_str("network:\n  probe_timeout: 2\n").unwrap();
    /// assert_eq!(config.network.probe_timeout, 2);
    /// assert_eq!(config.network.timeout, 30);
    /// ```
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let builder = Self::defaults()?.add_source(File::from_str(s, FileFormat::Yaml));

        Self::from_builder(builder, None)
    }

    /// Loads a `Config` from an optional file path.
    ///
    /// If the path is `None`, the defaults are returned. A path that is given
    /// must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Self::defaults()?;

        if let Some(p) = path {
            builder = builder.add_source(File::from(p).format(FileFormat::Yaml).required(true));
        }

        Self::from_builder(builder, path)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let defaults = ConfigRs::try_from(&Config::default()).map_err(|e| {
            RegtagError::config_with_source("Failed to build default configuration", None, e)
        })?;
        Ok(ConfigRs::builder().add_source(defaults))
    }

    /// Creates a `Config` from a `config::ConfigBuilder`.
    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        path: Option<&Path>,
    ) -> Result<Self> {
        builder
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| {
                RegtagError::config_with_source(
                    "Failed to deserialize configuration".to_string(),
                    path.map(|p| p.display().to_string()),
                    e,
                )
            })
    }
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Network {
    /// Request timeout in seconds.
    #[serde(default = "default_network_timeout")]
    pub timeout: u64,

    /// Timeout in seconds for the `/v2/` handshake with each endpoint.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: u64,

    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            timeout: default_network_timeout(),
            probe_timeout: default_probe_timeout(),
            max_idle_per_host: default_max_idle_per_host(),
        }
    }
}

fn default_network_timeout() -> u64 {
    30
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_max_idle_per_host() -> usize {
    10
}

/// Registry discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Registries {
    /// Docker Hub pull-through mirrors, tried before the official endpoint.
    #[serde(default)]
    pub mirrors: Vec<String>,

    /// Domains reachable over plain HTTP or with unverified certificates.
    #[serde(default)]
    pub insecure: Vec<String>,

    /// Only offer v2 endpoints to the prober.
    #[serde(default = "default_v2_only")]
    pub v2_only: bool,
}

impl Default for Registries {
    fn default() -> Self {
        Self {
            mirrors: Vec::new(),
            insecure: Vec::new(),
            v2_only: default_v2_only(),
        }
    }
}

fn default_v2_only() -> bool {
    true
}

/// Tag listing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Tags {
    /// Page size requested from the registry (`n` query parameter).
    #[serde(default)]
    pub page_size: Option<u32>,
}

/// Credential settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Auth {
    /// Docker client config file; `$DOCKER_CONFIG` or `~/.docker` when unset.
    #[serde(default)]
    pub docker_config: Option<PathBuf>,
}
