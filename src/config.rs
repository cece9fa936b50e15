// src/config.rs

//! Engine configuration loaded from `tlext.toml`
//!
//! Every field has a default, so a missing file or a partial file is fine.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable pointing at the configuration file
pub const CONFIG_ENV: &str = "TLEXT_CONFIG";

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/tlext/tlext.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database holding the catalog
    pub db_path: PathBuf,

    /// Directory holding file-based control files and scripts
    pub extension_dir: PathBuf,

    /// Cluster-wide switch allowing trusted extensions to elevate
    pub trusted_extensions: bool,

    /// Superuser assumed while running trusted extension scripts
    pub bootstrap_role: String,

    /// Default tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("/var/lib/tlext/tlext.db"),
            extension_dir: PathBuf::from("/usr/share/tlext/extension"),
            trusted_extensions: true,
            bootstrap_role: "tle_bootstrap".to_string(),
            log_filter: "warn".to_string(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from an explicit path, then `TLEXT_CONFIG`, then the default
    /// location; falls back to defaults when no file exists.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            return Self::load(default_path);
        }
        Ok(Self::default())
    }

    /// Directory that relative `directory` entries in control files resolve against
    pub fn share_dir(&self) -> PathBuf {
        self.extension_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.extension_dir.clone())
    }
}
