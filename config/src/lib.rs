//! Configuration loading for async-helpers.
//!
//! ```toml
//! [helpers]
//! prefix = "{$ASYNCID$"
//! wrap = true
//! ```
//!
//! Every key is optional; missing keys fall back to [`EngineOptions::default`].

use std::path::{Path, PathBuf};

use async_helpers_types::{EngineOptions, ValidationError};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Default, Deserialize)]
pub struct HelpersConfig {
    pub helpers: Option<HelpersSection>,
}

/// The `[helpers]` table.
#[derive(Debug, Default, Deserialize)]
pub struct HelpersSection {
    /// Token prefix (default `{$ASYNCID$`).
    pub prefix: Option<String>,
    /// Wrap helpers returned by `get` unless the caller says otherwise.
    pub wrap: Option<bool>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

impl HelpersConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load the user config file, if there is one.
    ///
    /// A missing file yields `None` silently; unreadable or malformed files are
    /// logged and also yield `None`.
    pub fn load() -> Option<Self> {
        let path = config_path()?;
        if !path.exists() {
            return None;
        }

        match Self::load_from(&path) {
            Ok(config) => Some(config),
            Err(err) => {
                tracing::warn!("Failed to load config at {:?}: {}", path, err);
                None
            }
        }
    }

    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Validated options with defaults filled in.
    pub fn options(&self) -> Result<EngineOptions, ConfigError> {
        let defaults = EngineOptions::default();
        let Some(section) = &self.helpers else {
            return Ok(defaults);
        };
        let options = match &section.prefix {
            Some(prefix) => defaults.with_prefix(prefix.clone())?,
            None => defaults,
        };
        Ok(options.with_wrap(section.wrap.unwrap_or(false)))
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("async-helpers").join("config.toml"))
}
