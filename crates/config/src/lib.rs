//! TimerShare configuration system
//!
//! A single `config.toml` in the platform config directory, split into
//! sections that each implement `ConfigSection`.
//!
//! - **Graceful degradation**: values that fail validation are reported, not fatal, on load
//! - **Atomic writes**: config files are never left half-written
//! - **Environment overrides**: `TIMERSHARE_REMOTE_ENDPOINT`, `TIMERSHARE_SYNC_ENABLED`
//!   and `TIMERSHARE_APP_LOG_LEVEL` win over the file
//!
//! The write token is never part of the file; `remote.write_token_env` names
//! the environment variable it is read from.
//!
//! # Example
//!
//! ```rust
//! use timershare_config::{Config, ConfigManager};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let manager = ConfigManager::with_directory(dir.path().to_path_buf()).unwrap();
//! let config = manager.load().unwrap_or_else(|e| {
//!     eprintln!("Config error: {}, using defaults", e);
//!     Config::default()
//! });
//!
//! assert_eq!(config.sync.debounce_secs, 12);
//! ```

mod error;
mod manager;
mod persistence;
mod validation;

pub mod app_config;
pub mod remote_config;
pub mod sync_config;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use manager::{ConfigManager, ENV_APP_LOG_LEVEL, ENV_REMOTE_ENDPOINT, ENV_SYNC_ENABLED};
pub use validation::{ConfigSection, Validator};

pub use app_config::{AppConfig, LogLevel};
pub use remote_config::{RemoteConfig, DEFAULT_TOKEN_ENV};
pub use sync_config::SyncSection;

use serde::{Deserialize, Serialize};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Config file format version
    pub version: u32,

    /// Application-level settings
    pub app: AppConfig,

    /// Remote store location and timeouts
    pub remote: RemoteConfig,

    /// Sync timing and retry behaviour
    pub sync: SyncSection,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates every section, returning all errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(mut e) = self.app.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.remote.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.sync.validate() {
            errors.append(&mut e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merges this config with another, preferring values from `other`
    pub fn merge(&mut self, other: Config) {
        self.app.merge(other.app);
        self.remote.merge(other.remote);
        self.sync.merge(other.sync);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            app: AppConfig::default(),
            remote: RemoteConfig::default(),
            sync: SyncSection::default(),
        }
    }
}
