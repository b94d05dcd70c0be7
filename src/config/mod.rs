//! Settings files backing the persisted permission rules.
//!
//! ```rust,no_run
//! use agent_permissions::config::SettingsPaths;
//! use agent_permissions::permissions::RuleSource;
//!
//! let paths = SettingsPaths::for_project("./project").policy("/etc/agent/managed-settings.json");
//! assert!(paths.path(RuleSource::LocalSettings).is_some());
//! ```

pub mod settings;

pub use settings::{CONFIG_DIR_ENV, PermissionSettings, Settings, SettingsPaths};

use std::path::PathBuf;

use thiserror::Error;

use crate::permissions::RuleSource;

/// Errors that can occur while reading or writing settings files
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Settings file exists but could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file could not be written
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file is not valid JSON of the expected shape
    #[error("Invalid settings in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid configuration value
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Rules were written to a source that is never persisted by this process
    #[error("{origin} rules are read-only")]
    ReadOnly { origin: RuleSource },
}

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

pub(crate) fn home_dir() -> Option<PathBuf> {
    directories::UserDirs::new().map(|d| d.home_dir().to_path_buf())
}
