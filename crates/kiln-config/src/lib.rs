//! Kiln Configuration System
//!
//! Loads the per-project build settings consumed by the build core:
//! - Project settings (`settings.json`, or `kiln.toml`)
//! - Platform variants (`settings.<platform>.json`, `kiln.<platform>.toml`)
//! - Environment overrides for the toolchain commands (`KILN_*`)
//! - Validation of the loaded values
//!
//! # Example
//!
//! ```no_run
//! use kiln_config::{ConfigLoader, Platform};
//! use std::path::Path;
//!
//! let loader = ConfigLoader::new().with_platform(Some(Platform::Linux));
//! let loaded = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("sources: {:?}", loaded.config.source_locations);
//! ```

pub mod loader;
pub mod platform;
pub mod project;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No settings file found in {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unknown platform '{0}' (expected one of: linux, darwin, mac, windows)")]
    UnknownPlatform(String),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid JSON in {file}: {error}")]
    JsonParseError {
        file: PathBuf,
        error: serde_json::Error,
    },

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use loader::{ConfigLoader, LoadedConfig};
pub use platform::Platform;
pub use project::{ConfigFormat, ProjectConfig};
