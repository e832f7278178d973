//! Configuration Loader
//!
//! Finds the settings file for a project directory, parses it, and applies
//! environment overrides. Precedence (later overrides earlier):
//! 1. Project settings file (`settings.json`, then `kiln.toml`)
//! 2. Environment variables (`KILN_COMPILER`, `KILN_LINKER`, `KILN_ARCHIVER`)
//!
//! With a platform selected, only the platform variant files are considered.

use crate::platform::Platform;
use crate::project::{ConfigFormat, ProjectConfig};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Base names of settings files, in lookup order
const SETTINGS_FILES: [(&str, ConfigFormat); 2] =
    [("settings", ConfigFormat::Json), ("kiln", ConfigFormat::Toml)];

/// Configuration loader
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Platform variant to load, if any
    platform: Option<Platform>,
}

/// A loaded configuration together with the file it came from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Effective project configuration (after env overrides)
    pub config: ProjectConfig,

    /// Settings file that was read
    pub source: PathBuf,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { platform: None }
    }

    /// Select a platform variant
    pub fn with_platform(mut self, platform: Option<Platform>) -> Self {
        self.platform = platform;
        self
    }

    /// Candidate settings file names, in lookup order
    pub fn candidate_files(&self) -> Vec<String> {
        SETTINGS_FILES
            .iter()
            .map(|(stem, format)| match self.platform {
                Some(platform) => format!("{}.{}.{}", stem, platform.name(), format.extension()),
                None => format!("{}.{}", stem, format.extension()),
            })
            .collect()
    }

    /// Load the configuration of the project rooted at `project_dir`
    pub fn load_from_directory(&self, project_dir: &Path) -> ConfigResult<LoadedConfig> {
        let source = self
            .candidate_files()
            .into_iter()
            .map(|name| project_dir.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| ConfigError::NotFound(project_dir.to_path_buf()))?;

        tracing::debug!("Loading settings from {}", source.display());

        let config = ProjectConfig::load_from_file(&source)?;
        let config = apply_env_overrides(config);
        config.validate()?;

        Ok(LoadedConfig { config, source })
    }
}

/// Apply environment variable overrides to the toolchain commands
///
/// Empty values are ignored.
pub fn apply_env_overrides(mut config: ProjectConfig) -> ProjectConfig {
    if let Some(compiler) = non_empty_var("KILN_COMPILER") {
        config.compiler = compiler;
    }

    if let Some(linker) = non_empty_var("KILN_LINKER") {
        config.linker = Some(linker);
    }

    if let Some(archiver) = non_empty_var("KILN_ARCHIVER") {
        config.archiver = archiver;
    }

    config
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_files_default() {
        let loader = ConfigLoader::new();
        assert_eq!(loader.candidate_files(), vec!["settings.json", "kiln.toml"]);
    }

    #[test]
    fn test_candidate_files_platform_variant() {
        let loader = ConfigLoader::new().with_platform(Some(Platform::Windows));
        assert_eq!(
            loader.candidate_files(),
            vec!["settings.windows.json", "kiln.windows.toml"]
        );
    }
}
