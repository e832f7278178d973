//! Project Configuration (settings.json / kiln.toml)
//!
//! Handles the per-project build settings stored at the project root. Keys are
//! PascalCase in both formats so an existing `settings.json` can be moved to
//! TOML without renaming anything.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk format of a configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(Self::Json),
            Some("toml") => Some(Self::Toml),
            _ => None,
        }
    }

    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Toml => "toml",
        }
    }
}

/// Build settings for one project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "PascalCase")]
pub struct ProjectConfig {
    /// Source roots, searched in order
    pub source_locations: Vec<PathBuf>,

    /// Header search roots (passed as `-I`)
    pub header_locations: Vec<PathBuf>,

    /// Suffix filters that define the source universe
    pub file_suffixes: Vec<String>,

    /// Header extension, used for remapping and publishing
    pub header_suffix: String,

    /// Flags for every translation unit that is not C
    pub standard_arguments: Vec<String>,

    /// Flags for C translation units
    pub c_standard_arguments: Vec<String>,

    /// Extra link inputs (e.g. `-lm`, `libfoo.a`)
    pub libraries: Vec<String>,

    /// Library search roots (passed as `-L`)
    pub library_locations: Vec<PathBuf>,

    /// Object output directory
    pub object_location: PathBuf,

    /// Output path stem
    pub output_file: String,

    /// Appended to `output_file` for executables
    pub executable_suffix: String,

    /// Appended to `output_file` for static libraries
    pub library_suffix: String,

    /// Compiler command
    pub compiler: String,

    /// Linker command (defaults to the compiler)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linker: Option<String>,

    /// Static archiver command
    pub archiver: String,

    /// Produce a static library instead of an executable
    pub is_library: bool,

    /// Directory headers are published to for library projects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_header_output: Option<PathBuf>,

    /// Upstream projects built before this one, in order
    pub dependencies: Vec<PathBuf>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            source_locations: vec![PathBuf::from("src")],
            header_locations: Vec::new(),
            file_suffixes: vec![".cpp".to_string(), ".c".to_string(), ".h".to_string()],
            header_suffix: ".h".to_string(),
            standard_arguments: Vec::new(),
            c_standard_arguments: Vec::new(),
            libraries: Vec::new(),
            library_locations: Vec::new(),
            object_location: PathBuf::from("obj"),
            output_file: "a".to_string(),
            executable_suffix: String::new(),
            library_suffix: ".a".to_string(),
            compiler: "clang++".to_string(),
            linker: None,
            archiver: "ar".to_string(),
            is_library: false,
            library_header_output: None,
            dependencies: Vec::new(),
        }
    }
}

impl ProjectConfig {
    /// Load project config from a file, picking the parser from its extension
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::InvalidValue {
            field: "file".to_string(),
            reason: format!("unsupported configuration format: {}", path.display()),
        })?;

        let config = Self::parse(&content, format, path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse config text in the given format; `origin` is only used for errors
    pub fn parse(content: &str, format: ConfigFormat, origin: &Path) -> ConfigResult<Self> {
        match format {
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| ConfigError::JsonParseError {
                    file: origin.to_path_buf(),
                    error: e,
                })
            }
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
                file: origin.to_path_buf(),
                error: e,
            }),
        }
    }

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.output_file.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "OutputFile".to_string(),
                reason: "output name cannot be empty".to_string(),
            });
        }

        if self.compiler.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "Compiler".to_string(),
                reason: "compiler command cannot be empty".to_string(),
            });
        }

        if self.header_suffix.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "HeaderSuffix".to_string(),
                reason: "header suffix cannot be empty".to_string(),
            });
        }

        if let Some(suffix) = self.file_suffixes.iter().find(|s| s.is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "FileSuffixes".to_string(),
                reason: format!("empty suffix {:?} would match every file", suffix),
            });
        }

        if self.object_location.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ObjectLocation".to_string(),
                reason: "object directory cannot be empty".to_string(),
            });
        }

        if self.is_library && self.library_header_output.is_none() {
            return Err(ConfigError::ValidationError(
                "IsLibrary requires LibraryHeaderOutput".to_string(),
            ));
        }

        Ok(())
    }

    /// Command used for the final link step
    pub fn linker(&self) -> &str {
        self.linker.as_deref().unwrap_or(&self.compiler)
    }

    /// File name of the executable, relative to the project root
    pub fn executable_name(&self) -> String {
        format!("{}{}", self.output_file, self.executable_suffix)
    }

    /// File name of the static library, relative to the project root
    pub fn library_name(&self) -> String {
        format!("{}{}", self.output_file, self.library_suffix)
    }

    /// Canonical serialized form, the input of the configuration fingerprint
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // Serializing a struct of strings, paths and bools cannot fail
        serde_json::to_vec(self).unwrap_or_default()
    }
}
