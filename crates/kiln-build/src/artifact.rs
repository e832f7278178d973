//! Final build outputs

use kiln_config::ProjectConfig;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Kind of final output a project produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Linked executable
    Executable,
    /// Static archive plus published headers
    StaticLibrary,
}

impl TargetKind {
    /// Target kind selected by `IsLibrary`
    pub fn of(config: &ProjectConfig) -> Self {
        if config.is_library {
            Self::StaticLibrary
        } else {
            Self::Executable
        }
    }

    /// Output file name for this kind, relative to the project root
    pub fn output_name(&self, config: &ProjectConfig) -> String {
        match self {
            Self::Executable => config.executable_name(),
            Self::StaticLibrary => config.library_name(),
        }
    }

    /// Whether `--run` can execute the output
    pub fn is_runnable(&self) -> bool {
        matches!(self, Self::Executable)
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Executable => write!(f, "executable"),
            Self::StaticLibrary => write!(f, "static library"),
        }
    }
}

/// Output of a link or archive step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub kind: TargetKind,
    /// Output path, absolute when the project root is
    pub path: PathBuf,
    /// Number of object files fed to the final step
    pub object_count: usize,
    /// Headers copied to `LibraryHeaderOutput`, libraries only
    pub published_headers: usize,
}

impl BuildArtifact {
    pub fn new(kind: TargetKind, project_dir: &Path, config: &ProjectConfig, object_count: usize) -> Self {
        Self {
            kind,
            path: project_dir.join(kind.output_name(config)),
            object_count,
            published_headers: 0,
        }
    }
}

/// Modification time of `path`, `None` when it cannot be read
pub fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Whether `output` is missing or older than any of `inputs`
///
/// Unreadable inputs are ignored. An input with the same timestamp as the
/// output does not make it stale.
pub fn is_stale<I, P>(output: &Path, inputs: I) -> bool
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let Some(built) = modified(output) else {
        return true;
    };
    inputs
        .into_iter()
        .filter_map(|input| modified(input.as_ref()))
        .any(|time| time > built)
}
