//! Build system error types

use kiln_config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

/// Exit code for failures without a more specific code
pub const EXIT_FAILURE: i32 = 1;
/// Exit code when no settings file was found
pub const EXIT_NO_CONFIG: i32 = 2;
/// Exit code for an unrecognized `--platform` name
pub const EXIT_UNKNOWN_PLATFORM: i32 = 3;
/// Exit code when an upstream dependency failed to build
pub const EXIT_DEPENDENCY_FAILED: i32 = 4;

/// Codes a compiler status must not be passed through as
const RESERVED_EXIT_CODES: [i32; 3] =
    [EXIT_NO_CONFIG, EXIT_UNKNOWN_PLATFORM, EXIT_DEPENDENCY_FAILED];

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Compilation failed ({}): {command}", describe_status(.status))]
    CompilationFailed {
        command: String,
        status: Option<i32>,
    },

    #[error("Link step failed ({}): {command}", describe_status(.status))]
    LinkFailed {
        command: String,
        status: Option<i32>,
    },

    #[error("Failed to start '{program}': {error}")]
    Spawn {
        program: String,
        error: std::io::Error,
    },

    #[error("Dependency build failed for {path}: {reason}")]
    DependencyFailed { path: PathBuf, reason: String },

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Failed to publish {} header file(s); first: {}", .failures.len(), first_failure(.failures))]
    HeaderPublish { failures: Vec<CopyFailure> },

    #[error("Another build is running in {0}")]
    ProjectLocked(PathBuf),

    #[error("Program {program} exited with {}", describe_status(.status))]
    RunFailed {
        program: PathBuf,
        status: Option<i32>,
    },

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One failed copy during header publishing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyFailure {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub reason: String,
}

impl BuildError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a compilation error
    pub fn compilation(command: impl ToString, status: Option<i32>) -> Self {
        Self::CompilationFailed {
            command: command.to_string(),
            status,
        }
    }

    /// Create a link/archive error
    pub fn link(command: impl ToString, status: Option<i32>) -> Self {
        Self::LinkFailed {
            command: command.to_string(),
            status,
        }
    }

    /// Create a dependency build error
    pub fn dependency(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DependencyFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Process exit code for this error
    ///
    /// A failed compile exits with the compiler's own status when it is a
    /// usable non-zero code that does not collide with a reserved one.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(ConfigError::NotFound(_)) => EXIT_NO_CONFIG,
            Self::Config(ConfigError::UnknownPlatform(_)) => EXIT_UNKNOWN_PLATFORM,
            Self::CompilationFailed { status, .. } => status
                .filter(|code| (1..=255).contains(code) && !RESERVED_EXIT_CODES.contains(code))
                .unwrap_or(EXIT_FAILURE),
            Self::DependencyFailed { .. } | Self::CircularDependency(_) => EXIT_DEPENDENCY_FAILED,
            _ => EXIT_FAILURE,
        }
    }
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

fn first_failure(failures: &[CopyFailure]) -> String {
    failures
        .first()
        .map(|f| format!("{} -> {}: {}", f.source.display(), f.destination.display(), f.reason))
        .unwrap_or_default()
}
