//! Kiln build core
//!
//! Incremental builds for native C/C++ projects:
//! - Content fingerprints and the persisted `files.json` manifest
//! - Change classification (full rebuild, new, modified)
//! - Compiler, linker and archiver command synthesis
//! - Upstream dependency builds with cycle detection
//! - Header publishing for static library projects
//! - One advisory lock per project directory

pub mod artifact;
pub mod builder;
pub mod classify;
pub mod command;
pub mod deps;
pub mod discover;
pub mod error;
pub mod fingerprint;
pub mod lock;
pub mod publish;

// Re-export main types
pub use artifact::{BuildArtifact, TargetKind};
pub use builder::{BuildOptions, BuildReport, BuildStats, Builder, InProcessInvoker};
pub use classify::{
    classify, classify_with, Classification, FullRebuildReason, RebuildEntry, RebuildSet,
    RecompileReason,
};
pub use command::{CommandLine, CommandSet};
pub use deps::{
    BuildChain, DependencyOutcome, DependencyReport, DependencyWalker, ProcessInvoker,
    ProjectInvoker, PropagatedFlags, BUILD_CHAIN_VAR,
};
pub use discover::discover_sources;
pub use error::{BuildError, BuildResult, CopyFailure};
pub use fingerprint::{
    compute_file_hash, compute_hash, config_fingerprint, Fingerprint, FingerprintStore, Manifest,
    MANIFEST_FILE,
};
pub use lock::{ProjectLock, LOCK_FILE};
pub use publish::publish_headers;

// Re-export kiln-config types for convenience
pub use kiln_config::{ConfigError, Platform, ProjectConfig};
