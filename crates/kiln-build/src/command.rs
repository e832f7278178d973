//! Compiler, linker and archiver command synthesis

use crate::discover::{normalize_key, resolve_key};
use crate::error::{BuildError, BuildResult};
use crate::fingerprint::compute_hash;
use kiln_config::ProjectConfig;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use walkdir::WalkDir;

/// Implementation suffixes tried, in order, when a header changes
pub const IMPLEMENTATION_SUFFIXES: [&str; 2] = [".cpp", ".c"];

/// Extension of object artifacts
pub const OBJECT_EXTENSION: &str = "o";

/// A program invocation: program plus argument vector, never a shell string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run to completion in `cwd` with inherited stdio
    pub fn status(&self, cwd: &Path) -> BuildResult<ExitStatus> {
        Command::new(&self.program)
            .args(&self.args)
            .current_dir(cwd)
            .status()
            .map_err(|e| BuildError::Spawn {
                program: self.program.clone(),
                error: e,
            })
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Map a rebuild entry to the translation unit it compiles
///
/// Headers map to a co-located implementation file (`.cpp`, then `.c`);
/// a header with neither yields `None`. Other files map to themselves.
pub fn translation_unit(project_dir: &Path, file: &str, config: &ProjectConfig) -> Option<String> {
    let Some(stem) = file.strip_suffix(config.header_suffix.as_str()) else {
        return Some(file.to_string());
    };

    IMPLEMENTATION_SUFFIXES
        .iter()
        .map(|suffix| format!("{}{}", stem, suffix))
        .find(|candidate| resolve_key(project_dir, candidate).is_file())
}

/// Object artifact for a translation unit
///
/// `<ObjectLocation>/<stem>-<path hash>.o`: the hash of the normalized
/// source path keeps same-named files from different directories apart.
pub fn object_path(file: &str, config: &ProjectConfig) -> PathBuf {
    let stem = Path::new(file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let hash = compute_hash(file.as_bytes());
    config
        .object_location
        .join(format!("{}-{}.{}", stem, hash.short(16), OBJECT_EXTENSION))
}

/// Compile command for one rebuild entry, or `None` for a header without
/// an implementation file
pub fn compile_command(
    project_dir: &Path,
    file: &str,
    config: &ProjectConfig,
) -> Option<CommandLine> {
    let unit = translation_unit(project_dir, file, config)?;

    let mut command = CommandLine::new(&config.compiler).arg("-c");
    if Path::new(&unit).extension().and_then(|e| e.to_str()) == Some("c") {
        command = command
            .args(["-x", "c"])
            .args(config.c_standard_arguments.iter().cloned());
    } else {
        command = command.args(config.standard_arguments.iter().cloned());
    }

    command = command.arg(unit.as_str());
    for header_dir in &config.header_locations {
        command = command.arg("-I").arg(header_dir.to_string_lossy());
    }

    Some(
        command
            .arg("-o")
            .arg(object_path(&unit, config).to_string_lossy()),
    )
}

/// Every object file currently under the object directory, sorted
///
/// Paths are relative to `project_dir` when the object directory is.
pub fn collect_objects(project_dir: &Path, config: &ProjectConfig) -> Vec<String> {
    let object_dir = project_dir.join(&config.object_location);
    if !object_dir.is_dir() {
        return Vec::new();
    }

    let mut objects: Vec<String> = WalkDir::new(&object_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some(OBJECT_EXTENSION))
        .map(|e| normalize_key(project_dir, e.path()))
        .collect();
    objects.sort();
    objects
}

/// Link all objects into the executable
pub fn link_command(objects: &[String], config: &ProjectConfig) -> CommandLine {
    let mut command = CommandLine::new(config.linker())
        .args(objects.iter().cloned())
        .args(config.libraries.iter().cloned());
    for library_dir in &config.library_locations {
        command = command.arg("-L").arg(library_dir.to_string_lossy());
    }
    command.arg("-o").arg(config.executable_name())
}

/// Archive all objects into the static library
pub fn archive_command(objects: &[String], config: &ProjectConfig) -> CommandLine {
    CommandLine::new(&config.archiver)
        .arg("-r")
        .arg(config.library_name())
        .args(objects.iter().cloned())
}

/// Commands for one build cycle
#[derive(Debug, Clone, Default)]
pub struct CommandSet {
    compile: Vec<CommandLine>,
    seen: HashSet<CommandLine>,
    skipped_headers: Vec<String>,
}

impl CommandSet {
    /// Synthesize compile commands for `files`, dropping duplicates
    pub fn from_rebuild<'a>(
        project_dir: &Path,
        files: impl IntoIterator<Item = &'a str>,
        config: &ProjectConfig,
    ) -> Self {
        let mut set = Self::default();
        for file in files {
            match compile_command(project_dir, file, config) {
                Some(command) => {
                    set.push(command);
                }
                None => {
                    tracing::debug!("No implementation file for header {}", file);
                    set.skipped_headers.push(file.to_string());
                }
            }
        }
        set
    }

    /// Add a command unless an identical one is already queued
    pub fn push(&mut self, command: CommandLine) -> bool {
        if self.seen.insert(command.clone()) {
            self.compile.push(command);
            true
        } else {
            false
        }
    }

    pub fn compile_commands(&self) -> &[CommandLine] {
        &self.compile
    }

    /// Headers that produced no command
    pub fn skipped_headers(&self) -> &[String] {
        &self.skipped_headers
    }

    pub fn len(&self) -> usize {
        self.compile.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compile.is_empty()
    }
}

/// The single final step of a cycle
pub fn final_command(objects: &[String], config: &ProjectConfig) -> CommandLine {
    if config.is_library {
        archive_command(objects, config)
    } else {
        link_command(objects, config)
    }
}
