//! Build orchestration: one full cycle for one project
use crate::artifact::{is_stale, BuildArtifact, TargetKind};
use crate::classify::{classify, RebuildSet};
use crate::command::{collect_objects, final_command, CommandSet};
use crate::deps::{BuildChain, DependencyReport, DependencyWalker, ProjectInvoker, PropagatedFlags};
use crate::discover::discover_sources;
use crate::error::{BuildError, BuildResult};
use crate::fingerprint::{config_fingerprint, FingerprintStore};
use crate::lock::ProjectLock;
use crate::publish::publish_headers;

use kiln_config::{ConfigLoader, Platform, ProjectConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

/// Flags for one invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Full rebuild of this project only
    pub clean: bool,
    /// Echo commands for this project only
    pub verbose: bool,
    /// Execute the binary after a successful cycle
    pub run: bool,
    /// Full rebuild of this project and every dependency
    pub global_clean: bool,
    /// Verbose output for this project and every dependency
    pub global_verbose: bool,
    /// Platform variant of the settings file
    pub platform: Option<Platform>,
}

impl BuildOptions {
    /// Options a dependency is built with
    pub fn from_propagated(flags: PropagatedFlags) -> Self {
        Self {
            global_clean: flags.force_clean,
            global_verbose: flags.verbose,
            ..Default::default()
        }
    }

    pub fn force_clean(&self) -> bool {
        self.clean || self.global_clean
    }

    pub fn verbose(&self) -> bool {
        self.verbose || self.global_verbose
    }

    /// The subset forwarded to dependency builds
    pub fn propagated(&self) -> PropagatedFlags {
        PropagatedFlags {
            force_clean: self.global_clean,
            verbose: self.global_verbose,
        }
    }
}

/// Build statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Files in the source universe
    pub discovered: usize,
    /// Files in the rebuild set
    pub rebuilt: usize,
    /// Compile commands executed
    pub compiled: usize,
    /// Changed headers without an implementation file
    pub skipped_headers: usize,
    /// Recorded files no longer on disk
    pub removed: usize,
    /// Total build time, dependencies included
    pub total_time: Duration,
    /// Time spent building dependencies
    pub dependency_time: Duration,
    /// Time spent compiling
    pub compilation_time: Duration,
    /// Time spent linking or archiving
    pub linking_time: Duration,
}

/// Result of a successful cycle
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub stats: BuildStats,
    pub rebuild: RebuildSet,
    pub dependencies: DependencyReport,
    /// Present when the link or archive step ran
    pub artifact: Option<BuildArtifact>,
    /// Whether the executable was run
    pub ran: bool,
}

impl BuildReport {
    /// Nothing was compiled, linked or archived
    pub fn is_up_to_date(&self) -> bool {
        self.stats.compiled == 0 && self.artifact.is_none()
    }
}

/// Main builder for orchestrating builds
#[derive(Debug, Clone)]
pub struct Builder {
    /// Project root directory
    root_dir: PathBuf,
    /// Effective project settings
    config: ProjectConfig,
    options: BuildOptions,
    /// Projects above this one; read from the environment when unset
    chain: Option<BuildChain>,
}

impl Builder {
    /// Load the settings of the project at `project_path`
    pub fn load(project_path: impl AsRef<Path>, options: BuildOptions) -> BuildResult<Self> {
        let root_dir = project_path.as_ref().to_path_buf();
        let loaded = ConfigLoader::new()
            .with_platform(options.platform)
            .load_from_directory(&root_dir)?;

        tracing::debug!("Using settings {}", loaded.source.display());

        Ok(Self {
            root_dir,
            config: loaded.config,
            options,
            chain: None,
        })
    }

    /// Load with default options
    pub fn new(project_path: impl AsRef<Path>) -> BuildResult<Self> {
        Self::load(project_path, BuildOptions::default())
    }

    /// Builder for an already loaded configuration
    pub fn from_config(project_path: impl Into<PathBuf>, config: ProjectConfig) -> Self {
        Self {
            root_dir: project_path.into(),
            config,
            options: BuildOptions::default(),
            chain: None,
        }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the projects being built above this one
    pub fn with_chain(mut self, chain: BuildChain) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Execute the build, using `invoker` for dependency projects
    pub fn build(&self, invoker: &dyn ProjectInvoker) -> BuildResult<BuildReport> {
        let build_start = Instant::now();
        let root = self
            .root_dir
            .canonicalize()
            .map_err(|e| BuildError::io(&self.root_dir, e))?;
        let _lock = ProjectLock::acquire(&root)?;
        let verbose = self.options.verbose();
        let mut stats = BuildStats::default();

        tracing::info!("Building {}", root.display());

        // Dependencies
        let dependency_start = Instant::now();
        let chain = self
            .chain
            .clone()
            .unwrap_or_else(BuildChain::from_env)
            .with(root.clone());
        let dependencies = DependencyWalker::new(invoker)
            .with_verbose(verbose)
            .walk(&root, &self.config.dependencies, self.options.propagated(), &chain)?;
        stats.dependency_time = dependency_start.elapsed();

        // Classification
        let files = discover_sources(
            &root,
            &self.config.source_locations,
            &self.config.file_suffixes,
            &self.output_directories(),
        );
        stats.discovered = files.len();

        let store = FingerprintStore::new(&root);
        let prior = store.load();
        if prior.is_none() && verbose {
            println!("No files file found, forcing full update");
        }

        let classification = classify(
            &root,
            &files,
            prior.as_ref(),
            &config_fingerprint(&self.config),
            self.options.force_clean(),
        )?;
        stats.rebuilt = classification.rebuild.len();
        stats.removed = classification.removed.len();
        for removed in &classification.removed {
            tracing::debug!("No longer present: {}", removed);
        }

        // Compilation
        let has_work = classification.rebuild.has_work();
        if has_work {
            let compile_start = Instant::now();
            self.prepare_object_dir(&root, classification.rebuild.is_full_rebuild())?;

            let commands = CommandSet::from_rebuild(&root, classification.rebuild.paths(), &self.config);
            stats.skipped_headers = commands.skipped_headers().len();

            for command in commands.compile_commands() {
                if verbose {
                    println!("{}", command);
                }
                let status = command.status(&root)?;
                if !status.success() {
                    println!("{}", command);
                    if !verbose {
                        println!("Error with shown command.");
                    }
                    return Err(BuildError::compilation(command, status.code()));
                }
                stats.compiled += 1;
            }

            store.save(&classification.manifest)?;
            stats.compilation_time = compile_start.elapsed();

            tracing::info!("Compiled {} file(s)", stats.compiled);
        } else if verbose {
            println!("No files changed");
        }

        // Link or archive
        let needs_final = if has_work {
            true
        } else if dependencies.any_rebuilt() {
            tracing::info!("Dependency output changed, repeating final step");
            true
        } else if self.output_is_stale(&root, &dependencies) {
            tracing::info!("Output missing or out of date, repeating final step");
            true
        } else {
            false
        };

        let artifact = if needs_final {
            let link_start = Instant::now();
            let artifact = self.finish(&root, verbose)?;
            stats.linking_time = link_start.elapsed();
            Some(artifact)
        } else {
            None
        };

        let ran = self.options.run && self.run_output(&root, verbose)?;

        stats.total_time = build_start.elapsed();
        tracing::debug!("Build of {} completed in {:.2}s", root.display(), stats.total_time.as_secs_f64());

        Ok(BuildReport {
            stats,
            rebuild: classification.rebuild,
            dependencies,
            artifact,
            ran,
        })
    }

    /// Directories this project writes into, never part of the source universe
    fn output_directories(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.config.object_location.clone()];
        if self.config.is_library {
            dirs.extend(self.config.library_header_output.iter().cloned());
        }
        dirs
    }

    /// Whether the final output is missing or older than an object file or a
    /// dependency output
    fn output_is_stale(&self, root: &Path, dependencies: &DependencyReport) -> bool {
        let output = root.join(TargetKind::of(&self.config).output_name(&self.config));
        let objects = collect_objects(root, &self.config)
            .into_iter()
            .map(|object| root.join(object));
        let upstream = dependencies.outputs().map(Path::to_path_buf);
        is_stale(&output, objects.chain(upstream))
    }

    /// Purge the object directory on a full rebuild, create it if missing
    fn prepare_object_dir(&self, root: &Path, purge: bool) -> BuildResult<()> {
        let object_dir = root.join(&self.config.object_location);
        if purge && object_dir.exists() {
            tracing::debug!("Purging {}", object_dir.display());
            fs::remove_dir_all(&object_dir).map_err(|e| BuildError::io(&object_dir, e))?;
        }
        fs::create_dir_all(&object_dir).map_err(|e| BuildError::io(&object_dir, e))
    }

    /// Link or archive every object, then publish headers for a library
    fn finish(&self, root: &Path, verbose: bool) -> BuildResult<BuildArtifact> {
        let objects = collect_objects(root, &self.config);
        let command = final_command(&objects, &self.config);
        if verbose {
            println!("{}", command);
        }

        let status = command.status(root)?;
        if !status.success() {
            return Err(BuildError::link(&command, status.code()));
        }

        let kind = TargetKind::of(&self.config);
        let mut artifact = BuildArtifact::new(kind, root, &self.config, objects.len());

        if let (TargetKind::StaticLibrary, Some(output)) = (kind, &self.config.library_header_output) {
            let mut roots = self.config.source_locations.clone();
            roots.extend(self.config.header_locations.iter().cloned());
            match publish_headers(root, &roots, &self.config.header_suffix, output) {
                Ok(count) => artifact.published_headers = count,
                Err(e) => {
                    // Without the archive the next run repeats the whole final step
                    if let Err(remove) = fs::remove_file(&artifact.path) {
                        tracing::warn!("Could not remove {}: {}", artifact.path.display(), remove);
                    }
                    return Err(e);
                }
            }
        }

        tracing::info!("Produced {} {}", kind, artifact.path.display());
        Ok(artifact)
    }

    /// Run the executable; a library is never run
    fn run_output(&self, root: &Path, verbose: bool) -> BuildResult<bool> {
        let kind = TargetKind::of(&self.config);
        if !kind.is_runnable() {
            tracing::warn!("--run ignored: {} is a library project", root.display());
            return Ok(false);
        }

        if verbose {
            println!("Running program");
        }

        let program = root.join(kind.output_name(&self.config));
        let status = Command::new(&program)
            .current_dir(root)
            .status()
            .map_err(|e| BuildError::Spawn {
                program: program.display().to_string(),
                error: e,
            })?;

        if status.success() {
            Ok(true)
        } else {
            Err(BuildError::RunFailed {
                program,
                status: status.code(),
            })
        }
    }
}

/// Builds dependencies inside the current process
///
/// Settings are loaded from the dependency's own directory with no platform
/// variant; only the propagated flags apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessInvoker;

impl ProjectInvoker for InProcessInvoker {
    fn build(&self, project_dir: &Path, flags: PropagatedFlags, chain: &BuildChain) -> BuildResult<()> {
        Builder::load(project_dir, BuildOptions::from_propagated(flags))
            .and_then(|builder| builder.with_chain(chain.clone()).build(self))
            .map(|_| ())
            .map_err(|e| match e {
                BuildError::DependencyFailed { .. } | BuildError::CircularDependency(_) => e,
                other => BuildError::dependency(project_dir, other),
            })
    }
}
