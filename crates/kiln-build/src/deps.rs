//! Upstream dependency builds
//!
//! Each declared dependency is a complete project of its own. It is built
//! with the full pipeline, one at a time and in declared order, before the
//! dependent project classifies its own sources. Only the global flags
//! travel down the tree.

use crate::artifact::{modified, TargetKind};
use crate::error::{BuildError, BuildResult};
use crate::fingerprint::FingerprintStore;
use kiln_config::ConfigLoader;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Environment variable carrying the chain of projects being built
pub const BUILD_CHAIN_VAR: &str = "KILN_BUILD_CHAIN";

/// Flags forwarded to dependency builds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagatedFlags {
    /// `--global-clean`
    pub force_clean: bool,
    /// `--global-verbose`
    pub verbose: bool,
}

impl PropagatedFlags {
    /// Command-line form for the child invocation
    pub fn to_args(&self) -> Vec<&'static str> {
        let mut args = Vec::new();
        if self.force_clean {
            args.push("--global-clean");
        }
        if self.verbose {
            args.push("--global-verbose");
        }
        args
    }
}

/// Canonical directories of the projects currently being built, outermost first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildChain(Vec<PathBuf>);

impl BuildChain {
    /// Chain inherited from a parent build, empty for a top-level build
    pub fn from_env() -> Self {
        match env::var_os(BUILD_CHAIN_VAR) {
            Some(value) if !value.is_empty() => Self(env::split_paths(&value).collect()),
            _ => Self::default(),
        }
    }

    /// This chain extended with `project_dir`
    pub fn with(&self, project_dir: PathBuf) -> Self {
        let mut chain = self.0.clone();
        chain.push(project_dir);
        Self(chain)
    }

    pub fn contains(&self, project_dir: &Path) -> bool {
        self.0.iter().any(|p| p == project_dir)
    }

    pub fn projects(&self) -> &[PathBuf] {
        &self.0
    }

    /// Value for [`BUILD_CHAIN_VAR`]
    pub fn to_env(&self) -> BuildResult<OsString> {
        env::join_paths(&self.0).map_err(|e| {
            BuildError::CircularDependency(format!("cannot encode build chain: {}", e))
        })
    }

    fn describe(&self, next: &Path) -> String {
        self.0
            .iter()
            .chain(std::iter::once(&next.to_path_buf()))
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Runs the full pipeline for one dependency project
pub trait ProjectInvoker {
    /// Build the project at `project_dir`; `chain` holds every project above
    /// it, the invoked build appends itself.
    fn build(&self, project_dir: &Path, flags: PropagatedFlags, chain: &BuildChain) -> BuildResult<()>;
}

/// Builds dependencies by re-running an executable in their directory
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    program: PathBuf,
}

impl ProcessInvoker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Invoker that re-runs the currently executing binary
    pub fn current_exe() -> BuildResult<Self> {
        let program = env::current_exe().map_err(BuildError::Io)?;
        Ok(Self::new(program))
    }
}

impl ProjectInvoker for ProcessInvoker {
    fn build(&self, project_dir: &Path, flags: PropagatedFlags, chain: &BuildChain) -> BuildResult<()> {
        let status = Command::new(&self.program)
            .args(flags.to_args())
            .current_dir(project_dir)
            .env(BUILD_CHAIN_VAR, chain.to_env()?)
            .status()
            .map_err(|e| BuildError::dependency(project_dir, e))?;

        if status.success() {
            Ok(())
        } else {
            let reason = match status.code() {
                Some(code) => format!("exit status {}", code),
                None => "terminated by signal".to_string(),
            };
            Err(BuildError::dependency(project_dir, reason))
        }
    }
}

/// Outcome of one dependency build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyOutcome {
    /// Canonical project directory
    pub path: PathBuf,
    /// Whether the dependency recompiled something or rewrote its output
    pub rebuilt: bool,
    /// Final output of the dependency, when its settings could be read
    pub output: Option<PathBuf>,
}

/// Outcomes of every dependency build, in build order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyReport {
    pub outcomes: Vec<DependencyOutcome>,
}

impl DependencyReport {
    /// Whether any dependency produced new output this invocation
    pub fn any_rebuilt(&self) -> bool {
        self.outcomes.iter().any(|o| o.rebuilt)
    }

    /// Final outputs of every dependency that declares one
    pub fn outputs(&self) -> impl Iterator<Item = &Path> {
        self.outcomes.iter().filter_map(|o| o.output.as_deref())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Walks the declared dependency list of one project
pub struct DependencyWalker<'a> {
    invoker: &'a dyn ProjectInvoker,
    verbose: bool,
}

impl<'a> DependencyWalker<'a> {
    pub fn new(invoker: &'a dyn ProjectInvoker) -> Self {
        Self {
            invoker,
            verbose: false,
        }
    }

    /// Announce each dependency on stdout
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Build every dependency of the project at `project_dir`, stopping at
    /// the first failure
    ///
    /// Relative dependency paths are resolved against `project_dir`. `chain`
    /// must already contain the project itself.
    pub fn walk(
        &self,
        project_dir: &Path,
        dependencies: &[PathBuf],
        flags: PropagatedFlags,
        chain: &BuildChain,
    ) -> BuildResult<DependencyReport> {
        let mut report = DependencyReport::default();

        for dependency in dependencies {
            let declared = project_dir.join(dependency);
            let dir = declared
                .canonicalize()
                .map_err(|e| BuildError::dependency(&declared, e))?;

            if chain.contains(&dir) {
                return Err(BuildError::CircularDependency(chain.describe(&dir)));
            }

            if self.verbose {
                println!("Building dependency {}", dir.display());
            }
            tracing::info!("Building dependency {}", dir.display());

            let store = FingerprintStore::new(&dir);
            let output = output_path(&dir);
            let manifest_before = store.file_fingerprint();
            let output_before = output.as_deref().and_then(modified);
            self.invoker.build(&dir, flags, chain)?;
            let rebuilt = store.file_fingerprint() != manifest_before
                || output.as_deref().and_then(modified) != output_before;

            tracing::debug!("Dependency {} done (rebuilt: {})", dir.display(), rebuilt);
            report.outcomes.push(DependencyOutcome {
                path: dir,
                rebuilt,
                output,
            });
        }

        Ok(report)
    }
}

/// Final output of the project at `project_dir`, from its base settings
fn output_path(project_dir: &Path) -> Option<PathBuf> {
    match ConfigLoader::new().load_from_directory(project_dir) {
        Ok(loaded) => {
            let kind = TargetKind::of(&loaded.config);
            Some(project_dir.join(kind.output_name(&loaded.config)))
        }
        Err(e) => {
            tracing::debug!("No output known for {}: {}", project_dir.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::TempDir;

    /// Records builds and optionally fails or rewrites the manifest
    #[derive(Default)]
    struct Recorder {
        built: RefCell<Vec<(PathBuf, PropagatedFlags, usize)>>,
        fail_on: Option<&'static str>,
        touch_manifest: bool,
        write_output: Option<&'static str>,
    }

    impl ProjectInvoker for Recorder {
        fn build(&self, dir: &Path, flags: PropagatedFlags, chain: &BuildChain) -> BuildResult<()> {
            self.built
                .borrow_mut()
                .push((dir.to_path_buf(), flags, chain.projects().len()));
            if self.fail_on.is_some_and(|name| dir.ends_with(name)) {
                return Err(BuildError::dependency(dir, "exit status 1"));
            }
            if self.touch_manifest {
                fs::write(dir.join("files.json"), format!("{}", dir.display())).unwrap();
            }
            if let Some(name) = self.write_output {
                fs::write(dir.join(name), "archive").unwrap();
            }
            Ok(())
        }
    }

    fn workspace(names: &[&str]) -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        for name in names {
            fs::create_dir_all(temp.path().join(name)).unwrap();
        }
        let app = temp.path().join("app").canonicalize().unwrap();
        (temp, app)
    }

    #[test]
    fn test_flags_to_args() {
        assert!(PropagatedFlags::default().to_args().is_empty());
        let flags = PropagatedFlags {
            force_clean: true,
            verbose: true,
        };
        assert_eq!(flags.to_args(), vec!["--global-clean", "--global-verbose"]);
    }

    #[test]
    fn test_walk_in_declared_order() {
        let (_temp, app) = workspace(&["app", "d1", "d2"]);
        let recorder = Recorder::default();
        let chain = BuildChain::default().with(app.clone());
        let flags = PropagatedFlags {
            force_clean: true,
            verbose: false,
        };

        let report = DependencyWalker::new(&recorder)
            .walk(&app, &[PathBuf::from("../d2"), PathBuf::from("../d1")], flags, &chain)
            .unwrap();

        let built = recorder.built.borrow();
        assert_eq!(built.len(), 2);
        assert!(built[0].0.ends_with("d2"));
        assert!(built[1].0.ends_with("d1"));
        assert_eq!(built[0].1, flags);
        assert_eq!(built[0].2, 1);
        assert_eq!(report.len(), 2);
        assert!(!report.any_rebuilt());
    }

    #[test]
    fn test_failure_stops_walk() {
        let (_temp, app) = workspace(&["app", "d1", "d2"]);
        let recorder = Recorder {
            fail_on: Some("d1"),
            ..Default::default()
        };
        let chain = BuildChain::default().with(app.clone());

        let err = DependencyWalker::new(&recorder)
            .walk(
                &app,
                &[PathBuf::from("../d1"), PathBuf::from("../d2")],
                PropagatedFlags::default(),
                &chain,
            )
            .unwrap_err();

        assert!(matches!(err, BuildError::DependencyFailed { .. }));
        assert_eq!(recorder.built.borrow().len(), 1);
    }

    #[test]
    fn test_missing_dependency_directory() {
        let (_temp, app) = workspace(&["app"]);
        let recorder = Recorder::default();
        let chain = BuildChain::default().with(app.clone());

        let err = DependencyWalker::new(&recorder)
            .walk(&app, &[PathBuf::from("../nowhere")], PropagatedFlags::default(), &chain)
            .unwrap_err();

        assert!(matches!(err, BuildError::DependencyFailed { .. }));
        assert!(recorder.built.borrow().is_empty());
    }

    #[test]
    fn test_cycle_detected() {
        let (_temp, app) = workspace(&["app"]);
        let recorder = Recorder::default();
        let chain = BuildChain::default().with(app.clone());

        let err = DependencyWalker::new(&recorder)
            .walk(&app, &[PathBuf::from(".")], PropagatedFlags::default(), &chain)
            .unwrap_err();

        assert!(matches!(err, BuildError::CircularDependency(_)));
    }

    #[test]
    fn test_manifest_change_marks_rebuilt() {
        let (_temp, app) = workspace(&["app", "d1"]);
        let recorder = Recorder {
            touch_manifest: true,
            ..Default::default()
        };
        let chain = BuildChain::default().with(app.clone());

        let report = DependencyWalker::new(&recorder)
            .walk(&app, &[PathBuf::from("../d1")], PropagatedFlags::default(), &chain)
            .unwrap();

        assert!(report.any_rebuilt());
    }

    #[test]
    fn test_rewritten_output_marks_rebuilt() {
        let (temp, app) = workspace(&["app", "d1"]);
        let d1 = temp.path().join("d1");
        fs::write(
            d1.join("settings.json"),
            r#"{"OutputFile": "libd1", "IsLibrary": true}"#,
        )
        .unwrap();
        let recorder = Recorder {
            write_output: Some("libd1.a"),
            ..Default::default()
        };
        let chain = BuildChain::default().with(app.clone());

        let report = DependencyWalker::new(&recorder)
            .walk(&app, &[PathBuf::from("../d1")], PropagatedFlags::default(), &chain)
            .unwrap();

        assert!(report.any_rebuilt());
        let outputs: Vec<&Path> = report.outputs().collect();
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].ends_with("d1/libd1.a"));
    }

    #[test]
    fn test_unreadable_settings_leave_output_unknown() {
        let (_temp, app) = workspace(&["app", "d1"]);
        let recorder = Recorder::default();
        let chain = BuildChain::default().with(app.clone());

        let report = DependencyWalker::new(&recorder)
            .walk(&app, &[PathBuf::from("../d1")], PropagatedFlags::default(), &chain)
            .unwrap();

        assert_eq!(report.outputs().count(), 0);
        assert!(!report.any_rebuilt());
    }

    #[test]
    fn test_chain_env_roundtrip() {
        let chain = BuildChain::default()
            .with(PathBuf::from("/a"))
            .with(PathBuf::from("/b"));
        let encoded = chain.to_env().unwrap();
        let decoded: Vec<PathBuf> = env::split_paths(&encoded).collect();
        assert_eq!(decoded, chain.projects());
    }
}
