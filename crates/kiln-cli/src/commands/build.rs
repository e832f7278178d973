//! Build command - one incremental build cycle for a project and its dependencies

use anyhow::{Context, Result};
use colored::Colorize;
use kiln_build::{BuildError, BuildOptions, BuildReport, Builder, ProcessInvoker};
use kiln_config::Platform;
use std::path::PathBuf;

/// Build command arguments
#[derive(Debug, Default)]
pub struct BuildArgs {
    pub clean: bool,
    pub verbose: bool,
    pub run: bool,
    pub global_clean: bool,
    pub global_verbose: bool,
    /// Platform name as typed on the command line
    pub platform: Option<String>,
    /// Project directory (defaults to current directory)
    pub project_dir: Option<PathBuf>,
}

impl BuildArgs {
    /// Resolve the flags into build options
    pub fn options(&self) -> Result<BuildOptions, BuildError> {
        let platform = self
            .platform
            .as_deref()
            .map(str::parse::<Platform>)
            .transpose()?;

        Ok(BuildOptions {
            clean: self.clean,
            verbose: self.verbose,
            run: self.run,
            global_clean: self.global_clean,
            global_verbose: self.global_verbose,
            platform,
        })
    }
}

/// Run the build command
pub fn run(args: BuildArgs) -> Result<BuildReport> {
    let project_dir = args
        .project_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));

    let options = args.options()?;
    tracing::debug!("Building project in {}", project_dir.display());
    let builder = Builder::load(&project_dir, options)?;
    let invoker = ProcessInvoker::current_exe().context("Failed to locate the kiln executable")?;

    let report = builder.build(&invoker)?;
    print_summary(&report, options.verbose());
    Ok(report)
}

fn print_summary(report: &BuildReport, verbose: bool) {
    let stats = &report.stats;
    if report.is_up_to_date() {
        println!("{} nothing to do", "Up to date:".green().bold());
        return;
    }

    let output = report
        .artifact
        .as_ref()
        .map(|a| a.path.display().to_string())
        .unwrap_or_default();
    println!(
        "{} {} ({} compiled, {:.2}s)",
        "Finished".green().bold(),
        output,
        stats.compiled,
        stats.total_time.as_secs_f64()
    );

    if verbose {
        println!("  Discovered: {}", stats.discovered);
        println!("  Rebuilt:    {}", stats.rebuilt);
        if stats.skipped_headers > 0 {
            println!("  Headers without implementation: {}", stats.skipped_headers);
        }
        if stats.removed > 0 {
            println!("  No longer present: {}", stats.removed);
        }
        if !report.dependencies.is_empty() {
            println!("  Dependencies: {}", report.dependencies.len());
        }
    }
}
