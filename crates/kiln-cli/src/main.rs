use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use kiln_build::error::EXIT_FAILURE;
use kiln_build::BuildError;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

/// Incremental build orchestrator for C and C++ projects.
///
/// Reads `settings.json` (or `kiln.toml`) from the project directory, builds
/// declared dependencies first, recompiles changed sources and links or
/// archives the result.
///
/// EXAMPLES:
///     kiln                      Incremental build of the current project
///     kiln -c -v                Full rebuild, echoing every command
///     kiln --global-clean       Full rebuild of the project and its dependencies
///     kiln --platform windows   Use settings.windows.json
///     kiln -r                   Build, then run the executable
///
/// ENVIRONMENT VARIABLES:
///     KILN_COMPILER, KILN_LINKER, KILN_ARCHIVER   Override toolchain commands
///     KILN_LOG                                     Log filter (e.g. kiln_build=debug)
///     NO_COLOR                                     Disable colored output
#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(version)]
struct Cli {
    /// Rebuild every file of this project
    #[arg(short = 'c', long)]
    clean: bool,

    /// Echo every command before running it
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Run the executable after a successful build
    #[arg(short = 'r', long)]
    run: bool,

    /// Rebuild every file of this project and all dependencies
    #[arg(long)]
    global_clean: bool,

    /// Verbose output for this project and all dependencies
    #[arg(long)]
    global_verbose: bool,

    /// Use the settings variant for this platform (linux, darwin, mac, windows)
    #[arg(long, value_name = "NAME")]
    platform: Option<String>,

    /// Project directory
    #[arg(short = 'C', long = "directory", value_name = "DIR")]
    directory: Option<PathBuf>,
}

impl Cli {
    fn into_args(self) -> commands::build::BuildArgs {
        commands::build::BuildArgs {
            clean: self.clean,
            verbose: self.verbose,
            run: self.run,
            global_clean: self.global_clean,
            global_verbose: self.global_verbose,
            platform: self.platform,
            project_dir: self.directory,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let cli_config = config::Config::from_env();

    if cli_config.no_color {
        colored::control::set_override(false);
    }
    init_tracing(&cli_config, cli.verbose || cli.global_verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    commands::build::run(cli.into_args())?;
    Ok(())
}

fn init_tracing(cli_config: &config::Config, verbose: bool) {
    let filter = cli_config
        .log_filter
        .as_deref()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(config::Config::default_filter(verbose)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Process exit code for a failed build
fn exit_code(error: &anyhow::Error) -> u8 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<BuildError>())
        .map(BuildError::exit_code)
        .and_then(|code| u8::try_from(code).ok())
        .unwrap_or(EXIT_FAILURE as u8)
}
