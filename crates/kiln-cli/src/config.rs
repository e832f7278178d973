//! CLI configuration via environment variables

use std::env;

/// Environment variable holding the log filter directives
pub const LOG_ENV: &str = "KILN_LOG";

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Disable colored output (KILN_NO_COLOR=1 or NO_COLOR=1)
    pub no_color: bool,
    /// Log filter directives (KILN_LOG=kiln_build=debug)
    pub log_filter: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            no_color: env::var_os("KILN_NO_COLOR").is_some() || env::var_os("NO_COLOR").is_some(),
            log_filter: env::var(LOG_ENV).ok().filter(|v| !v.trim().is_empty()),
        }
    }

    /// Filter used when `KILN_LOG` is unset
    pub fn default_filter(verbose: bool) -> &'static str {
        if verbose {
            "kiln=info,kiln_build=info,kiln_config=info"
        } else {
            "warn"
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
