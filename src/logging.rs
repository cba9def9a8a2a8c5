//! Diagnostic logging setup
//!
//! Diagnostics go to stderr through `tracing`. `LOGTALLY_LOG` takes an
//! `EnvFilter` directive and wins over the command-line verbosity.

use is_terminal::IsTerminal;
use tracing::{debug, trace};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "LOGTALLY_LOG";

/// Level implied by `-q` and the number of `-v` flags
pub fn level_for(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn build_filter(verbose: u8, quiet: bool) -> EnvFilter {
    match std::env::var(LOG_ENV_VAR) {
        Ok(directive) if !directive.trim().is_empty() => EnvFilter::try_new(&directive)
            .unwrap_or_else(|e| {
                eprintln!("logtally: ignoring invalid {}: {}", LOG_ENV_VAR, e);
                EnvFilter::new(level_for(verbose, quiet))
            }),
        _ => EnvFilter::new(level_for(verbose, quiet)),
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(verbose: u8, quiet: bool) {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(build_filter(verbose, quiet))
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(verbose >= 2)
        .with_thread_ids(verbose >= 3)
        .with_line_number(verbose >= 3)
        .try_init()
        .is_ok();

    if installed {
        debug!(verbose, "logging initialised");
        trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());
    }
}
