use clap::{CommandFactory, FromArgMatches};
use crossbeam_channel::unbounded;
use is_terminal::IsTerminal;

use logtally::cli::Cli;
use logtally::config::LogtallyConfig;
use logtally::config_file::ConfigFile;
use logtally::logging;
use logtally::platform::{termination_exit_code, Ctrl, ExitCode, SafeStderr, SignalHandler};
use logtally::runner;

fn main() {
    // Broadcast channel for shutdown requests from the signal handler
    let (ctrl_tx, ctrl_rx) = unbounded::<Ctrl>();

    let _signal_handler = match SignalHandler::new(ctrl_tx) {
        Ok(handler) => handler,
        Err(e) => {
            eprintln!("Failed to initialize signal handling: {}", e);
            ExitCode::GeneralError.exit();
        }
    };

    let mut stderr = SafeStderr::new();

    let cli = process_args_with_config(&mut stderr);
    logging::init(cli.verbose, cli.quiet);

    let config = LogtallyConfig::from_cli(&cli);
    if let Err(e) = config.validate() {
        stderr.writeln(&format!("logtally: Error: {:#}", e));
        ExitCode::InvalidUsage.exit();
    }

    let summary = match runner::run(&config, &ctrl_rx) {
        Ok(summary) => summary,
        Err(e) => {
            stderr.writeln(&format!("logtally: Error: {:#}", e));
            ExitCode::GeneralError.exit();
        }
    };

    if config.output.stats {
        stderr.writeln(&format!("logtally: {}", summary.stats.format_stats()));
    }

    if summary.interrupted {
        if !cli.quiet {
            stderr.writeln("logtally: Processing interrupted, no output written");
        }
        termination_exit_code().exit();
    }

    ExitCode::Success.exit();
}

/// Extract --config-file argument from raw args
fn extract_config_file_arg(args: &[String]) -> Option<String> {
    args.iter().enumerate().find_map(|(i, arg)| {
        if arg == "--config-file" {
            args.get(i + 1).cloned()
        } else {
            arg.strip_prefix("--config-file=").map(str::to_string)
        }
    })
}

fn process_args_with_config(stderr: &mut SafeStderr) -> Cli {
    let raw_args: Vec<String> = std::env::args().collect();

    let config_file_path = extract_config_file_arg(&raw_args);

    // Check for --show-config first, before any other processing
    if raw_args.iter().any(|arg| arg == "--show-config") {
        ConfigFile::show_config(config_file_path.as_deref());
        ExitCode::Success.exit();
    }

    let processed_args = if raw_args.iter().any(|arg| arg == "--ignore-config") {
        raw_args
    } else {
        match ConfigFile::load_with_custom_path(config_file_path.as_deref()) {
            Ok(config_file) => match config_file.process_args(raw_args) {
                Ok(processed) => processed,
                Err(e) => {
                    stderr.writeln(&format!("logtally: Config error: {:#}", e));
                    ExitCode::GeneralError.exit();
                }
            },
            Err(e) => {
                stderr.writeln(&format!("logtally: Config file error: {:#}", e));
                ExitCode::GeneralError.exit();
            }
        }
    };

    // clap prints its own help/version/usage errors and exits with 0 or 2
    let matches = Cli::command().get_matches_from(processed_args);
    let mut cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| {
        stderr.writeln(&format!("logtally: Error: {}", e));
        ExitCode::InvalidUsage.exit();
    });
    cli.resolve_boolean_flags();

    // Show usage instead of waiting on an interactive terminal
    if std::io::stdin().is_terminal() && cli.files.is_empty() {
        println!("{}", Cli::command().render_usage());
        println!("Reads stdin when no files are given; pipe input or pass '-' explicitly.");
        println!("Try 'logtally --help' for more information.");
        ExitCode::Success.exit();
    }

    cli
}
