//! Binary entry point: argument dispatch only.
//!
//! Parses the command line, applies the global flags (JSON output, debug,
//! config path, log file), then hands off to the command handlers in
//! `suntimer::commands`. Errors are reported through the logger, or on stderr
//! when JSON output has disabled it, and turn into a failure exit code.

use anyhow::Result;
use std::process::ExitCode;

use suntimer::args::{self, CliAction, CommonOptions, ParsedArgs};
use suntimer::commands::{self, moon, run, simulate, times};
use suntimer::common::constants::{EXIT_FAILURE, EXIT_SUCCESS};
use suntimer::logger::{Log, LoggerGuard};
use suntimer::{log_block_start, log_debug, log_end, log_error_exit, log_pipe, log_version};

fn main() -> ExitCode {
    let parsed_args = ParsedArgs::from_env();

    let outcome = match parsed_args.action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            args::display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError { message } => {
            log_version!();
            log_error_exit!("{}", message);
            log_block_start!("Run 'suntimer --help' for usage");
            log_end!();
            return exit_code(EXIT_FAILURE);
        }
        CliAction::Times { options, date } => with_options(&options, |config| {
            times::run_times_command(config, date.as_deref(), options.json)
        }),
        CliAction::Moon { options, date } => with_options(&options, |config| {
            moon::run_moon_command(config, date.as_deref(), options.json)
        }),
        CliAction::Run { options } => with_options(&options, |config| {
            run::run_run_command(config, options.json)
        }),
        CliAction::Simulate {
            options,
            start_time,
            end_time,
            multiplier,
        } => with_options(&options, |config| {
            simulate::run_simulate_command(
                config,
                &start_time,
                &end_time,
                multiplier,
                options.json,
            )
        }),
    };

    match outcome {
        Ok(()) => exit_code(EXIT_SUCCESS),
        Err(e) => {
            if Log::is_enabled() {
                log_error_exit!("{:#}", e);
                log_end!();
            } else {
                eprintln!("suntimer: {e:#}");
            }
            exit_code(EXIT_FAILURE)
        }
    }
}

/// Apply the global flags, print the header and load the configuration.
///
/// With `--log <file>` output is mirrored into the file until the command
/// returns.
fn with_options(
    options: &CommonOptions,
    command: impl FnOnce(&suntimer::config::Config) -> Result<()>,
) -> Result<()> {
    if options.json {
        Log::set_enabled(false);
    }
    Log::set_debug(options.debug_enabled);

    let _log_guard: Option<LoggerGuard> = options
        .log_file
        .as_ref()
        .map(|path| Log::start_file_logging(path.clone()))
        .transpose()?;

    log_version!();
    if options.debug_enabled {
        log_pipe!();
        log_debug!("Debug mode enabled");
    }
    let config = commands::load_config(options)?;
    command(&config)
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(code as u8)
}
