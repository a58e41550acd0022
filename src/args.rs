//! Command-line argument parsing and processing.
//!
//! Hand-rolled parser for the small suntimer command set. Global flags may
//! appear anywhere; the first positional argument selects the command and
//! defaults to `run`.

/// Flags shared by every command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommonOptions {
    pub debug_enabled: bool,
    pub config_path: Option<String>,
    /// Emit machine-readable JSON instead of decorated log output.
    pub json: bool,
    /// Mirror log output into this file.
    pub log_file: Option<String>,
}

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Print the sun time table
    Times {
        options: CommonOptions,
        date: Option<String>,
    },
    /// Print moon times, position, and illumination
    Moon {
        options: CommonOptions,
        date: Option<String>,
    },
    /// Run the configured nodes in real time
    Run { options: CommonOptions },
    /// Run the configured nodes on a simulated clock
    Simulate {
        options: CommonOptions,
        start_time: String,
        end_time: String,
        /// 0 = fast-forward, otherwise real-time acceleration factor
        multiplier: f64,
    },
    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to invalid arguments and exit
    ShowHelpDueToError { message: String },
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// # Arguments
    /// * `args` - Iterator over command-line arguments (typically from std::env::args())
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        // Version, then help, take precedence over everything else
        if args_vec
            .iter()
            .any(|arg| arg == "--version" || arg == "-V" || arg == "-v")
        {
            return ParsedArgs {
                action: CliAction::ShowVersion,
            };
        }
        if args_vec.iter().any(|arg| arg == "--help" || arg == "-h") {
            return ParsedArgs {
                action: CliAction::ShowHelp,
            };
        }

        let action = Self::parse_action(&args_vec)
            .unwrap_or_else(|message| CliAction::ShowHelpDueToError { message });
        ParsedArgs { action }
    }

    fn parse_action(args: &[String]) -> Result<CliAction, String> {
        let mut options = CommonOptions::default();
        let mut date: Option<String> = None;
        let mut multiplier: Option<f64> = None;
        let mut positional: Vec<String> = Vec::new();

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let mut value_for = || {
                iter.next()
                    .cloned()
                    .ok_or_else(|| format!("{arg} requires a value"))
            };
            match arg.as_str() {
                "--debug" | "-d" => options.debug_enabled = true,
                "--json" | "-j" => options.json = true,
                "--config" | "-c" => options.config_path = Some(value_for()?),
                "--log" | "-l" => options.log_file = Some(value_for()?),
                "--date" => date = Some(value_for()?),
                "--multiplier" | "-m" => {
                    let raw = value_for()?;
                    let value = raw
                        .parse::<f64>()
                        .ok()
                        .filter(|m| m.is_finite() && *m >= 0.0)
                        .ok_or_else(|| format!("invalid multiplier '{raw}'"))?;
                    multiplier = Some(value);
                }
                flag if flag.starts_with('-') && flag.len() > 1 => {
                    return Err(format!("unknown option '{flag}'"));
                }
                _ => positional.push(arg.clone()),
            }
        }

        let command = positional.first().map(String::as_str).unwrap_or("run");
        let rest = positional.get(1..).unwrap_or_default();

        if date.is_some() && !matches!(command, "times" | "t" | "moon" | "m") {
            return Err("--date only applies to 'times' and 'moon'".into());
        }
        if multiplier.is_some() && !matches!(command, "simulate" | "s") {
            return Err("--multiplier only applies to 'simulate'".into());
        }

        let action = match command {
            "times" | "t" => {
                expect_args(command, rest, 0)?;
                CliAction::Times { options, date }
            }
            "moon" | "m" => {
                expect_args(command, rest, 0)?;
                CliAction::Moon { options, date }
            }
            "run" | "r" => {
                expect_args(command, rest, 0)?;
                CliAction::Run { options }
            }
            "simulate" | "s" => {
                expect_args(command, rest, 2)?;
                CliAction::Simulate {
                    options,
                    start_time: rest[0].clone(),
                    end_time: rest[1].clone(),
                    multiplier: multiplier.unwrap_or(0.0),
                }
            }
            other => return Err(format!("unknown command '{other}'")),
        };
        Ok(action)
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

fn expect_args(command: &str, rest: &[String], count: usize) -> Result<(), String> {
    if rest.len() == count {
        Ok(())
    } else {
        Err(format!(
            "'{command}' takes {count} argument(s), got {}",
            rest.len()
        ))
    }
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("suntimer [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <file>    Use a specific configuration file");
    log_indented!("-d, --debug            Enable detailed debug output");
    log_indented!("-j, --json             Print JSON instead of decorated output");
    log_indented!("-l, --log <file>       Also write log output to a file");
    log_indented!("    --date <date>      Day for 'times' and 'moon' (YYYY-MM-DD)");
    log_indented!("-m, --multiplier <x>   Simulation speed (0 = instant, default)");
    log_indented!("-h, --help             Print help information");
    log_indented!("-V, --version          Print version information");
    log_block_start!("Commands:");
    log_indented!("times, t               Print today's sun time table");
    log_indented!("moon, m                Print moon rise/set, position and phase");
    log_indented!("run, r                 Run the configured nodes (default)");
    log_indented!("simulate, s <start> <end>");
    log_indented!("                       Run the nodes on a simulated clock");
    log_indented!("                       Times use \"YYYY-MM-DD HH:MM:SS\"");
    log_block_start!("Signals while running:");
    log_indented!("SIGUSR1                Trigger every node once");
    log_indented!("SIGHUP, SIGUSR2        Reload the configuration");
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliAction {
        let mut full = vec!["suntimer"];
        full.extend_from_slice(args);
        ParsedArgs::parse(full).action
    }

    #[test]
    fn test_parse_no_args() {
        assert_eq!(
            parse(&[]),
            CliAction::Run {
                options: CommonOptions::default()
            }
        );
    }

    #[test]
    fn test_parse_debug_flag() {
        for flag in ["--debug", "-d"] {
            assert_eq!(
                parse(&[flag]),
                CliAction::Run {
                    options: CommonOptions {
                        debug_enabled: true,
                        ..Default::default()
                    }
                }
            );
        }
    }

    #[test]
    fn test_parse_help_and_version() {
        assert_eq!(parse(&["--help"]), CliAction::ShowHelp);
        assert_eq!(parse(&["-h"]), CliAction::ShowHelp);
        assert_eq!(parse(&["-V"]), CliAction::ShowVersion);
        assert_eq!(parse(&["-v"]), CliAction::ShowVersion);
        // Version takes precedence
        assert_eq!(
            parse(&["--version", "--help", "--debug"]),
            CliAction::ShowVersion
        );
        // Help wins over an otherwise invalid line
        assert_eq!(parse(&["--bogus", "-h"]), CliAction::ShowHelp);
    }

    #[test]
    fn test_parse_times_with_date_and_config() {
        assert_eq!(
            parse(&["-c", "/tmp/s.toml", "times", "--date", "2024-06-21", "--json"]),
            CliAction::Times {
                options: CommonOptions {
                    config_path: Some("/tmp/s.toml".into()),
                    json: true,
                    ..Default::default()
                },
                date: Some("2024-06-21".into()),
            }
        );
    }

    #[test]
    fn test_parse_moon_alias() {
        assert_eq!(
            parse(&["m"]),
            CliAction::Moon {
                options: CommonOptions::default(),
                date: None,
            }
        );
    }

    #[test]
    fn test_parse_simulate() {
        assert_eq!(
            parse(&[
                "simulate",
                "2024-01-01 00:00:00",
                "2024-01-02 00:00:00",
                "-m",
                "3600",
                "--log",
                "sim.log",
            ]),
            CliAction::Simulate {
                options: CommonOptions {
                    log_file: Some("sim.log".into()),
                    ..Default::default()
                },
                start_time: "2024-01-01 00:00:00".into(),
                end_time: "2024-01-02 00:00:00".into(),
                multiplier: 3600.0,
            }
        );
    }

    #[test]
    fn test_simulate_defaults_to_fast_forward() {
        let CliAction::Simulate { multiplier, .. } =
            parse(&["s", "2024-01-01 00:00:00", "2024-01-02 00:00:00"])
        else {
            panic!("expected simulate");
        };
        assert_eq!(multiplier, 0.0);
    }

    #[test]
    fn test_parse_errors() {
        let is_error = |action: CliAction| matches!(action, CliAction::ShowHelpDueToError { .. });
        assert!(is_error(parse(&["--unknown"])));
        assert!(is_error(parse(&["--debug", "--invalid"])));
        assert!(is_error(parse(&["dance"])));
        assert!(is_error(parse(&["--config"])));
        assert!(is_error(parse(&["simulate", "2024-01-01 00:00:00"])));
        assert!(is_error(parse(&["run", "extra"])));
        assert!(is_error(parse(&["run", "--date", "2024-01-01"])));
        assert!(is_error(parse(&["times", "--multiplier", "2"])));
        assert!(is_error(parse(&[
            "simulate",
            "a",
            "b",
            "--multiplier",
            "-3"
        ])));
    }
}
