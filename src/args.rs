//! Command-line argument parsing and processing.
//!
//! Global flags (`--debug`, `--config <file>`, `--help`, `--version`) may
//! appear anywhere; the first bare word selects a command. With no command
//! the scheduler runs in the foreground.

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the scheduler until terminated
    Run {
        debug_enabled: bool,
        config_path: Option<String>,
    },
    /// Print today's times, nearby windows and each device's decision
    Status {
        debug_enabled: bool,
        config_path: Option<String>,
    },
    /// Flip one device by name or address
    Toggle {
        debug_enabled: bool,
        device: String,
        config_path: Option<String>,
    },
    /// Run the scheduler against a fast-forward clock
    Simulate {
        debug_enabled: bool,
        start_time: String,
        end_time: String,
        config_path: Option<String>,
    },
    /// Detailed help for a command, or general help
    HelpCommand { command: Option<String> },

    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to invalid arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments (including the program name) into an
    /// action.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut config_path: Option<String> = None;
        let mut positionals: Vec<String> = Vec::new();

        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut i = 0;
        while i < args_vec.len() {
            let arg = &args_vec[i];
            match arg.as_str() {
                "--help" | "-h" => display_help = true,
                "--version" | "-V" | "-v" => display_version = true,
                "--debug" | "-d" => debug_enabled = true,
                "--config" | "-c" => {
                    if i + 1 < args_vec.len() && !args_vec[i + 1].starts_with('-') {
                        config_path = Some(args_vec[i + 1].clone());
                        i += 1;
                    } else {
                        log_warning!("Missing file for --config. Usage: --config <file>");
                        return Self::error();
                    }
                }
                flag if flag.starts_with('-') => {
                    log_warning!("Unknown option: {}", flag);
                    return Self::error();
                }
                _ => positionals.push(arg.clone()),
            }
            i += 1;
        }

        if display_version {
            return ParsedArgs {
                action: CliAction::ShowVersion,
            };
        }
        if display_help {
            return ParsedArgs {
                action: CliAction::ShowHelp,
            };
        }

        let Some((command, rest)) = positionals.split_first() else {
            return ParsedArgs {
                action: CliAction::Run {
                    debug_enabled,
                    config_path,
                },
            };
        };

        let action = match (command.as_str(), rest) {
            ("run", []) => CliAction::Run {
                debug_enabled,
                config_path,
            },
            ("status", []) => CliAction::Status {
                debug_enabled,
                config_path,
            },
            ("toggle", [device]) => CliAction::Toggle {
                debug_enabled,
                device: device.clone(),
                config_path,
            },
            ("toggle", _) => {
                log_warning!("Usage: lightkeeper toggle <name|address>");
                CliAction::ShowHelpDueToError
            }
            ("simulate", [start, end]) => CliAction::Simulate {
                debug_enabled,
                start_time: start.clone(),
                end_time: end.clone(),
                config_path,
            },
            ("simulate", _) => {
                log_warning!(
                    "Usage: lightkeeper simulate \"YYYY-MM-DD HH:MM:SS\" \"YYYY-MM-DD HH:MM:SS\""
                );
                CliAction::ShowHelpDueToError
            }
            ("help", []) => CliAction::HelpCommand { command: None },
            ("help", [topic]) => CliAction::HelpCommand {
                command: Some(topic.clone()),
            },
            ("run" | "status" | "help", extra) => {
                log_warning!("Unexpected argument for '{}': {}", command, extra.join(" "));
                CliAction::ShowHelpDueToError
            }
            (unknown, _) => {
                log_warning!("Unknown command: {}", unknown);
                CliAction::ShowHelpDueToError
            }
        };

        ParsedArgs { action }
    }

    fn error() -> ParsedArgs {
        ParsedArgs {
            action: CliAction::ShowHelpDueToError,
        }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
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
    log_indented!("lightkeeper [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <file>    Use a specific config file");
    log_indented!("-d, --debug            Show per-device decisions");
    log_indented!("-h, --help             Print help information");
    log_indented!("-V, --version          Print version information");
    log_block_start!("Commands:");
    log_indented!("run                    Run the scheduler (default)");
    log_indented!("status                 Show today's times and what each device would do");
    log_indented!("toggle <device>        Flip one device by name or address");
    log_indented!("simulate <start> <end> Run the scheduler over a simulated time span");
    log_indented!("help [COMMAND]         Show detailed help for a command");
    log_end!();
}
