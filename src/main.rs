//! Main application entry point.
//!
//! Parses the command line and dispatches to the matching handler in the
//! library. Everything beyond dispatch lives in `lightkeeper`:
//!
//! - `Lightkeeper`: the long-running scheduler (default action)
//! - `commands::status`: one-shot report of what the scheduler would do
//! - `commands::toggle`: manual override for a single device
//! - `commands::simulate`: the scheduler against a fast-forward clock

use anyhow::Result;
use std::path::PathBuf;

use lightkeeper::Lightkeeper;
use lightkeeper::args::{self, CliAction, ParsedArgs};
use lightkeeper::commands;

fn main() -> Result<()> {
    let parsed_args = ParsedArgs::from_env();

    match parsed_args.action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp | CliAction::ShowHelpDueToError => {
            args::display_help();
            Ok(())
        }
        CliAction::HelpCommand { command } => commands::help::run_help_command(command.as_deref()),
        CliAction::Run {
            debug_enabled,
            config_path,
        } => Lightkeeper::new(debug_enabled)
            .with_config_path(config_path.map(PathBuf::from))
            .run(),
        CliAction::Status {
            debug_enabled,
            config_path,
        } => commands::status::handle_status_command(config_path.as_deref(), debug_enabled),
        CliAction::Toggle {
            debug_enabled,
            device,
            config_path,
        } => commands::toggle::handle_toggle_command(
            &device,
            config_path.as_deref(),
            debug_enabled,
        ),
        CliAction::Simulate {
            debug_enabled,
            start_time,
            end_time,
            config_path,
        } => commands::simulate::handle_simulate_command(
            &start_time,
            &end_time,
            config_path.as_deref(),
            debug_enabled,
        ),
    }
}
