//! Help command implementation.

use anyhow::Result;

/// Run the help command (dispatcher)
pub fn run_help_command(command: Option<&str>) -> Result<()> {
    match command {
        None => crate::args::display_help(),
        Some("run") => display_run_help(),
        Some("status") => display_status_help(),
        Some("toggle") => display_toggle_help(),
        Some("simulate") => display_simulate_help(),
        Some(unknown) => {
            log_warning!("Unknown command: {}", unknown);
            crate::args::display_help();
        }
    }
    Ok(())
}

fn display_run_help() {
    log_version!();
    log_block_start!("run - Keep devices lit through Shabbat and Yom Tov");
    log_block_start!("Usage: lightkeeper [run] [--config <file>] [--debug]");
    log_block_start!("Behavior:");
    log_indented!("Re-reads the config file every tick and rediscovers devices");
    log_indented!("Switches devices only around forbidden windows, unless testing is on");
    log_indented!("Wakes exactly at window start and end");
    log_block_start!("Signals:");
    log_indented!("SIGHUP, SIGUSR2  Run a tick now");
    log_indented!("SIGINT, SIGTERM  Shut down");
    log_end!();
}

fn display_status_help() {
    log_version!();
    log_block_start!("status - Show what the scheduler would do right now");
    log_block_start!("Usage: lightkeeper status [--config <file>]");
    log_block_start!("Output:");
    log_indented!("Today's sunrise, sunset and nightfall");
    log_indented!("Forbidden windows near now and the current phase");
    log_indented!("Each device's state and decision (no commands are sent)");
    log_end!();
}

fn display_toggle_help() {
    log_version!();
    log_block_start!("toggle - Flip one device");
    log_block_start!("Usage: lightkeeper toggle <name|address> [--config <file>]");
    log_block_start!("Output:");
    log_indented!("{{\"status\": \"on\", \"message\": \"<alias> turned on\"}}");
    log_block_start!("Exit codes:");
    log_indented!("0  Device switched");
    log_indented!("1  Device unreachable or rejected the command");
    log_indented!("2  No such device in the config");
    log_end!();
}

fn display_simulate_help() {
    log_version!();
    log_block_start!("simulate - Run the scheduler over a span of simulated time");
    log_block_start!("Usage: lightkeeper simulate <start> <end> [--debug]");
    log_block_start!("Arguments:");
    log_indented!("start, end  Local times as \"YYYY-MM-DD HH:MM:SS\" in TIMEZONE");
    log_block_start!("Notes:");
    log_indented!("Time advances instantly; real devices are still switched");
    log_end!();
}
