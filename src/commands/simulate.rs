//! Implementation of the `simulate` command.
//!
//! Runs the real scheduler (real devices, real config) against a clock that
//! jumps forward by each requested sleep, so a whole Shabbat can be
//! rehearsed in seconds.

use anyhow::{Result, bail};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Environment;
use crate::lightkeeper::Lightkeeper;
use crate::time::source::{SimulatedTimeSource, parse_datetime_in_tz};

/// Handle `lightkeeper simulate <start> <end>`.
///
/// Times are local to the `TIMEZONE` environment variable.
pub fn handle_simulate_command(
    start_time: &str,
    end_time: &str,
    config_path: Option<&str>,
    debug_enabled: bool,
) -> Result<()> {
    let environment = Environment::load()?;
    let timezone = environment.timezone;

    let start = parse_datetime_in_tz(start_time, timezone)
        .map_err(|e| anyhow::anyhow!("Invalid start time: {}", e))?;
    let end = parse_datetime_in_tz(end_time, timezone)
        .map_err(|e| anyhow::anyhow!("Invalid end time: {}", e))?;

    if end <= start {
        bail!("End time must be after start time");
    }

    log_version!();
    log_block_start!("Simulation Mode");
    log_decorated!(
        "Simulating from {} to {} ({})",
        start.with_timezone(&timezone).format("%Y-%m-%d %H:%M:%S"),
        end.with_timezone(&timezone).format("%Y-%m-%d %H:%M:%S"),
        timezone
    );
    let span = end - start;
    log_indented!(
        "Total simulated time: {} hours {} minutes",
        span.num_hours(),
        span.num_minutes() % 60
    );

    let source = Arc::new(SimulatedTimeSource::new(start, end));

    Lightkeeper::new(debug_enabled)
        .with_config_path(config_path.map(PathBuf::from))
        .with_time_source(source)
        .without_headers()
        .run()
}
