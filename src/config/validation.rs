//! Configuration validation functionality.
//!
//! Rejects configurations the scheduler cannot act on sensibly: zero or
//! absurd polling intervals, percentages outside 0-100, window extensions
//! longer than a day, and devices that cannot be told apart.

use anyhow::{Result, bail};
use std::collections::HashSet;

use super::GlobalConfig;
use crate::common::constants::*;

/// Comprehensive configuration validation.
pub fn validate_config(config: &GlobalConfig) -> Result<()> {
    if !(MINIMUM_SLEEP_TIME..=MAXIMUM_SLEEP_TIME).contains(&config.sleep_time) {
        bail!(
            "sleep_time ({} minutes) must be between {} and {} minutes",
            config.sleep_time,
            MINIMUM_SLEEP_TIME,
            MAXIMUM_SLEEP_TIME
        );
    }

    let offsets = config.light_times;
    if offsets.erev > MAXIMUM_WINDOW_OFFSET {
        bail!(
            "light_times.erev ({} minutes) must not exceed {} minutes",
            offsets.erev,
            MAXIMUM_WINDOW_OFFSET
        );
    }
    if offsets.motzei > MAXIMUM_WINDOW_OFFSET {
        bail!(
            "light_times.motzei ({} minutes) must not exceed {} minutes",
            offsets.motzei,
            MAXIMUM_WINDOW_OFFSET
        );
    }

    if config.weather.timeout_secs == 0 {
        bail!("weather.timeout_secs must be greater than zero");
    }
    if config.weather.url.trim().is_empty() {
        bail!("weather.url must not be empty");
    }

    let mut names = HashSet::new();
    let mut addresses = HashSet::new();

    for device in &config.devices {
        if device.name.trim().is_empty() {
            bail!("device with ip '{}' has an empty name", device.ip);
        }
        if device.ip.trim().is_empty() {
            bail!("device '{}' has an empty ip", device.name);
        }
        if !names.insert(device.name.to_ascii_lowercase()) {
            bail!("device name '{}' is used more than once", device.name);
        }
        if !addresses.insert(device.ip.as_str()) {
            bail!("device ip '{}' is used more than once", device.ip);
        }

        if let Some(threshold) = device.cloud_coverage
            && threshold > MAXIMUM_CLOUD_COVERAGE
        {
            bail!(
                "device '{}': cloud_coverage ({}) must be between 0 and {}",
                device.name,
                threshold,
                MAXIMUM_CLOUD_COVERAGE
            );
        }

        let light = device.light_times;
        for (field, value) in [("night", light.night), ("morning", light.morning)] {
            if value.unsigned_abs() > MAXIMUM_LIGHT_OFFSET.unsigned_abs() {
                bail!(
                    "device '{}': light_times.{} ({} minutes) must be within ±{} minutes",
                    device.name,
                    field,
                    value,
                    MAXIMUM_LIGHT_OFFSET
                );
            }
        }
    }

    Ok(())
}
