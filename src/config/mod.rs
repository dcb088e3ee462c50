//! Configuration system for lightkeeper.
//!
//! Two kinds of settings feed the service:
//!
//! - The **runtime config file** (`config.json`, or `.toml` with the same
//!   schema) describing the managed devices, the erev/motzei window
//!   extensions, the polling interval and the testing flag. It is re-read at
//!   the start of every scheduler tick, so edits take effect without a
//!   restart and a transiently broken file only costs one tick.
//! - The **environment** ([`Environment`]): location, timezone, API key and
//!   other secrets, read once at startup.
//!
//! ## Configuration Structure
//!
//! ```json
//! {
//!   "devices": [
//!     {
//!       "name": "Dining Room",
//!       "ip": "192.168.1.40",
//!       "always_light": false,
//!       "cloud_coverage": 80,
//!       "light_times": { "night": 15, "morning": 30 }
//!     }
//!   ],
//!   "light_times": { "erev": 20, "motzei": 10 },
//!   "sleep_time": 30,
//!   "testing": false
//! }
//! ```
//!
//! Older files that only list `devices_ips` are still accepted; each address
//! becomes a device with default settings.

pub mod environment;
pub mod loading;
pub mod validation;
pub mod watcher;

use serde::Deserialize;
use std::time::Duration;

use crate::common::constants::*;

pub use environment::Environment;
pub use loading::{ConfigLoadError, load_from_path, resolve_config_path};
pub use watcher::start_config_watcher;

/// Minutes added before the start (`erev`) and after the end (`motzei`) of
/// every forbidden window.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowOffsets {
    #[serde(default)]
    pub erev: u32,
    #[serde(default)]
    pub motzei: u32,
}

/// Per-device shift of the dark window: lights come on `night` minutes
/// before sunset and stay on until `morning` minutes after sunrise.
/// Negative values shrink the window.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct LightOffsets {
    #[serde(default)]
    pub night: i32,
    #[serde(default)]
    pub morning: i32,
}

/// One managed switch.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DeviceConfig {
    pub name: String,
    pub ip: String,
    /// Keep the light on for the whole forbidden window.
    #[serde(default)]
    pub always_light: bool,
    /// Cloud coverage percentage above which the light is needed even in
    /// daytime. `None` or `0` disables the weather check for this device.
    #[serde(default)]
    pub cloud_coverage: Option<u8>,
    #[serde(default)]
    pub light_times: LightOffsets,
}

impl DeviceConfig {
    /// Threshold for the weather gate, if this device uses it.
    pub fn cloud_threshold(&self) -> Option<u8> {
        self.cloud_coverage.filter(|threshold| *threshold > 0)
    }

    /// True when `key` names this device by address or by declared name.
    pub fn matches(&self, key: &str) -> bool {
        self.ip == key || self.name.eq_ignore_ascii_case(key)
    }
}

/// Weather endpoint parameters.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct WeatherSettings {
    #[serde(default = "default_weather_url")]
    pub url: String,
    #[serde(default = "default_weather_timeout")]
    pub timeout_secs: u64,
}

fn default_weather_url() -> String {
    DEFAULT_WEATHER_URL.to_string()
}

fn default_weather_timeout() -> u64 {
    DEFAULT_WEATHER_TIMEOUT_SECS
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            url: default_weather_url(),
            timeout_secs: default_weather_timeout(),
        }
    }
}

/// Snapshot of the runtime config file. Immutable within a tick.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GlobalConfig {
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    /// Legacy list of bare addresses, folded into `devices` on load.
    #[serde(default)]
    pub devices_ips: Option<Vec<String>>,
    #[serde(default)]
    pub light_times: WindowOffsets,
    /// Minutes between regular ticks.
    pub sleep_time: u64,
    /// Reconcile on every tick and light every device, regardless of the
    /// forbidden window, time of day or weather.
    #[serde(default)]
    pub testing: bool,
    #[serde(default)]
    pub weather: WeatherSettings,
}

impl GlobalConfig {
    pub fn sleep_interval(&self) -> Duration {
        Duration::from_secs(self.sleep_time * 60)
    }

    /// Look a device up by address or declared name.
    pub fn device(&self, key: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|device| device.matches(key))
    }

    /// Fold the legacy `devices_ips` list into `devices`.
    ///
    /// Addresses already described in `devices` are skipped; the rest get a
    /// device entry named after the address with every override off.
    pub fn migrate_legacy_fields(&mut self) {
        let Some(addresses) = self.devices_ips.take() else {
            return;
        };

        log_pipe!();
        log_warning!("Config field 'devices_ips' is deprecated. Please use 'devices' instead.");

        for address in addresses {
            if self.devices.iter().any(|device| device.ip == address) {
                continue;
            }
            self.devices.push(DeviceConfig {
                name: address.clone(),
                ip: address,
                always_light: false,
                cloud_coverage: None,
                light_times: LightOffsets::default(),
            });
        }
    }

    /// Log the effective configuration.
    pub fn log_config(&self) {
        log_block_start!("Loaded configuration");
        log_indented!("Sleep time: {} minutes", self.sleep_time);
        log_indented!(
            "Window offsets: erev {} min, motzei {} min",
            self.light_times.erev,
            self.light_times.motzei
        );
        if self.testing {
            log_indented!("Testing mode: reconciling on every tick");
        }
        log_indented!("Devices: {}", self.devices.len());
        for device in &self.devices {
            let mut flags = Vec::new();
            if device.always_light {
                flags.push("always on".to_string());
            }
            if let Some(threshold) = device.cloud_threshold() {
                flags.push(format!("clouds > {threshold}%"));
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };
            log_indented!(
                "  {} ({}) night {:+} / morning {:+}{}",
                device.name,
                device.ip,
                device.light_times.night,
                device.light_times.morning,
                flags
            );
        }
    }
}

#[cfg(test)]
mod tests;
