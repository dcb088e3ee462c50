//! Application-wide defaults and limits.

use std::time::Duration;

// # Configuration defaults

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const CONFIG_ENV_VAR: &str = "LIGHTKEEPER_CONFIG";

/// Minutes between regular ticks when no usable config has been loaded yet.
pub const DEFAULT_SLEEP_TIME: u64 = 30;
pub const MINIMUM_SLEEP_TIME: u64 = 1;
pub const MAXIMUM_SLEEP_TIME: u64 = 24 * 60;

/// Upper bound for erev/motzei offsets, in minutes.
pub const MAXIMUM_WINDOW_OFFSET: u32 = 24 * 60;

/// Bound for per-device night/morning offsets, in minutes (either sign).
pub const MAXIMUM_LIGHT_OFFSET: i32 = 12 * 60;

pub const MAXIMUM_CLOUD_COVERAGE: u8 = 100;

// # Environment defaults

pub const DEFAULT_TZAIS_MINUTES: i64 = 50;
pub const DEFAULT_DEVICE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_WEATHER_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

// # Scheduling

/// How far around "now" the resolver scans for forbidden days. Long enough
/// for a two-day Yom Tov adjoining Shabbat on either side.
pub const WINDOW_SCAN_DAYS: i64 = 4;

/// A boundary tick decides this many seconds past the transition instant.
pub const BOUNDARY_SETTLE_SECS: i64 = 1;

/// Editors write files in several steps; coalesce watcher events.
pub const WATCHER_DEBOUNCE: Duration = Duration::from_millis(500);

// # Device protocol

pub const KASA_PORT: u16 = 9999;
pub const KASA_INITIAL_KEY: u8 = 171;
/// Newer firmware: authenticated HTTP.
pub const KLAP_PORT: u16 = 80;

// # Exit codes

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_DEVICE_NOT_FOUND: i32 = 2;
