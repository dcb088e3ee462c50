//! Startup settings taken from the process environment.
//!
//! Secrets and location data live outside the config file so the file can
//! be shared or versioned. A `.env` file in the working directory is loaded
//! first if present; real environment variables win over it.

use anyhow::{Context, Result, bail};
use chrono_tz::Tz;
use std::time::Duration;

use crate::common::constants::*;
use crate::device::Credentials;

/// Immutable inputs to the time and weather providers.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    /// Display name for the location, used only in logs.
    pub location: String,
    pub timezone: Tz,
    pub latitude: f64,
    pub longitude: f64,
    /// Observer elevation in metres.
    pub elevation: f64,
    pub weather_api_key: Option<String>,
    /// Observe one-day Yom Tov as in Israel.
    pub in_israel: bool,
    /// Minutes after sunset taken as nightfall (tzais).
    pub tzais_minutes: i64,
    /// Upper bound for any single device network call.
    pub device_timeout: Duration,
    /// Account for devices that only speak the authenticated protocol.
    pub credentials: Option<Credentials>,
}

impl Environment {
    /// Load from the process environment, reading `.env` if present.
    pub fn load() -> Result<Self> {
        // A missing .env file is the normal case for a systemd deployment
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .with_context(|| format!("environment variable {key} is not set"))
        };

        let timezone_name = required("TIMEZONE")?;
        let timezone: Tz = timezone_name
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("TIMEZONE '{timezone_name}' is not a valid IANA zone: {e}"))?;

        let latitude: f64 = required("LATITUDE")?
            .trim()
            .parse()
            .context("LATITUDE must be a number")?;
        let longitude: f64 = required("LONGITUDE")?
            .trim()
            .parse()
            .context("LONGITUDE must be a number")?;

        if !(-90.0..=90.0).contains(&latitude) {
            bail!("LATITUDE must be between -90 and 90 degrees (got {latitude})");
        }
        if !(-180.0..=180.0).contains(&longitude) {
            bail!("LONGITUDE must be between -180 and 180 degrees (got {longitude})");
        }

        let elevation = match lookup("ELEVATION") {
            Some(value) => value
                .trim()
                .parse::<f64>()
                .context("ELEVATION must be a number of metres")?,
            None => 0.0,
        };
        if !elevation.is_finite() || elevation < 0.0 {
            bail!("ELEVATION must be zero or positive (got {elevation})");
        }

        let in_israel = match lookup("IN_ISRAEL") {
            Some(value) => parse_bool(&value).context("IN_ISRAEL must be true or false")?,
            None => false,
        };

        let tzais_minutes = match lookup("TZAIS_MINUTES") {
            Some(value) => value
                .trim()
                .parse::<i64>()
                .context("TZAIS_MINUTES must be a whole number of minutes")?,
            None => DEFAULT_TZAIS_MINUTES,
        };
        if !(0..=120).contains(&tzais_minutes) {
            bail!("TZAIS_MINUTES must be between 0 and 120 (got {tzais_minutes})");
        }

        let device_timeout = match lookup("DEVICE_TIMEOUT_SECS") {
            Some(value) => {
                let secs = value
                    .trim()
                    .parse::<u64>()
                    .context("DEVICE_TIMEOUT_SECS must be a whole number of seconds")?;
                if secs == 0 {
                    bail!("DEVICE_TIMEOUT_SECS must be greater than zero");
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_DEVICE_TIMEOUT,
        };

        let credentials = match (lookup("USERNAME"), lookup("PASSWORD")) {
            (Some(username), Some(password)) if !username.trim().is_empty() => {
                Some(Credentials::new(username.trim(), password))
            }
            (Some(username), None) if !username.trim().is_empty() => {
                bail!("USERNAME is set but PASSWORD is not")
            }
            _ => None,
        };

        Ok(Self {
            location: lookup("LOCATION").unwrap_or_else(|| timezone.name().to_string()),
            timezone,
            latitude,
            longitude,
            elevation,
            weather_api_key: lookup("WEATHER_API_KEY").filter(|key| !key.trim().is_empty()),
            in_israel,
            tzais_minutes,
            device_timeout,
            credentials,
        })
    }

    pub fn log_environment(&self) {
        log_block_start!("Location: {}", self.location);
        log_indented!("Coordinates: {:.4}°, {:.4}°", self.latitude, self.longitude);
        log_indented!("Timezone: {}", self.timezone);
        log_indented!(
            "Calendar: {}",
            if self.in_israel { "Israel" } else { "Diaspora" }
        );
        log_indented!("Tzais: sunset + {} minutes", self.tzais_minutes);
        if self.weather_api_key.is_none() {
            log_indented!("Weather: no API key, cloud coverage checks disabled");
        }
        match &self.credentials {
            Some(credentials) => log_indented!("Device account: {}", credentials.username),
            None => log_indented!("Device account: none, legacy protocol only"),
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("unrecognised boolean '{other}'"),
    }
}
