//! Light decision for a single device.
//!
//! Precedence, first match wins:
//! 1. the global `testing` flag
//! 2. `always_light`
//! 3. cloud coverage above the device's threshold
//! 4. the dark window between nightfall and sunrise
//!
//! Weather can add light outside the dark window but never removes it
//! inside.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;

use super::weather::WeatherGate;
use super::window::{LightBoundaries, needs_light_by_time, resolve_light_boundaries};
use crate::config::{DeviceConfig, GlobalConfig, WindowOffsets};
use crate::zmanim::{DayTimes, TimeProvider, ZmanimError};

/// Why a device does or does not need light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Global testing mode: every device is lit.
    Testing,
    AlwaysLight,
    Cloudy,
    Dark,
    NotNeeded,
}

impl Decision {
    pub fn needs_light(self) -> bool {
        self != Decision::NotNeeded
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Testing => write!(f, "testing"),
            Decision::AlwaysLight => write!(f, "always on"),
            Decision::Cloudy => write!(f, "cloudy"),
            Decision::Dark => write!(f, "dark"),
            Decision::NotNeeded => write!(f, "daylight"),
        }
    }
}

/// Time inputs shared by every device in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayContext {
    pub now: DateTime<Tz>,
    pub today: DayTimes,
    /// Tomorrow starts a forbidden run and today is not part of one.
    pub tomorrow_forbidden: bool,
    pub erev_minutes: u32,
}

impl DayContext {
    pub fn resolve(
        provider: &dyn TimeProvider,
        now: DateTime<Tz>,
        offsets: WindowOffsets,
    ) -> Result<Self, ZmanimError> {
        let date = now.date_naive();
        let today = provider.day_times(date)?;
        let tomorrow_forbidden =
            !provider.is_forbidden_day(date) && provider.is_forbidden_day(date + Duration::days(1));

        Ok(Self {
            now,
            today,
            tomorrow_forbidden,
            erev_minutes: offsets.erev,
        })
    }

    pub fn light_boundaries(&self, device: &DeviceConfig) -> LightBoundaries {
        resolve_light_boundaries(
            self.now,
            &self.today,
            device.light_times,
            self.tomorrow_forbidden,
            self.erev_minutes,
        )
    }
}

pub fn decide(context: &DayContext, device: &DeviceConfig, weather: &mut WeatherGate) -> Decision {
    if device.always_light {
        return Decision::AlwaysLight;
    }

    if let Some(threshold) = device.cloud_threshold()
        && weather.cloud_override(threshold)
    {
        return Decision::Cloudy;
    }

    if needs_light_by_time(context.now, &context.light_boundaries(device)) {
        Decision::Dark
    } else {
        Decision::NotNeeded
    }
}

/// [`decide`] under the global config. Testing mode lights every device
/// without consulting time or weather.
pub fn decide_configured(
    config: &GlobalConfig,
    context: &DayContext,
    device: &DeviceConfig,
    weather: &mut WeatherGate,
) -> Decision {
    if config.testing {
        Decision::Testing
    } else {
        decide(context, device, weather)
    }
}

pub fn needs_light(context: &DayContext, device: &DeviceConfig, weather: &mut WeatherGate) -> bool {
    decide(context, device, weather).needs_light()
}
