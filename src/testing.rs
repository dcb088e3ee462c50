//! In-memory collaborators for tests.
//!
//! Compiled for unit tests and, with the `testing-support` feature, for the
//! integration tests under `tests/`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use std::cell::Cell;
use std::rc::Rc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::device::{DeviceError, DeviceGateway, DeviceHandle, DiscoveryError};
use crate::weather::{WeatherError, WeatherProvider, WeatherReading};
use crate::zmanim::{DayTimes, TimeProvider, ZmanimError};

/// Parse "YYYY-MM-DD HH:MM" as UTC.
pub fn at(s: &str) -> DateTime<Tz> {
    at_in(chrono_tz::UTC, s)
}

/// Parse "YYYY-MM-DD HH:MM" as local time in `tz`.
pub fn at_in(tz: Tz, s: &str) -> DateTime<Tz> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .unwrap_or_else(|e| panic!("bad test instant {s:?}: {e}"));
    tz.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| panic!("{s} does not exist in {tz}"))
}

/// Same sunrise and sunset every day; Saturdays plus any extra dates are
/// forbidden.
#[derive(Debug, Clone)]
pub struct FixedTimeProvider {
    timezone: Tz,
    sunrise: NaiveTime,
    sunset: NaiveTime,
    tzais_minutes: i64,
    extra_forbidden: HashSet<NaiveDate>,
}

impl FixedTimeProvider {
    /// Sunrise 06:00, sunset 19:00, tzais 50 minutes after sunset.
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            sunrise: NaiveTime::from_hms_opt(6, 0, 0).unwrap_or_default(),
            sunset: NaiveTime::from_hms_opt(19, 0, 0).unwrap_or_default(),
            tzais_minutes: 50,
            extra_forbidden: HashSet::new(),
        }
    }

    pub fn with_sun(mut self, sunrise: NaiveTime, sunset: NaiveTime) -> Self {
        self.sunrise = sunrise;
        self.sunset = sunset;
        self
    }

    /// Mark `date` as Yom Tov.
    pub fn forbid(mut self, date: NaiveDate) -> Self {
        self.extra_forbidden.insert(date);
        self
    }

    fn local(&self, date: NaiveDate, time: NaiveTime) -> Result<DateTime<Tz>, ZmanimError> {
        self.timezone
            .from_local_datetime(&date.and_time(time))
            .earliest()
            .ok_or(ZmanimError::NoSolarEvent { date })
    }
}

impl TimeProvider for FixedTimeProvider {
    fn timezone(&self) -> Tz {
        self.timezone
    }

    fn day_times(&self, date: NaiveDate) -> Result<DayTimes, ZmanimError> {
        let sunset = self.local(date, self.sunset)?;
        Ok(DayTimes {
            date,
            sunrise: self.local(date, self.sunrise)?,
            sunset,
            tzais: sunset + Duration::minutes(self.tzais_minutes),
        })
    }

    fn is_forbidden_day(&self, date: NaiveDate) -> bool {
        date.weekday() == Weekday::Sat || self.extra_forbidden.contains(&date)
    }
}

#[derive(Debug, Clone)]
struct FakeDeviceState {
    alias: String,
    on: bool,
    reachable: bool,
    fail_commands: bool,
    commands: usize,
    discoveries: usize,
}

type SharedDevices = Arc<Mutex<HashMap<String, FakeDeviceState>>>;

/// Gateway over simulated switches whose state the test can inspect.
#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    devices: SharedDevices,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(self, address: &str, alias: &str, on: bool) -> Self {
        self.lock().insert(
            address.to_string(),
            FakeDeviceState {
                alias: alias.to_string(),
                on,
                reachable: true,
                fail_commands: false,
                commands: 0,
                discoveries: 0,
            },
        );
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, FakeDeviceState>> {
        self.devices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_state<T>(&self, address: &str, f: impl FnOnce(&mut FakeDeviceState) -> T) -> T {
        let mut devices = self.lock();
        let state = devices
            .get_mut(address)
            .unwrap_or_else(|| panic!("no fake device at {address}"));
        f(state)
    }

    /// Discover `address`, panicking if it is unknown or unreachable.
    pub fn handle(&self, address: &str) -> Box<dyn DeviceHandle> {
        self.discover(address)
            .unwrap_or_else(|e| panic!("fake discovery failed: {e}"))
    }

    pub fn set_reachable(&self, address: &str, reachable: bool) {
        self.with_state(address, |state| state.reachable = reachable);
    }

    /// Discovery still works, but every on/off command fails.
    pub fn fail_commands(&self, address: &str) {
        self.with_state(address, |state| state.fail_commands = true);
    }

    /// Change the relay behind the scheduler's back.
    pub fn set_on(&self, address: &str, on: bool) {
        self.with_state(address, |state| state.on = on);
    }

    pub fn is_on(&self, address: &str) -> bool {
        self.with_state(address, |state| state.on)
    }

    /// Successful on/off commands received.
    pub fn commands(&self, address: &str) -> usize {
        self.with_state(address, |state| state.commands)
    }

    pub fn discoveries(&self, address: &str) -> usize {
        self.with_state(address, |state| state.discoveries)
    }

    pub fn total_commands(&self) -> usize {
        self.lock().values().map(|state| state.commands).sum()
    }
}

impl DeviceGateway for FakeGateway {
    fn discover(&self, address: &str) -> Result<Box<dyn DeviceHandle>, DiscoveryError> {
        let mut devices = self.lock();
        let unreachable = || DiscoveryError {
            address: address.to_string(),
            source: DeviceError::Timeout(std::time::Duration::from_secs(5)),
        };

        let state = devices.get_mut(address).ok_or_else(unreachable)?;
        if !state.reachable {
            return Err(unreachable());
        }
        state.discoveries += 1;

        Ok(Box::new(FakeHandle {
            address: address.to_string(),
            alias: state.alias.clone(),
            on: state.on,
            devices: self.devices.clone(),
        }))
    }
}

struct FakeHandle {
    address: String,
    alias: String,
    on: bool,
    devices: SharedDevices,
}

impl FakeHandle {
    fn switch(&mut self, on: bool) -> Result<(), DeviceError> {
        let mut devices = self
            .devices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let state = devices
            .get_mut(&self.address)
            .ok_or_else(|| DeviceError::Protocol("device removed".to_string()))?;

        if !state.reachable {
            return Err(DeviceError::Timeout(std::time::Duration::from_secs(5)));
        }
        if state.fail_commands {
            return Err(DeviceError::Rejected(-1));
        }

        state.on = on;
        state.commands += 1;
        self.on = on;
        Ok(())
    }
}

impl DeviceHandle for FakeHandle {
    fn alias(&self) -> &str {
        &self.alias
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn is_on(&self) -> bool {
        self.on
    }

    fn turn_on(&mut self) -> Result<(), DeviceError> {
        self.switch(true)
    }

    fn turn_off(&mut self) -> Result<(), DeviceError> {
        self.switch(false)
    }
}

/// Weather provider with a canned answer that counts its calls. Clones
/// share the counter.
#[derive(Debug, Clone)]
pub struct FixedWeather {
    /// Cloud coverage, or the HTTP status to fail with.
    response: Result<u8, u16>,
    calls: Rc<Cell<usize>>,
}

impl FixedWeather {
    pub fn clouds(coverage: u8) -> Self {
        Self {
            response: Ok(coverage),
            calls: Rc::new(Cell::new(0)),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            response: Err(status),
            calls: Rc::new(Cell::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl WeatherProvider for FixedWeather {
    fn current(&self) -> Result<WeatherReading, WeatherError> {
        self.calls.set(self.calls.get() + 1);
        match self.response {
            Ok(cloud_coverage) => Ok(WeatherReading {
                cloud_coverage,
                fetched_at: Utc::now(),
            }),
            Err(status) => Err(WeatherError::Status(status)),
        }
    }
}
