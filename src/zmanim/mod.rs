//! Halachic day times and the forbidden-day calendar.
//!
//! The scheduler consumes these through [`TimeProvider`] and treats every
//! instant as opaque. [`solar::SolarTimeProvider`] is the concrete
//! implementation used by the daemon; tests substitute fixed instants.

pub mod hebrew;
pub mod solar;

use chrono::{DateTime, Datelike, NaiveDate, Weekday};
use chrono_tz::Tz;

pub use solar::SolarTimeProvider;

/// The instants of one civil day that the scheduler cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayTimes {
    pub date: NaiveDate,
    pub sunrise: DateTime<Tz>,
    pub sunset: DateTime<Tz>,
    /// Nightfall: the end of a forbidden day.
    pub tzais: DateTime<Tz>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ZmanimError {
    #[error("no sunrise/sunset on {date} at this latitude")]
    NoSolarEvent { date: NaiveDate },
    #[error("invalid coordinates {latitude}, {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

/// Source of halachic instants and forbidden days.
pub trait TimeProvider {
    /// Civil timezone in which days are counted.
    fn timezone(&self) -> Tz;

    fn day_times(&self, date: NaiveDate) -> Result<DayTimes, ZmanimError>;

    /// Shabbat or Yom Tov.
    fn is_forbidden_day(&self, date: NaiveDate) -> bool;

    /// Short label for logs ("Shabbat", "Pesach", ...).
    fn day_label(&self, date: NaiveDate) -> Option<String> {
        if date.weekday() == Weekday::Sat {
            Some("Shabbat".to_string())
        } else if self.is_forbidden_day(date) {
            Some("Yom Tov".to_string())
        } else {
            None
        }
    }
}
