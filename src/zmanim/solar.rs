//! Sunrise/sunset from coordinates, plus the Shabbat and Yom Tov calendar.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use sunrise::{Coordinates, SolarDay, SolarEvent};

use super::hebrew::{is_yom_tov, yom_tov_on};
use super::{DayTimes, TimeProvider, ZmanimError};
use crate::config::Environment;

/// Computes day times for a fixed location.
#[derive(Debug, Clone)]
pub struct SolarTimeProvider {
    coordinates: Coordinates,
    latitude: f64,
    longitude: f64,
    elevation: f64,
    timezone: Tz,
    in_israel: bool,
    tzais_offset: Duration,
}

impl SolarTimeProvider {
    pub fn new(
        latitude: f64,
        longitude: f64,
        timezone: Tz,
        in_israel: bool,
        tzais_minutes: i64,
    ) -> Result<Self, ZmanimError> {
        let coordinates = Coordinates::new(latitude, longitude)
            .ok_or(ZmanimError::InvalidCoordinates { latitude, longitude })?;

        Ok(Self {
            coordinates,
            latitude,
            longitude,
            elevation: 0.0,
            timezone,
            in_israel,
            tzais_offset: Duration::minutes(tzais_minutes),
        })
    }

    /// Observer height above the horizon in metres; moves sunrise earlier
    /// and sunset later.
    pub fn with_elevation(mut self, metres: f64) -> Self {
        self.elevation = metres.max(0.0);
        self
    }

    pub fn from_environment(env: &Environment) -> Result<Self, ZmanimError> {
        Ok(Self::new(
            env.latitude,
            env.longitude,
            env.timezone,
            env.in_israel,
            env.tzais_minutes,
        )?
        .with_elevation(env.elevation))
    }

    fn event(&self, date: NaiveDate, event: SolarEvent) -> DateTime<Utc> {
        SolarDay::new(self.coordinates, date)
            .with_altitude(self.elevation)
            .event_time(event)
    }
}

impl TimeProvider for SolarTimeProvider {
    fn timezone(&self) -> Tz {
        self.timezone
    }

    fn day_times(&self, date: NaiveDate) -> Result<DayTimes, ZmanimError> {
        let sunrise = self.event(date, SolarEvent::Sunrise);
        let sunset = self.event(date, SolarEvent::Sunset);

        // Polar day or night yields no usable pair
        if sunset <= sunrise || (sunset - sunrise) >= Duration::hours(24) {
            return Err(ZmanimError::NoSolarEvent { date });
        }

        let sunset = sunset.with_timezone(&self.timezone);
        Ok(DayTimes {
            date,
            sunrise: sunrise.with_timezone(&self.timezone),
            sunset,
            tzais: sunset + self.tzais_offset,
        })
    }

    fn is_forbidden_day(&self, date: NaiveDate) -> bool {
        date.weekday() == Weekday::Sat || is_yom_tov(date, self.in_israel)
    }

    fn day_label(&self, date: NaiveDate) -> Option<String> {
        match (date.weekday() == Weekday::Sat, yom_tov_on(date, self.in_israel)) {
            (true, Some(festival)) => Some(format!("Shabbat, {festival}")),
            (true, None) => Some("Shabbat".to_string()),
            (false, Some(festival)) => Some(festival.to_string()),
            (false, None) => None,
        }
    }
}

impl std::fmt::Display for SolarTimeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.4}°, {:.4}° ({})",
            self.latitude, self.longitude, self.timezone
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn new_york() -> SolarTimeProvider {
        SolarTimeProvider::new(40.7128, -74.0060, chrono_tz::America::New_York, false, 50).unwrap()
    }

    #[test]
    fn test_day_times_are_ordered_and_local() {
        let provider = new_york();
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let times = provider.day_times(date).unwrap();

        assert!(times.sunrise < times.sunset);
        assert_eq!(times.tzais - times.sunset, Duration::minutes(50));
        assert_eq!(times.sunrise.date_naive(), date);
        assert_eq!(times.sunset.date_naive(), date);
        // Midsummer in New York: sunrise around 05:25, sunset around 20:30
        assert!((5..=6).contains(&times.sunrise.hour()));
        assert!((20..=21).contains(&times.sunset.hour()));
    }

    #[test]
    fn test_forbidden_days() {
        let provider = new_york();
        // Saturday
        assert!(provider.is_forbidden_day(NaiveDate::from_ymd_opt(2024, 6, 8).unwrap()));
        // Plain Friday
        assert!(!provider.is_forbidden_day(NaiveDate::from_ymd_opt(2024, 6, 7).unwrap()));
        // Yom Kippur 2024 fell on a Saturday; Rosh Hashanah on Thursday
        assert!(provider.is_forbidden_day(NaiveDate::from_ymd_opt(2024, 10, 3).unwrap()));
        assert_eq!(
            provider.day_label(NaiveDate::from_ymd_opt(2024, 10, 12).unwrap()),
            Some("Shabbat, Yom Kippur".to_string())
        );
    }

    #[test]
    fn test_invalid_coordinates_rejected() {
        assert!(SolarTimeProvider::new(95.0, 0.0, chrono_tz::UTC, false, 50).is_err());
    }
}
