//! Cloud-coverage override.
//!
//! A device with a non-zero `cloud_coverage` threshold needs light whenever
//! the sky is more covered than that, day or night. An unavailable reading
//! never forces light.

use crate::weather::{WeatherProvider, WeatherReading};

/// Strictly greater than the threshold.
pub fn exceeds_threshold(reading: &WeatherReading, threshold: u8) -> bool {
    reading.cloud_coverage > threshold
}

/// Fetches at most one reading per tick, and only when first asked.
pub struct WeatherGate<'a> {
    provider: Option<&'a dyn WeatherProvider>,
    reading: Option<Option<WeatherReading>>,
}

impl<'a> WeatherGate<'a> {
    pub fn new(provider: Option<&'a dyn WeatherProvider>) -> Self {
        Self {
            provider,
            reading: None,
        }
    }

    /// A gate with no provider: the override never fires.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// True if coverage exceeds `threshold`. A failed fetch counts as false
    /// and is logged once.
    pub fn cloud_override(&mut self, threshold: u8) -> bool {
        self.reading()
            .is_some_and(|reading| exceeds_threshold(&reading, threshold))
    }

    /// Reading for this tick, if one could be fetched.
    pub fn reading(&mut self) -> Option<WeatherReading> {
        let provider = self.provider;
        *self.reading.get_or_insert_with(|| {
            let provider = provider?;
            match provider.current() {
                Ok(reading) => Some(reading),
                Err(e) => {
                    log_pipe!();
                    log_warning!("Weather unavailable, ignoring cloud coverage: {e}");
                    None
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::{MockWeatherProvider, WeatherError};
    use chrono::Utc;

    fn reading(cloud_coverage: u8) -> WeatherReading {
        WeatherReading {
            cloud_coverage,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_threshold_is_strict() {
        assert!(exceeds_threshold(&reading(81), 80));
        assert!(!exceeds_threshold(&reading(80), 80));
        assert!(!exceeds_threshold(&reading(0), 0));
        assert!(exceeds_threshold(&reading(100), 99));
    }

    #[test]
    fn test_fetches_once_per_gate() {
        let mut provider = MockWeatherProvider::new();
        provider
            .expect_current()
            .times(1)
            .returning(|| Ok(reading(90)));

        let mut gate = WeatherGate::new(Some(&provider));
        assert!(gate.cloud_override(50));
        assert!(!gate.cloud_override(95));
        assert!(gate.cloud_override(10));
    }

    #[test]
    fn test_failure_is_not_an_override_and_not_retried() {
        let mut provider = MockWeatherProvider::new();
        provider
            .expect_current()
            .times(1)
            .returning(|| Err(WeatherError::Status(500)));

        let mut gate = WeatherGate::new(Some(&provider));
        assert!(!gate.cloud_override(10));
        assert!(!gate.cloud_override(0));
        assert!(gate.reading().is_none());
    }

    #[test]
    fn test_unused_gate_never_fetches() {
        let mut provider = MockWeatherProvider::new();
        provider.expect_current().times(0);
        let _gate = WeatherGate::new(Some(&provider));

        let mut disabled = WeatherGate::disabled();
        assert!(!disabled.cloud_override(10));
    }
}
