//! Current cloud coverage for the configured location.

pub mod http;

use chrono::{DateTime, Utc};

pub use http::HttpWeatherProvider;

/// One observation. Never cached across ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherReading {
    /// Percent of sky covered, 0-100.
    pub cloud_coverage: u8,
    pub fetched_at: DateTime<Utc>,
}

/// Why no reading is available. Every variant means "cloud override
/// inactive" to the decision engine.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("no weather API key configured")]
    NotConfigured,
    #[error("weather request failed: {0}")]
    Http(String),
    #[error("weather service returned HTTP {0}")]
    Status(u16),
    #[error("malformed weather payload: {0}")]
    Malformed(String),
}

#[cfg_attr(test, mockall::automock)]
pub trait WeatherProvider {
    fn current(&self) -> Result<WeatherReading, WeatherError>;
}
