//! OpenWeatherMap-style current weather over HTTP.

use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;

use super::{WeatherError, WeatherProvider, WeatherReading};
use crate::common::constants::MAXIMUM_CLOUD_COVERAGE;
use crate::config::{Environment, WeatherSettings};

pub struct HttpWeatherProvider {
    http: reqwest::blocking::Client,
    url: String,
    api_key: Option<String>,
    latitude: f64,
    longitude: f64,
}

impl HttpWeatherProvider {
    pub fn new(
        settings: &WeatherSettings,
        api_key: Option<String>,
        latitude: f64,
        longitude: f64,
    ) -> Result<Self, WeatherError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| WeatherError::Http(e.to_string()))?;

        Ok(Self {
            http,
            url: settings.url.clone(),
            api_key,
            latitude,
            longitude,
        })
    }

    pub fn from_environment(
        settings: &WeatherSettings,
        env: &Environment,
    ) -> Result<Self, WeatherError> {
        Self::new(
            settings,
            env.weather_api_key.clone(),
            env.latitude,
            env.longitude,
        )
    }
}

impl WeatherProvider for HttpWeatherProvider {
    fn current(&self) -> Result<WeatherReading, WeatherError> {
        let api_key = self.api_key.as_deref().ok_or(WeatherError::NotConfigured)?;

        let latitude = self.latitude.to_string();
        let longitude = self.longitude.to_string();
        let response = self
            .http
            .get(&self.url)
            .query(&[
                ("lat", latitude.as_str()),
                ("lon", longitude.as_str()),
                ("appid", api_key),
            ])
            .send()
            .map_err(|e| WeatherError::Http(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .map_err(|e| WeatherError::Http(e.without_url().to_string()))?;

        Ok(WeatherReading {
            cloud_coverage: parse_cloud_coverage(&body)?,
            fetched_at: Utc::now(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    clouds: Option<Clouds>,
}

#[derive(Debug, Deserialize)]
struct Clouds {
    all: Option<f64>,
}

/// Extract `clouds.all` from a current-weather payload.
pub fn parse_cloud_coverage(body: &str) -> Result<u8, WeatherError> {
    let payload: CurrentWeather =
        serde_json::from_str(body).map_err(|e| WeatherError::Malformed(e.to_string()))?;

    let coverage = payload
        .clouds
        .and_then(|clouds| clouds.all)
        .ok_or_else(|| WeatherError::Malformed("missing clouds.all".to_string()))?;

    if !(0.0..=f64::from(MAXIMUM_CLOUD_COVERAGE)).contains(&coverage) {
        return Err(WeatherError::Malformed(format!(
            "clouds.all out of range: {coverage}"
        )));
    }

    Ok(coverage.round() as u8)
}
