//! Status command: what the scheduler would do right now.
//!
//! Reads device state but never switches anything.

use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::{
    common::constants::DEFAULT_SLEEP_TIME,
    common::logger::Log,
    config::{Environment, GlobalConfig},
    core::{
        decision::{DayContext, Decision, decide_configured},
        weather::WeatherGate,
        window::{ForbiddenWindow, WindowPhase, windows_near},
    },
    device::{DeviceGateway, KasaGateway},
    lightkeeper::weather_factory,
    zmanim::{DayTimes, SolarTimeProvider, TimeProvider},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    pub name: String,
    pub ip: String,
    /// Relay state, or `None` if the device could not be reached.
    pub is_on: Option<bool>,
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub now: DateTime<Tz>,
    pub today: DayTimes,
    pub windows: Vec<ForbiddenWindow>,
    pub phase: WindowPhase,
    pub devices: Vec<DeviceStatus>,
}

/// Evaluate every configured device at `now` without sending commands.
pub fn collect_status(
    config: &GlobalConfig,
    provider: &dyn TimeProvider,
    gateway: &dyn DeviceGateway,
    weather: &mut WeatherGate,
    now: DateTime<Utc>,
) -> Result<StatusReport> {
    let now = now.with_timezone(&provider.timezone());
    let windows = windows_near(provider, now, config.light_times)?;
    let interval = chrono::Duration::minutes(
        i64::try_from(config.sleep_time).unwrap_or(DEFAULT_SLEEP_TIME as i64),
    );
    let phase = WindowPhase::at(now, &windows, interval);
    let context = DayContext::resolve(provider, now, config.light_times)?;

    let devices = config
        .devices
        .iter()
        .map(|device| DeviceStatus {
            name: device.name.clone(),
            ip: device.ip.clone(),
            is_on: gateway.discover(&device.ip).ok().map(|handle| handle.is_on()),
            decision: decide_configured(config, &context, device, weather),
        })
        .collect();

    Ok(StatusReport {
        now,
        today: context.today,
        windows,
        phase,
        devices,
    })
}

/// Handle `lightkeeper status`.
pub fn handle_status_command(config_path: Option<&str>, debug_enabled: bool) -> Result<()> {
    Log::set_timestamps(false);

    let (path, config) = super::load_config(config_path)?;
    let environment = Environment::load()?;
    let provider = SolarTimeProvider::from_environment(&environment)?;
    let gateway = KasaGateway::new(environment.device_timeout)
        .with_credentials(environment.credentials.clone());

    let factory = weather_factory(environment.clone());
    let weather_provider = factory(&config.weather);
    let mut weather = WeatherGate::new(weather_provider.as_deref());

    log_version!();
    if debug_enabled {
        log_pipe!();
        log_debug!("Config file: {}", path.display());
    }
    environment.log_environment();

    let report = collect_status(&config, &provider, &gateway, &mut weather, Utc::now())?;
    display_status(&report, &provider, weather.reading().map(|r| r.cloud_coverage));
    Ok(())
}

fn display_status(report: &StatusReport, provider: &dyn TimeProvider, clouds: Option<u8>) {
    let time = |instant: DateTime<Tz>| instant.format("%H:%M").to_string();

    log_block_start!("{}", report.now.format("%A %B %d, %Y %H:%M"));
    log_indented!("Sunrise: {}", time(report.today.sunrise));
    log_indented!("Sunset:  {}", time(report.today.sunset));
    log_indented!("Tzais:   {}", time(report.today.tzais));
    if let Some(coverage) = clouds {
        log_indented!("Clouds:  {}%", coverage);
    }

    log_block_start!("Forbidden windows: {}", report.phase);
    if report.windows.is_empty() {
        log_indented!("None in the next few days");
    }
    for window in &report.windows {
        let label = provider
            .day_label(window.first_day)
            .unwrap_or_else(|| "Forbidden".to_string());
        log_indented!(
            "{}: {} to {}",
            label,
            window.start.format("%a %b %d %H:%M"),
            window.end.format("%a %b %d %H:%M")
        );
    }

    log_block_start!("Devices:");
    for device in &report.devices {
        let state = match device.is_on {
            Some(true) => "on",
            Some(false) => "off",
            None => "unreachable",
        };
        let wanted = if device.decision.needs_light() { "on" } else { "off" };
        log_indented!(
            "{} ({}): {}, wants {} ({})",
            device.name,
            device.ip,
            state,
            wanted,
            device.decision
        );
    }
    log_end!();
}
