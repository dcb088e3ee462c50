//! Core scheduling logic.
//!
//! This module owns the main loop of lightkeeper. Each iteration is one
//! *tick*:
//!
//! - re-read the config file (a broken file skips the tick, nothing more)
//! - rediscover the configured devices
//! - find the forbidden windows around now
//! - if testing, or a window is active, imminent or just ended, decide and
//!   reconcile every device (testing lights them all)
//! - sleep the configured interval, or exactly until the next window
//!   boundary if one falls inside it, and run a boundary tick there
//!
//! A boundary tick decides for the state the transition leads into, a
//! second past the instant. Window entry usually coincides with nightfall,
//! which the open dark interval excludes.
//!
//! The loop ends when a shutdown signal clears the running flag or a
//! simulated clock reaches its end.

pub mod decision;
pub mod reconcile;
pub mod schedule;
pub mod weather;
pub mod window;

use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    common::constants::{BOUNDARY_SETTLE_SECS, DEFAULT_SLEEP_TIME},
    config::{self, GlobalConfig, WeatherSettings},
    device::{DeviceGateway, DeviceRegistry},
    io::signals::SignalState,
    time::source::TimeSource,
    weather::WeatherProvider,
    zmanim::TimeProvider,
};
use decision::{DayContext, decide_configured};
use reconcile::{Outcome, reconcile};
use schedule::{SleepPlan, format_duration, plan_sleep};
use weather::WeatherGate;
use window::{WindowPhase, windows_near};

/// Builds a weather provider for the current endpoint settings, or `None`
/// when weather is unavailable (no API key).
pub type WeatherFactory = Box<dyn Fn(&WeatherSettings) -> Option<Box<dyn WeatherProvider>>>;

/// Weather provider rebuilt only when the endpoint settings change.
struct WeatherSlot {
    factory: WeatherFactory,
    current: Option<(WeatherSettings, Box<dyn WeatherProvider>)>,
}

impl WeatherSlot {
    fn provider(&mut self, settings: &WeatherSettings) -> Option<&dyn WeatherProvider> {
        let stale = self
            .current
            .as_ref()
            .is_none_or(|(built_for, _)| built_for != settings);
        if stale {
            self.current = (self.factory)(settings).map(|provider| (settings.clone(), provider));
        }
        self.current.as_ref().map(|(_, provider)| provider.as_ref())
    }
}

/// Per-device result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReport {
    pub name: String,
    pub needs_light: bool,
    pub outcome: Outcome,
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub phase: Option<WindowPhase>,
    /// Empty when reconciliation was skipped.
    pub devices: Vec<DeviceReport>,
    pub plan: SleepPlan,
}

/// Parameters for creating a Core instance.
pub struct CoreParams {
    pub config_path: PathBuf,
    pub provider: Box<dyn TimeProvider>,
    pub gateway: Box<dyn DeviceGateway>,
    pub weather: WeatherFactory,
    pub time_source: Arc<dyn TimeSource>,
    pub signal_state: SignalState,
    pub debug_enabled: bool,
}

/// The boundary scheduler.
pub struct Core {
    config_path: PathBuf,
    provider: Box<dyn TimeProvider>,
    registry: DeviceRegistry,
    weather: WeatherSlot,
    time_source: Arc<dyn TimeSource>,
    signal_state: SignalState,
    debug_enabled: bool,
    last_config: Option<GlobalConfig>,
}

impl Core {
    pub fn new(params: CoreParams) -> Self {
        Self {
            config_path: params.config_path,
            provider: params.provider,
            registry: DeviceRegistry::new(params.gateway, params.debug_enabled),
            weather: WeatherSlot {
                factory: params.weather,
                current: None,
            },
            time_source: params.time_source,
            signal_state: params.signal_state,
            debug_enabled: params.debug_enabled,
            last_config: None,
        }
    }

    /// Run until shutdown.
    pub fn execute(mut self) -> Result<()> {
        self.initial_discovery();
        self.main_loop();

        log_block_start!("Shutting down lightkeeper...");
        log_end!();
        Ok(())
    }

    /// Best-effort discovery before the first tick.
    fn initial_discovery(&mut self) {
        match config::load_from_path(&self.config_path) {
            Ok(config) => {
                config.log_config();
                log_block_start!("Connecting to {} device(s)", config.devices.len());
                let summary = self.registry.refresh(&config.devices);
                log_decorated!(
                    "Connected to {} of {} device(s)",
                    summary.connected,
                    config.devices.len()
                );
                self.last_config = Some(config);
            }
            Err(e) => {
                log_pipe!();
                log_error!("{e}");
                log_indented!("Will retry on the next tick");
            }
        }
    }

    fn main_loop(&mut self) {
        let mut boundary: Option<DateTime<Tz>> = None;

        while self.signal_state.is_running() && !self.time_source.is_ended() {
            let clock = self.time_source.now();
            let (now, at_boundary) = match boundary.take() {
                Some(instant) => (clock.max(instant.with_timezone(&Utc)), true),
                None => (clock, false),
            };

            let report = self.run_tick(now, at_boundary);
            let plan = report.plan;

            if self.debug_enabled {
                log_debug!("Next tick in {}", format_duration(plan.duration()));
            }

            match self
                .time_source
                .sleep(plan.duration(), &self.signal_state.signal_receiver)
            {
                Some(message) => {
                    // Woken early: the next tick is a regular one
                    self.signal_state.handle_message(message, self.debug_enabled);
                }
                None => boundary = plan.boundary(),
            }
        }
    }

    /// Interval to use when no config could be loaded this tick.
    fn fallback_interval(&self) -> Duration {
        self.last_config
            .as_ref()
            .map(GlobalConfig::sleep_interval)
            .unwrap_or(Duration::from_secs(DEFAULT_SLEEP_TIME * 60))
    }

    /// One scheduler iteration at `now`. Never fails; problems are logged
    /// and shorten the tick.
    pub fn run_tick(&mut self, now: DateTime<Utc>, at_boundary: bool) -> TickReport {
        let config = match config::load_from_path(&self.config_path) {
            Ok(config) => config,
            Err(e) => {
                log_pipe!();
                log_error!("{e}");
                log_indented!("Skipping this tick");
                return TickReport {
                    phase: None,
                    devices: Vec::new(),
                    plan: SleepPlan::Regular(self.fallback_interval()),
                };
            }
        };

        if self.last_config.as_ref() != Some(&config) {
            if self.last_config.is_some() {
                log_block_start!("Configuration changed");
            }
            config.log_config();
        }

        let interval = config.sleep_interval();
        let local_now = now.with_timezone(&self.provider.timezone());

        self.registry.refresh(&config.devices);

        let windows = match windows_near(self.provider.as_ref(), local_now, config.light_times) {
            Ok(windows) => windows,
            Err(e) => {
                log_pipe!();
                log_error!("Could not resolve forbidden windows: {e}");
                self.last_config = Some(config);
                return TickReport {
                    phase: None,
                    devices: Vec::new(),
                    plan: SleepPlan::Regular(interval),
                };
            }
        };

        let chrono_interval =
            chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::zero());
        let phase = WindowPhase::at(local_now, &windows, chrono_interval);

        let devices = if config.testing || at_boundary || phase.requires_reconcile() {
            log_block_start!(
                "{} | {}{}",
                local_now.format("%a %b %d %H:%M"),
                phase,
                if config.testing { " (testing)" } else { "" }
            );
            let decide_at = if at_boundary {
                local_now + chrono::Duration::seconds(BOUNDARY_SETTLE_SECS)
            } else {
                local_now
            };
            self.reconcile_all(&config, decide_at)
        } else {
            if self.debug_enabled {
                log_pipe!();
                log_debug!("{}, skipping reconciliation", phase);
            }
            Vec::new()
        };

        let plan = plan_sleep(local_now, &windows, interval);
        if let SleepPlan::Boundary { until, duration } = plan {
            log_decorated!(
                "Next boundary at {} (in {})",
                until.format("%H:%M:%S"),
                format_duration(duration)
            );
        }

        self.last_config = Some(config);

        TickReport {
            phase: Some(phase),
            devices,
            plan,
        }
    }

    fn reconcile_all(&mut self, config: &GlobalConfig, now: DateTime<Tz>) -> Vec<DeviceReport> {
        let context = match DayContext::resolve(self.provider.as_ref(), now, config.light_times) {
            Ok(context) => context,
            Err(e) => {
                log_error!("Could not compute day times: {e}");
                return Vec::new();
            }
        };

        let wants_weather = !config.testing
            && config
                .devices
                .iter()
                .any(|device| !device.always_light && device.cloud_threshold().is_some());
        let provider = if wants_weather {
            self.weather.provider(&config.weather)
        } else {
            None
        };
        let mut weather = WeatherGate::new(provider);

        let mut reports = Vec::with_capacity(config.devices.len());
        for device in &config.devices {
            let decision = decide_configured(config, &context, device, &mut weather);
            if self.debug_enabled {
                log_debug!("{} | {}", device.name, decision);
            }

            let handle = self.registry.handle_for(device);
            if handle.is_none() {
                log_error!("{} | Could not connect to device", device.name);
            }
            let outcome = reconcile(handle, decision.needs_light());

            reports.push(DeviceReport {
                name: device.name.clone(),
                needs_light: decision.needs_light(),
                outcome,
            });
        }
        reports
    }
}
