//! Application coordinator that manages the lifecycle of the daemon.
//!
//! Resolves the config path, loads the environment, builds the production
//! collaborators (solar time provider, Kasa gateway, HTTP weather), sets up
//! signal handling and the config watcher, then hands over to
//! [`Core`](crate::core::Core).
//!
//! - Normal startup: `Lightkeeper::new(debug_enabled).run()`
//! - Custom config: `Lightkeeper::new(false).with_config_path(path).run()`
//! - Simulation: `Lightkeeper::new(true).with_time_source(source).run()`

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::{
    common::constants::EXIT_FAILURE,
    config::{self, Environment, WeatherSettings},
    core::{Core, CoreParams, WeatherFactory},
    device::KasaGateway,
    io::signals::setup_signal_handler,
    time::source::{RealTimeSource, TimeSource},
    weather::{HttpWeatherProvider, WeatherProvider},
    zmanim::SolarTimeProvider,
};

/// Builder for configuring and running lightkeeper.
///
/// ```no_run
/// use lightkeeper::Lightkeeper;
///
/// # fn main() -> anyhow::Result<()> {
/// Lightkeeper::new(false).run()?;
/// # Ok(())
/// # }
/// ```
pub struct Lightkeeper {
    debug_enabled: bool,
    config_path: Option<PathBuf>,
    time_source: Option<Arc<dyn TimeSource>>,
    show_headers: bool,
}

impl Lightkeeper {
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            config_path: None,
            time_source: None,
            show_headers: true,
        }
    }

    /// Use this config file instead of the default lookup.
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Drive the scheduler from a custom clock (simulation).
    pub fn with_time_source(mut self, source: Arc<dyn TimeSource>) -> Self {
        self.time_source = Some(source);
        self
    }

    /// Skip the version header (already printed by the caller).
    pub fn without_headers(mut self) -> Self {
        self.show_headers = false;
        self
    }

    /// Run until SIGINT/SIGTERM, or until a simulated clock runs out.
    pub fn run(self) -> Result<()> {
        if self.show_headers {
            log_version!();
        }
        if self.debug_enabled {
            log_pipe!();
            log_debug!("Debug mode enabled, showing per-device decisions");
        }

        let config_path = config::resolve_config_path(self.config_path.as_deref())?;
        log_block_start!("Config file: {}", config_path.display());

        let environment = match Environment::load() {
            Ok(environment) => environment,
            Err(e) => {
                log_error_exit!("Environment is incomplete");
                eprintln!("{e:?}");
                std::process::exit(EXIT_FAILURE);
            }
        };
        environment.log_environment();

        let provider = SolarTimeProvider::from_environment(&environment)
            .context("failed to set up the zmanim calculator")?;
        let gateway = KasaGateway::new(environment.device_timeout)
            .with_credentials(environment.credentials.clone());

        let signal_state = setup_signal_handler(self.debug_enabled)?;

        if let Err(e) = config::start_config_watcher(
            &config_path,
            signal_state.signal_sender.clone(),
            self.debug_enabled,
        ) {
            log_pipe!();
            log_warning!("Config hot-reload unavailable: {e}");
            log_indented!("Changes will still be picked up on the next tick");
        }

        let time_source = self
            .time_source
            .unwrap_or_else(|| Arc::new(RealTimeSource));
        if time_source.is_simulated() {
            log_block_start!("Running with simulated time");
        }

        let core = Core::new(CoreParams {
            config_path,
            provider: Box::new(provider),
            gateway: Box::new(gateway),
            weather: weather_factory(environment),
            time_source,
            signal_state,
            debug_enabled: self.debug_enabled,
        });

        core.execute()
    }
}

/// HTTP weather for the environment's location, or nothing without a key.
pub fn weather_factory(environment: Environment) -> WeatherFactory {
    Box::new(move |settings: &WeatherSettings| {
        environment.weather_api_key.as_ref()?;

        match HttpWeatherProvider::from_environment(settings, &environment) {
            Ok(provider) => Some(Box::new(provider) as Box<dyn WeatherProvider>),
            Err(e) => {
                log_pipe!();
                log_warning!("Weather provider unavailable: {e}");
                None
            }
        }
    })
}
