//! Manual override: flip one device, report the new state as JSON.
//!
//! Uses the same reconcile primitive as the scheduler, so a toggle is a
//! single command and a failed command is reported, never retried.

use anyhow::Result;
use serde::Serialize;

use crate::{
    common::constants::{EXIT_DEVICE_NOT_FOUND, EXIT_FAILURE},
    common::logger::Log,
    config::{Environment, GlobalConfig},
    core::reconcile::{Outcome, reconcile},
    device::{DeviceRegistry, KasaGateway},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ToggleError {
    #[error("Device not found")]
    NotConfigured(String),
    #[error("Could not connect to device: {0}")]
    Unreachable(String),
}

impl ToggleError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ToggleError::NotConfigured(_) => EXIT_DEVICE_NOT_FOUND,
            ToggleError::Unreachable(_) => EXIT_FAILURE,
        }
    }
}

/// Flip one device. `key` is a configured name or address, or failing
/// those, the alias a configured device reports about itself.
pub fn toggle_device(
    config: &GlobalConfig,
    registry: &mut DeviceRegistry,
    key: &str,
) -> Result<ToggleResponse, ToggleError> {
    let address = match config.device(key) {
        Some(device) => {
            registry.refresh(std::slice::from_ref(device));
            device.ip.clone()
        }
        None => {
            registry.refresh(&config.devices);
            registry
                .find_by_alias(key)
                .map(|handle| handle.address().to_string())
                .ok_or_else(|| ToggleError::NotConfigured(key.to_string()))?
        }
    };

    let failure = registry.last_error(&address).map(str::to_string);
    let handle = registry.handle_mut(&address).ok_or_else(|| {
        ToggleError::Unreachable(failure.unwrap_or_else(|| format!("no response from {address}")))
    })?;

    let turn_on = !handle.is_on();
    match reconcile(Some(&mut *handle), turn_on) {
        Outcome::Toggled | Outcome::AlreadyInState => {
            let status = if turn_on { "on" } else { "off" };
            Ok(ToggleResponse {
                status: status.to_string(),
                message: format!("{} turned {status}", handle.alias()),
            })
        }
        Outcome::DeviceUnreachable => Err(ToggleError::Unreachable(format!(
            "{} did not accept the command",
            handle.alias()
        ))),
    }
}

/// Handle `lightkeeper toggle <device>`.
///
/// Prints one JSON object on stdout. Log output is only shown with
/// `--debug`.
pub fn handle_toggle_command(
    key: &str,
    config_path: Option<&str>,
    debug_enabled: bool,
) -> Result<()> {
    Log::set_timestamps(false);
    Log::set_enabled(debug_enabled);

    let (_, config) = super::load_config(config_path)?;
    let environment = Environment::load()?;
    let gateway = KasaGateway::new(environment.device_timeout)
        .with_credentials(environment.credentials.clone());
    let mut registry = DeviceRegistry::new(Box::new(gateway), debug_enabled);

    match toggle_device(&config, &mut registry, key) {
        Ok(response) => {
            println!("{}", serde_json::to_string(&response)?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::json!({ "detail": e.to_string() }));
            std::process::exit(e.exit_code());
        }
    }
}
