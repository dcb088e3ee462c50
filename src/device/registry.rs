//! Per-tick device discovery with fallback to the previous connection.

use std::collections::HashMap;

use super::{DeviceGateway, DeviceHandle};
use crate::config::DeviceConfig;

/// Handles for the configured devices, keyed by address.
pub struct DeviceRegistry {
    gateway: Box<dyn DeviceGateway>,
    handles: HashMap<String, Box<dyn DeviceHandle>>,
    /// Discovery errors from the latest refresh, by address.
    failures: HashMap<String, String>,
    debug_enabled: bool,
}

/// Result of one [`DeviceRegistry::refresh`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub connected: usize,
    /// Discovery failed but last tick's handle is still in use.
    pub stale: usize,
    pub missing: usize,
}

impl DeviceRegistry {
    pub fn new(gateway: Box<dyn DeviceGateway>, debug_enabled: bool) -> Self {
        Self {
            gateway,
            handles: HashMap::new(),
            failures: HashMap::new(),
            debug_enabled,
        }
    }

    /// Rediscover every configured device.
    ///
    /// A failed discovery is logged and the previous handle for that address,
    /// if any, is kept. Handles for addresses no longer configured are
    /// dropped.
    pub fn refresh(&mut self, devices: &[DeviceConfig]) -> RefreshSummary {
        let mut summary = RefreshSummary::default();
        let mut previous = std::mem::take(&mut self.handles);
        self.failures.clear();

        for device in devices {
            match self.gateway.discover(&device.ip) {
                Ok(handle) => {
                    if self.debug_enabled {
                        log_debug!(
                            "{} | Connected ({}), light is {}",
                            handle.alias(),
                            device.ip,
                            if handle.is_on() { "on" } else { "off" }
                        );
                    }
                    self.handles.insert(device.ip.clone(), handle);
                    summary.connected += 1;
                }
                Err(e) => {
                    log_error!("{} | {e}", device.name);
                    self.failures.insert(device.ip.clone(), e.source.to_string());
                    if let Some(handle) = previous.remove(&device.ip) {
                        log_indented!("Using the connection from the previous tick");
                        self.handles.insert(device.ip.clone(), handle);
                        summary.stale += 1;
                    } else {
                        summary.missing += 1;
                    }
                }
            }
        }

        summary
    }

    pub fn handle_mut(&mut self, address: &str) -> Option<&mut dyn DeviceHandle> {
        match self.handles.get_mut(address) {
            Some(handle) => Some(handle.as_mut()),
            None => None,
        }
    }

    /// Handle for a configured device.
    pub fn handle_for(&mut self, device: &DeviceConfig) -> Option<&mut dyn DeviceHandle> {
        self.handle_mut(&device.ip)
    }

    /// Look up by the alias the device reports about itself.
    pub fn find_by_alias(&mut self, alias: &str) -> Option<&mut dyn DeviceHandle> {
        match self
            .handles
            .values_mut()
            .find(|handle| handle.alias().eq_ignore_ascii_case(alias))
        {
            Some(handle) => Some(handle.as_mut()),
            None => None,
        }
    }

    /// Why discovery at `address` failed in the latest refresh.
    pub fn last_error(&self, address: &str) -> Option<&str> {
        self.failures.get(address).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LightOffsets;
    use crate::testing::FakeGateway;

    fn device(name: &str, ip: &str) -> DeviceConfig {
        DeviceConfig {
            name: name.to_string(),
            ip: ip.to_string(),
            always_light: false,
            cloud_coverage: None,
            light_times: LightOffsets::default(),
        }
    }

    #[test]
    fn test_refresh_skips_unreachable_devices() {
        let gateway = FakeGateway::new()
            .with_device("10.0.0.1", "Kitchen", false)
            .with_device("10.0.0.2", "Porch", true);
        gateway.set_reachable("10.0.0.2", false);

        let mut registry = DeviceRegistry::new(Box::new(gateway.clone()), false);
        let summary = registry.refresh(&[device("Kitchen", "10.0.0.1"), device("Porch", "10.0.0.2")]);

        assert_eq!(
            summary,
            RefreshSummary {
                connected: 1,
                stale: 0,
                missing: 1
            }
        );
        assert!(registry.handle_mut("10.0.0.1").is_some());
        assert!(registry.handle_mut("10.0.0.2").is_none());
        assert!(registry.last_error("10.0.0.1").is_none());
        assert!(registry.last_error("10.0.0.2").unwrap().contains("timed out"));
    }

    #[test]
    fn test_refresh_falls_back_to_previous_handle() {
        let gateway = FakeGateway::new().with_device("10.0.0.1", "Kitchen", true);
        let devices = [device("Kitchen", "10.0.0.1")];

        let mut registry = DeviceRegistry::new(Box::new(gateway.clone()), false);
        registry.refresh(&devices);

        gateway.set_reachable("10.0.0.1", false);
        let summary = registry.refresh(&devices);

        assert_eq!(summary.stale, 1);
        let handle = registry.handle_mut("10.0.0.1").unwrap();
        assert!(handle.is_on());
    }

    #[test]
    fn test_removed_devices_are_dropped() {
        let gateway = FakeGateway::new()
            .with_device("10.0.0.1", "Kitchen", false)
            .with_device("10.0.0.2", "Porch", false);

        let mut registry = DeviceRegistry::new(Box::new(gateway), false);
        registry.refresh(&[device("Kitchen", "10.0.0.1"), device("Porch", "10.0.0.2")]);
        assert!(registry.handle_mut("10.0.0.1").is_some());

        registry.refresh(&[device("Porch", "10.0.0.2")]);
        assert!(registry.handle_mut("10.0.0.1").is_none());
        assert!(registry.handle_mut("10.0.0.2").is_some());
    }

    #[test]
    fn test_lookup_by_alias_not_position() {
        let gateway = FakeGateway::new()
            .with_device("10.0.0.1", "Kitchen", false)
            .with_device("10.0.0.2", "Porch", true);

        let mut registry = DeviceRegistry::new(Box::new(gateway), false);
        // Config order differs from any discovery order
        registry.refresh(&[device("Porch", "10.0.0.2"), device("Kitchen", "10.0.0.1")]);

        assert_eq!(registry.find_by_alias("kitchen").unwrap().address(), "10.0.0.1");
        assert!(registry.find_by_alias("porch").unwrap().is_on());
        assert!(registry.find_by_alias("Garage").is_none());
    }
}
