//! Device abstraction layer for networked light switches.
//!
//! The scheduler talks to switches only through [`DeviceGateway`] (find a
//! device by address) and [`DeviceHandle`] (read and set its relay). The
//! concrete gateway is [`kasa::KasaGateway`], which falls back to the
//! authenticated [`klap`] transport for newer firmware; tests use in-memory
//! fakes.
//!
//! A handle reports the relay state observed when it was obtained and
//! updates it after each successful command. Handles are cheap and are
//! re-acquired every tick by [`registry::DeviceRegistry`].

pub mod kasa;
pub mod klap;
pub mod registry;

pub use kasa::KasaGateway;
pub use klap::Credentials;
pub use registry::DeviceRegistry;

/// A device could not be found or queried at an address.
#[derive(Debug, thiserror::Error)]
#[error("could not connect to {address}: {source}")]
pub struct DiscoveryError {
    pub address: String,
    #[source]
    pub source: DeviceError,
}

/// A single device call failed.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("unexpected response: {0}")]
    Protocol(String),
    #[error("device rejected the command (err_code {0})")]
    Rejected(i64),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("device requires authentication; set USERNAME and PASSWORD")]
    AuthenticationRequired,
    #[error("device rejected the configured USERNAME/PASSWORD")]
    AuthenticationFailed,
}

/// Live connection to one switch.
pub trait DeviceHandle {
    /// Name reported by the device itself.
    fn alias(&self) -> &str;

    fn address(&self) -> &str;

    fn is_on(&self) -> bool;

    fn turn_on(&mut self) -> Result<(), DeviceError>;

    fn turn_off(&mut self) -> Result<(), DeviceError>;
}

/// Finds devices by network address.
pub trait DeviceGateway {
    fn discover(&self, address: &str) -> Result<Box<dyn DeviceHandle>, DiscoveryError>;
}
