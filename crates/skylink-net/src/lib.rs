//! ---
//! sky_section: "05-networking-external-interfaces"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Socket and serial-link protocol services."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Protocol endpoints driven by the simulation server loop.
//!
//! None of these types spawn tasks. Each exposes a cancel-safe receive or
//! wait future for a `select!` branch and a handler the loop calls with the
//! current aircraft readings.

use std::net::SocketAddr;

pub mod controls;
pub mod sensors;
pub mod serial;
pub mod streaming;
pub mod telemetry;

/// Errors raised while setting up network endpoints.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// A listener or socket could not be bound.
    #[error("failed to bind {service} on {addr}")]
    Bind {
        /// Service name, for logs.
        service: &'static str,
        /// Requested address.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A serial device could not be opened or configured.
    #[error("failed to open serial device {device}")]
    Serial {
        /// Device path.
        device: String,
        /// Underlying error.
        #[source]
        source: tokio_serial::Error,
    },
    /// Any other socket error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared result type for network setup.
pub type Result<T> = std::result::Result<T, NetError>;

pub use controls::ControlsService;
pub use sensors::SensorService;
pub use serial::{open_port, SerialLink, SerialPort};
pub use streaming::FdmStreamer;
pub use telemetry::{TelemetryBroadcaster, TelemetryListener};
