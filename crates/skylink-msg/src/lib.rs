//! ---
//! sky_section: "04-wire-protocols"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Wire formats and protocol codecs."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Byte-level formats shared by the gateway and its clients.

pub mod controls;
pub mod fdm_frame;
pub mod framing;
pub mod sensor;
pub mod telemetry;

/// Shared result type for codec operations.
pub type Result<T> = std::result::Result<T, MessagingError>;

/// Errors raised while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// A fixed-size message arrived with the wrong number of bytes.
    #[error("{kind} message must be {expected} bytes, got {actual}")]
    InvalidLength {
        /// Message family, for logs.
        kind: &'static str,
        /// Required length.
        expected: usize,
        /// Received length.
        actual: usize,
    },
    /// Telemetry rows could not be written or parsed.
    #[error("telemetry csv error: {0}")]
    Csv(#[from] csv::Error),
    /// Wrapper for IO errors encountered while producing a message.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub use controls::{ControlCommand, CONTROLS_LEN};
pub use fdm_frame::{FdmFrame, FDM_FRAME_LEN};
pub use framing::{checksum, encode_frame, escape, unescape, FrameDecoder, FrameEvent};
pub use sensor::{SensorCommand, SensorError, SensorResponse};
pub use telemetry::{TelemetryRow, TELEMETRY_FIELDS};
