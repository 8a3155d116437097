//! ---
//! sky_section: "04-wire-protocols"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Wire formats and protocol codecs."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use bytes::{Buf, BufMut, Bytes, BytesMut};
use skylink_fdm::ControlSurfaces;

use crate::{MessagingError, Result};

/// Encoded size of a [`ControlCommand`].
pub const CONTROLS_LEN: usize = 16;

/// Pilot inputs as carried by the controls datagram and the serial link.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlCommand {
    /// Aileron, `[-1, 1]` once clamped.
    pub aileron: f32,
    /// Elevator, `[-1, 1]` once clamped.
    pub elevator: f32,
    /// Rudder, `[-1, 1]` once clamped.
    pub rudder: f32,
    /// Throttle, `[0, 1]` once clamped.
    pub throttle: f32,
}

impl ControlCommand {
    /// Decode four big-endian `f32`; any other length is rejected.
    pub fn decode(mut bytes: &[u8]) -> Result<Self> {
        if bytes.len() != CONTROLS_LEN {
            return Err(MessagingError::InvalidLength {
                kind: "controls",
                expected: CONTROLS_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            aileron: bytes.get_f32(),
            elevator: bytes.get_f32(),
            rudder: bytes.get_f32(),
            throttle: bytes.get_f32(),
        })
    }

    /// Encode as 16 big-endian bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(CONTROLS_LEN);
        buf.put_f32(self.aileron);
        buf.put_f32(self.elevator);
        buf.put_f32(self.rudder);
        buf.put_f32(self.throttle);
        buf.freeze()
    }
}

impl From<ControlCommand> for ControlSurfaces {
    fn from(cmd: ControlCommand) -> Self {
        ControlSurfaces {
            aileron: f64::from(cmd.aileron),
            elevator: f64::from(cmd.elevator),
            rudder: f64::from(cmd.rudder),
            throttle: f64::from(cmd.throttle),
        }
        .clamped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_big_endian_fields() {
        let mut raw = Vec::new();
        for v in [0.5f32, -0.25, 1.0, 0.75] {
            raw.extend_from_slice(&v.to_be_bytes());
        }
        let cmd = ControlCommand::decode(&raw).expect("decode");
        assert_eq!(
            cmd,
            ControlCommand {
                aileron: 0.5,
                elevator: -0.25,
                rudder: 1.0,
                throttle: 0.75
            }
        );
        assert_eq!(cmd.encode().as_ref(), raw.as_slice());
    }

    #[test]
    fn rejects_short_and_long_datagrams() {
        assert!(ControlCommand::decode(&[0u8; 15]).is_err());
        assert!(ControlCommand::decode(&[0u8; 17]).is_err());
    }

    #[test]
    fn conversion_clamps_out_of_range_inputs() {
        let surfaces: ControlSurfaces = ControlCommand {
            aileron: 2.0,
            elevator: -7.5,
            rudder: f32::NAN,
            throttle: 1.5,
        }
        .into();
        assert_eq!(surfaces.aileron, 1.0);
        assert_eq!(surfaces.elevator, -1.0);
        assert_eq!(surfaces.rudder, 0.0);
        assert_eq!(surfaces.throttle, 1.0);
    }
}
