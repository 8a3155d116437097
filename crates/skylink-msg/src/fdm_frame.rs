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
use skylink_fdm::AircraftReadings;

use crate::{MessagingError, Result};

/// Number of `f32` values in one frame.
pub const FDM_FRAME_FIELDS: usize = 22;

/// Encoded size of an [`FdmFrame`].
pub const FDM_FRAME_LEN: usize = FDM_FRAME_FIELDS * 4;

/// Field names in wire order.
pub const FDM_FRAME_FIELD_NAMES: [&str; FDM_FRAME_FIELDS] = [
    "time",
    "latitude",
    "longitude",
    "altitude",
    "airspeed",
    "heading",
    "x_acceleration",
    "y_acceleration",
    "z_acceleration",
    "roll_rate",
    "pitch_rate",
    "yaw_rate",
    "temperature",
    "static_pressure",
    "total_pressure",
    "roll",
    "pitch",
    "thrust",
    "aileron",
    "elevator",
    "rudder",
    "throttle",
];

/// Snapshot of the flight model pushed to streaming destinations and the
/// serial link: 22 big-endian `f32` values in a fixed order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FdmFrame {
    /// Simulation time in seconds.
    pub time: f32,
    /// Degrees.
    pub latitude: f32,
    /// Degrees.
    pub longitude: f32,
    /// Meters.
    pub altitude: f32,
    /// Meters/second.
    pub airspeed: f32,
    /// Degrees.
    pub heading: f32,
    /// Meters/second².
    pub x_acceleration: f32,
    /// Meters/second².
    pub y_acceleration: f32,
    /// Meters/second².
    pub z_acceleration: f32,
    /// Degrees/second.
    pub roll_rate: f32,
    /// Degrees/second.
    pub pitch_rate: f32,
    /// Degrees/second.
    pub yaw_rate: f32,
    /// Kelvin.
    pub temperature: f32,
    /// Pascal.
    pub static_pressure: f32,
    /// Pascal.
    pub total_pressure: f32,
    /// Degrees.
    pub roll: f32,
    /// Degrees.
    pub pitch: f32,
    /// Newtons.
    pub thrust: f32,
    /// Normalised `[-1, 1]`.
    pub aileron: f32,
    /// Normalised `[-1, 1]`.
    pub elevator: f32,
    /// Normalised `[-1, 1]`.
    pub rudder: f32,
    /// Normalised `[0, 1]`.
    pub throttle: f32,
}

impl FdmFrame {
    /// Narrow a facade snapshot to wire precision.
    pub fn from_readings(readings: &AircraftReadings) -> Self {
        Self {
            time: readings.time as f32,
            latitude: readings.gps.latitude as f32,
            longitude: readings.gps.longitude as f32,
            altitude: readings.gps.altitude as f32,
            airspeed: readings.gps.airspeed as f32,
            heading: readings.gps.heading as f32,
            x_acceleration: readings.accelerometer.x as f32,
            y_acceleration: readings.accelerometer.y as f32,
            z_acceleration: readings.accelerometer.z as f32,
            roll_rate: readings.gyroscope.roll_rate as f32,
            pitch_rate: readings.gyroscope.pitch_rate as f32,
            yaw_rate: readings.gyroscope.yaw_rate as f32,
            temperature: readings.temperature as f32,
            static_pressure: readings.static_pressure as f32,
            total_pressure: readings.total_pressure as f32,
            roll: readings.ins.roll as f32,
            pitch: readings.ins.pitch as f32,
            thrust: readings.engine.thrust as f32,
            aileron: readings.controls.aileron as f32,
            elevator: readings.controls.elevator as f32,
            rudder: readings.controls.rudder as f32,
            throttle: readings.controls.throttle as f32,
        }
    }

    /// Values in wire order.
    pub fn values(&self) -> [f32; FDM_FRAME_FIELDS] {
        [
            self.time,
            self.latitude,
            self.longitude,
            self.altitude,
            self.airspeed,
            self.heading,
            self.x_acceleration,
            self.y_acceleration,
            self.z_acceleration,
            self.roll_rate,
            self.pitch_rate,
            self.yaw_rate,
            self.temperature,
            self.static_pressure,
            self.total_pressure,
            self.roll,
            self.pitch,
            self.thrust,
            self.aileron,
            self.elevator,
            self.rudder,
            self.throttle,
        ]
    }

    fn from_values(v: [f32; FDM_FRAME_FIELDS]) -> Self {
        Self {
            time: v[0],
            latitude: v[1],
            longitude: v[2],
            altitude: v[3],
            airspeed: v[4],
            heading: v[5],
            x_acceleration: v[6],
            y_acceleration: v[7],
            z_acceleration: v[8],
            roll_rate: v[9],
            pitch_rate: v[10],
            yaw_rate: v[11],
            temperature: v[12],
            static_pressure: v[13],
            total_pressure: v[14],
            roll: v[15],
            pitch: v[16],
            thrust: v[17],
            aileron: v[18],
            elevator: v[19],
            rudder: v[20],
            throttle: v[21],
        }
    }

    /// Encode as 88 big-endian bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FDM_FRAME_LEN);
        for value in self.values() {
            buf.put_f32(value);
        }
        buf.freeze()
    }

    /// Decode a frame; any length other than 88 bytes is rejected.
    pub fn decode(mut bytes: &[u8]) -> Result<Self> {
        if bytes.len() != FDM_FRAME_LEN {
            return Err(MessagingError::InvalidLength {
                kind: "fdm frame",
                expected: FDM_FRAME_LEN,
                actual: bytes.len(),
            });
        }
        let mut values = [0.0f32; FDM_FRAME_FIELDS];
        for value in values.iter_mut() {
            *value = bytes.get_f32();
        }
        Ok(Self::from_values(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylink_fdm::ControlSurfaces;

    #[test]
    fn encodes_big_endian_in_field_order() {
        let frame = FdmFrame {
            time: 1.5,
            throttle: 0.25,
            ..FdmFrame::default()
        };
        let bytes = frame.encode();
        assert_eq!(bytes.len(), FDM_FRAME_LEN);
        assert_eq!(&bytes[..4], &1.5f32.to_be_bytes());
        assert_eq!(&bytes[84..], &0.25f32.to_be_bytes());
    }

    #[test]
    fn decode_rejects_wrong_lengths() {
        for len in [0, 87, 89, 176] {
            let err = FdmFrame::decode(&vec![0u8; len]).unwrap_err();
            assert!(matches!(err, MessagingError::InvalidLength { actual, .. } if actual == len));
        }
    }

    #[test]
    fn built_from_readings() {
        let mut readings = AircraftReadings::default();
        readings.gps.heading = 45.0;
        readings.ins.roll = -3.0;
        readings.controls = ControlSurfaces::neutral(0.6);
        let frame = FdmFrame::from_readings(&readings);
        let decoded = FdmFrame::decode(&frame.encode()).expect("decode");
        assert_eq!(decoded.heading, 45.0);
        assert_eq!(decoded.roll, -3.0);
        assert_eq!(decoded.throttle, 0.6);
    }

    #[test]
    fn every_field_keeps_its_slot() {
        let mut values = [0.0f32; FDM_FRAME_FIELDS];
        for (i, value) in values.iter_mut().enumerate() {
            *value = i as f32 * 1.5 + 0.25;
        }
        let frame = FdmFrame::from_values(values);
        assert_eq!(frame.values(), values);
        assert_eq!(frame.x_acceleration, 6.0 * 1.5 + 0.25);
        assert_eq!(frame.y_acceleration, 7.0 * 1.5 + 0.25);

        let bytes = frame.encode();
        for (i, chunk) in bytes.chunks(4).enumerate() {
            assert_eq!(chunk, &values[i].to_be_bytes(), "{}", FDM_FRAME_FIELD_NAMES[i]);
        }
        assert_eq!(FdmFrame::decode(&bytes).expect("decode"), frame);
    }

    #[test]
    fn arbitrary_buffers_reencode_byte_for_byte() {
        let raw: Vec<u8> = (0..FDM_FRAME_LEN)
            .map(|i| (i as u8).wrapping_mul(37).wrapping_add(11))
            .collect();
        let frame = FdmFrame::decode(&raw).expect("decode");
        assert_eq!(frame.encode().as_ref(), raw.as_slice());
    }
}
