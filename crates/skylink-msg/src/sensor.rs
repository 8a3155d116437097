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
use strum::{Display, EnumIter, EnumString};

/// Status byte of a successful response.
pub const STATUS_OK: u8 = 0x00;
/// Status byte (and whole payload) of a failed request.
pub const STATUS_ERROR: u8 = 0xFF;

/// Sensor groups addressable by the one-byte request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[repr(u8)]
pub enum SensorCommand {
    /// Latitude, longitude, altitude, airspeed, heading.
    Gps = 0x00,
    /// Body accelerations x, y, z.
    Accelerometer = 0x01,
    /// Roll, pitch and yaw rates.
    Gyroscope = 0x02,
    /// Magnetic field; the flight model has none, so always zero.
    Magnetometer = 0x03,
    /// Outside air temperature.
    Thermometer = 0x04,
    /// Total pressure.
    #[strum(to_string = "pitot_tube", serialize = "pitot")]
    PitotTube = 0x05,
    /// Static pressure.
    #[strum(to_string = "static_pressure", serialize = "pressure")]
    StaticPressure = 0x06,
    /// Roll, pitch, heading, latitude, longitude, airspeed, altitude.
    Ins = 0x07,
}

/// Why a sensor request could not be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    /// The datagram was not exactly one byte long.
    #[error("sensor request must be 1 byte, got {0}")]
    Malformed(usize),
    /// The command byte names no sensor group.
    #[error("unknown sensor command 0x{0:02x}")]
    UnknownCommand(u8),
}

impl TryFrom<u8> for SensorCommand {
    type Error = SensorError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0x00 => Self::Gps,
            0x01 => Self::Accelerometer,
            0x02 => Self::Gyroscope,
            0x03 => Self::Magnetometer,
            0x04 => Self::Thermometer,
            0x05 => Self::PitotTube,
            0x06 => Self::StaticPressure,
            0x07 => Self::Ins,
            other => return Err(SensorError::UnknownCommand(other)),
        })
    }
}

impl SensorCommand {
    /// Wire code of this command.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Names of the values carried in the response, in order.
    pub fn value_names(self) -> &'static [&'static str] {
        match self {
            Self::Gps => &["latitude", "longitude", "altitude", "airspeed", "heading"],
            Self::Accelerometer => &["x", "y", "z"],
            Self::Gyroscope => &["roll_rate", "pitch_rate", "yaw_rate"],
            Self::Magnetometer => &["x", "y", "z"],
            Self::Thermometer => &["temperature"],
            Self::PitotTube => &["total_pressure"],
            Self::StaticPressure => &["static_pressure"],
            Self::Ins => &[
                "roll",
                "pitch",
                "heading",
                "latitude",
                "longitude",
                "airspeed",
                "altitude",
            ],
        }
    }

    /// Parse a request datagram.
    pub fn decode_request(datagram: &[u8]) -> Result<Self, SensorError> {
        match datagram {
            [code] => Self::try_from(*code),
            other => Err(SensorError::Malformed(other.len())),
        }
    }

    /// Build the success response for this group from a facade snapshot.
    pub fn respond(self, readings: &AircraftReadings) -> SensorResponse {
        let values: Vec<f64> = match self {
            Self::Gps => {
                let gps = &readings.gps;
                vec![gps.latitude, gps.longitude, gps.altitude, gps.airspeed, gps.heading]
            }
            Self::Accelerometer => {
                let a = &readings.accelerometer;
                vec![a.x, a.y, a.z]
            }
            Self::Gyroscope => {
                let g = &readings.gyroscope;
                vec![g.roll_rate, g.pitch_rate, g.yaw_rate]
            }
            Self::Magnetometer => vec![0.0, 0.0, 0.0],
            Self::Thermometer => vec![readings.temperature],
            Self::PitotTube => vec![readings.total_pressure],
            Self::StaticPressure => vec![readings.static_pressure],
            Self::Ins => {
                let ins = &readings.ins;
                vec![
                    ins.roll,
                    ins.pitch,
                    ins.heading,
                    ins.latitude,
                    ins.longitude,
                    ins.airspeed,
                    ins.altitude,
                ]
            }
        };
        SensorResponse {
            status: STATUS_OK,
            command: self.code(),
            values: values.into_iter().map(|v| v as f32).collect(),
        }
    }
}

/// Reply to a sensor request.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorResponse {
    /// [`STATUS_OK`] or [`STATUS_ERROR`].
    pub status: u8,
    /// Echo of the request's command byte; unused on error.
    pub command: u8,
    /// Group values in the order of [`SensorCommand::value_names`].
    pub values: Vec<f32>,
}

impl SensorResponse {
    /// The error reply.
    pub fn error() -> Self {
        Self {
            status: STATUS_ERROR,
            command: 0,
            values: Vec::new(),
        }
    }

    /// Whether this reply carries values.
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Encode; the error reply is the single status byte.
    pub fn encode(&self) -> Bytes {
        if self.status != STATUS_OK {
            return Bytes::from_static(&[STATUS_ERROR]);
        }
        let mut buf = BytesMut::with_capacity(2 + self.values.len() * 4);
        buf.put_u8(self.status);
        buf.put_u8(self.command);
        for value in &self.values {
            buf.put_f32(*value);
        }
        buf.freeze()
    }

    /// Decode a reply received by a client. Returns `None` for a truncated
    /// success reply.
    pub fn decode(mut bytes: &[u8]) -> Option<Self> {
        match bytes.first().copied() {
            None => None,
            Some(STATUS_OK) => {
                if bytes.len() < 2 || (bytes.len() - 2) % 4 != 0 {
                    return None;
                }
                let status = bytes.get_u8();
                let command = bytes.get_u8();
                let mut values = Vec::with_capacity(bytes.len() / 4);
                while bytes.has_remaining() {
                    values.push(bytes.get_f32());
                }
                Some(Self {
                    status,
                    command,
                    values,
                })
            }
            Some(_) => Some(Self::error()),
        }
    }
}

/// Answer one request datagram: the encoded success reply or `[0xFF]`.
pub fn handle_request(
    datagram: &[u8],
    readings: &AircraftReadings,
) -> (Result<SensorCommand, SensorError>, Bytes) {
    let outcome = SensorCommand::decode_request(datagram);
    let reply = match outcome {
        Ok(command) => command.respond(readings),
        Err(_) => SensorResponse::error(),
    };
    (outcome, reply.encode())
}
