//! ---
//! sky_section: "04-wire-protocols"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Wire formats and protocol codecs."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use skylink_fdm::AircraftReadings;

use crate::Result;

/// Column names of the telemetry stream, in order.
pub const TELEMETRY_FIELDS: [&str; 23] = [
    "time",
    "dt",
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

/// One telemetry sample in [`TELEMETRY_FIELDS`] order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryRow([f64; 23]);

impl TelemetryRow {
    /// Sample the facade snapshot.
    pub fn from_readings(r: &AircraftReadings) -> Self {
        Self([
            r.time,
            r.dt,
            r.gps.latitude,
            r.gps.longitude,
            r.gps.altitude,
            r.gps.airspeed,
            r.gps.heading,
            r.accelerometer.x,
            r.accelerometer.y,
            r.accelerometer.z,
            r.gyroscope.roll_rate,
            r.gyroscope.pitch_rate,
            r.gyroscope.yaw_rate,
            r.temperature,
            r.static_pressure,
            r.total_pressure,
            r.ins.roll,
            r.ins.pitch,
            r.engine.thrust,
            r.controls.aileron,
            r.controls.elevator,
            r.controls.rudder,
            r.controls.throttle,
        ])
    }

    /// Values in column order.
    pub fn values(&self) -> &[f64; 23] {
        &self.0
    }

    /// Comma separated values terminated by `\r\n`.
    pub fn value_line(&self) -> Result<Vec<u8>> {
        write_line(self.0.iter().map(|v| v.to_string()))
    }
}

/// Comma separated column names terminated by `\r\n`.
pub fn header_line() -> Result<Vec<u8>> {
    write_line(TELEMETRY_FIELDS.iter().map(|name| name.to_string()))
}

fn write_line<I>(fields: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = String>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    writer.into_inner().map_err(|err| err.into_error().into())
}

/// Split one received line into its fields.
pub fn parse_line(line: &str) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(line.trim_end().as_bytes());
    let mut record = csv::StringRecord::new();
    reader.read_record(&mut record)?;
    Ok(record.iter().map(str::to_owned).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lists_every_field_with_crlf() {
        let header = String::from_utf8(header_line().expect("header")).expect("utf8");
        assert!(header.starts_with("time,dt,latitude,"));
        assert!(header.ends_with("rudder,throttle\r\n"));
        assert_eq!(header.trim_end().split(',').count(), TELEMETRY_FIELDS.len());
    }

    #[test]
    fn value_line_follows_field_order() {
        let mut readings = AircraftReadings::default();
        readings.time = 2.5;
        readings.dt = 0.01;
        readings.controls.throttle = 0.75;
        let line = TelemetryRow::from_readings(&readings)
            .value_line()
            .expect("line");
        let line = String::from_utf8(line).expect("utf8");
        assert!(line.ends_with("\r\n"));

        let fields = parse_line(&line).expect("parse");
        assert_eq!(fields.len(), 23);
        assert_eq!(fields[0], "2.5");
        assert_eq!(fields[1], "0.01");
        assert_eq!(fields[22], "0.75");
    }
}
