//! ---
//! sky_section: "02-flight-model"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Unit-converting aircraft facade over the flight-dynamics adapter."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use crate::adapter::FdmAdapter;
use crate::properties as prop;
use crate::units;

/// GPS fix in degrees, meters and meters/second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Gps {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub airspeed: f64,
    pub heading: f64,
}

/// Body-frame acceleration at the pilot station in meters/second².
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Accelerometer {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Body angular rates in degrees/second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Gyroscope {
    pub roll_rate: f64,
    pub pitch_rate: f64,
    pub yaw_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InertialNavigation {
    pub roll: f64,
    pub pitch: f64,
    pub heading: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub airspeed: f64,
    pub altitude: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Engine {
    /// Newtons.
    pub thrust: f64,
    pub throttle: f64,
}

/// Normalised control surface commands.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlSurfaces {
    pub aileron: f64,
    pub elevator: f64,
    pub rudder: f64,
    pub throttle: f64,
}

impl ControlSurfaces {
    /// Surfaces at their home position with the given throttle.
    pub fn neutral(throttle: f64) -> Self {
        Self {
            aileron: 0.0,
            elevator: 0.0,
            rudder: 0.0,
            throttle,
        }
    }

    /// Clamp every command to its legal range; NaN maps to the neutral value.
    pub fn clamped(self) -> Self {
        Self {
            aileron: clamp_or_neutral(self.aileron, -1.0, 1.0),
            elevator: clamp_or_neutral(self.elevator, -1.0, 1.0),
            rudder: clamp_or_neutral(self.rudder, -1.0, 1.0),
            throttle: clamp_or_neutral(self.throttle, 0.0, 1.0),
        }
    }
}

fn clamp_or_neutral(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(min, max)
    }
}

/// Everything the protocols publish, sampled at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AircraftReadings {
    /// Simulation time in seconds.
    pub time: f64,
    pub dt: f64,
    pub gps: Gps,
    pub accelerometer: Accelerometer,
    pub gyroscope: Gyroscope,
    /// Kelvin.
    pub temperature: f64,
    /// Pascal.
    pub static_pressure: f64,
    /// Pascal, as seen by the pitot tube.
    pub total_pressure: f64,
    pub ins: InertialNavigation,
    pub engine: Engine,
    pub controls: ControlSurfaces,
}

/// Unit-converting view over an [`FdmAdapter`].
///
/// The facade holds no state of its own; every accessor reads the adapter's
/// property tree at call time.
pub struct Aircraft<'a, F: ?Sized> {
    fdm: &'a F,
}

impl<'a, F: FdmAdapter + ?Sized> Aircraft<'a, F> {
    pub fn new(fdm: &'a F) -> Self {
        Self { fdm }
    }

    fn get(&self, name: &str) -> f64 {
        self.fdm.get_property(name)
    }

    pub fn gps(&self) -> Gps {
        Gps {
            latitude: self.get(prop::LATITUDE_DEG),
            longitude: self.get(prop::LONGITUDE_DEG),
            altitude: units::feet_to_meters(self.get(prop::ALTITUDE_FT)),
            airspeed: units::knots_to_meters_per_sec(self.get(prop::TRUE_AIRSPEED_KTS)),
            heading: self.get(prop::HEADING_RAD).to_degrees(),
        }
    }

    pub fn accelerometer(&self) -> Accelerometer {
        Accelerometer {
            x: units::feet_to_meters(self.get(prop::PILOT_ACCEL_X_FT_SEC2)),
            y: units::feet_to_meters(self.get(prop::PILOT_ACCEL_Y_FT_SEC2)),
            z: units::feet_to_meters(self.get(prop::PILOT_ACCEL_Z_FT_SEC2)),
        }
    }

    pub fn gyroscope(&self) -> Gyroscope {
        Gyroscope {
            roll_rate: self.get(prop::ROLL_RATE_RAD_SEC).to_degrees(),
            pitch_rate: self.get(prop::PITCH_RATE_RAD_SEC).to_degrees(),
            yaw_rate: self.get(prop::YAW_RATE_RAD_SEC).to_degrees(),
        }
    }

    /// Outside air temperature in Kelvin.
    pub fn temperature(&self) -> f64 {
        units::rankine_to_kelvin(self.get(prop::TEMPERATURE_R))
    }

    /// Static pressure in Pascal.
    pub fn static_pressure(&self) -> f64 {
        units::psf_to_pascal(self.get(prop::STATIC_PRESSURE_PSF))
    }

    /// Pitot (static + dynamic) pressure in Pascal.
    pub fn total_pressure(&self) -> f64 {
        units::psf_to_pascal(
            self.get(prop::STATIC_PRESSURE_PSF) + self.get(prop::DYNAMIC_PRESSURE_PSF),
        )
    }

    pub fn ins(&self) -> InertialNavigation {
        let gps = self.gps();
        InertialNavigation {
            roll: self.get(prop::ROLL_RAD).to_degrees(),
            pitch: self.get(prop::PITCH_RAD).to_degrees(),
            heading: gps.heading,
            latitude: gps.latitude,
            longitude: gps.longitude,
            airspeed: gps.airspeed,
            altitude: gps.altitude,
        }
    }

    pub fn engine(&self) -> Engine {
        Engine {
            thrust: units::pounds_to_newtons(self.get(prop::THRUST_LBS)),
            throttle: self.get(prop::THROTTLE_CMD),
        }
    }

    pub fn controls(&self) -> ControlSurfaces {
        ControlSurfaces {
            aileron: self.get(prop::AILERON_CMD),
            elevator: self.get(prop::ELEVATOR_CMD),
            rudder: self.get(prop::RUDDER_CMD),
            throttle: self.get(prop::THROTTLE_CMD),
        }
    }

    pub fn readings(&self) -> AircraftReadings {
        AircraftReadings {
            time: self.fdm.sim_time(),
            dt: self.fdm.dt(),
            gps: self.gps(),
            accelerometer: self.accelerometer(),
            gyroscope: self.gyroscope(),
            temperature: self.temperature(),
            static_pressure: self.static_pressure(),
            total_pressure: self.total_pressure(),
            ins: self.ins(),
            engine: self.engine(),
            controls: self.controls(),
        }
    }
}

/// Clamp and write control commands to the adapter. Returns the applied values.
pub fn set_controls<F: FdmAdapter + ?Sized>(fdm: &mut F, controls: ControlSurfaces) -> ControlSurfaces {
    let applied = controls.clamped();
    fdm.set_property(prop::AILERON_CMD, applied.aileron);
    fdm.set_property(prop::ELEVATOR_CMD, applied.elevator);
    fdm.set_property(prop::RUDDER_CMD, applied.rudder);
    fdm.set_property(prop::THROTTLE_CMD, applied.throttle);
    applied
}
