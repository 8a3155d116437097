//! ---
//! sky_section: "02-flight-model"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "In-memory property-tree flight-dynamics adapter."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use indexmap::IndexMap;
use skylink_common::InitialCondition;
use thiserror::Error;
use tracing::{debug, warn};

use crate::adapter::FdmAdapter;
use crate::properties as prop;
use crate::units;

/// Sea-level standard atmosphere in the engine's native units.
const SEA_LEVEL_TEMPERATURE_R: f64 = 518.67;
const SEA_LEVEL_PRESSURE_PSF: f64 = 2116.22;
const SEA_LEVEL_DENSITY_SLUG_FT3: f64 = 0.002_376_9;
const STANDARD_GRAVITY_FT_SEC2: f64 = 32.174;
const FEET_PER_SEC_PER_KNOT: f64 = 1.687_809_857;

#[derive(Debug, Error, PartialEq)]
pub enum FdmError {
    #[error("integration step must be a positive number of seconds, got {0}")]
    InvalidStep(f64),
}

/// Adapter backed by a flat property map.
///
/// No equations of motion are integrated: `run` only advances simulation
/// time. Properties hold whatever was last written, which makes the adapter
/// useful for running the gateway without a native engine and for scripting
/// failures in tests.
#[derive(Debug, Clone)]
pub struct PropertyTreeFdm {
    dt: f64,
    steps: u64,
    paused: bool,
    initial: InitialCondition,
    idle_throttle: f64,
    properties: IndexMap<String, f64>,
    remaining_runs: Option<u64>,
    reset_fails: bool,
}

impl PropertyTreeFdm {
    pub fn new(dt: f64, initial: InitialCondition) -> Result<Self, FdmError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(FdmError::InvalidStep(dt));
        }
        let mut fdm = Self {
            dt,
            steps: 0,
            paused: false,
            initial,
            idle_throttle: 0.0,
            properties: IndexMap::new(),
            remaining_runs: None,
            reset_fails: false,
        };
        fdm.apply_initial_condition();
        Ok(fdm)
    }

    /// Throttle the engine settles at after a reset.
    pub fn with_idle_throttle(mut self, throttle: f64) -> Self {
        self.idle_throttle = throttle;
        self.properties
            .insert(prop::THROTTLE_CMD.to_owned(), throttle);
        self
    }

    /// Let the next `n` calls to `run` succeed and fail every one after.
    pub fn fail_after(mut self, n: u64) -> Self {
        self.remaining_runs = Some(n);
        self
    }

    /// Make every subsequent `reset` fail.
    pub fn fail_resets(mut self) -> Self {
        self.reset_fails = true;
        self
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn apply_initial_condition(&mut self) {
        let ic = self.initial;
        let airspeed_kts = units::meters_per_sec_to_knots(ic.airspeed);
        let velocity_ft_sec = airspeed_kts * FEET_PER_SEC_PER_KNOT;
        let qbar = 0.5 * SEA_LEVEL_DENSITY_SLUG_FT3 * velocity_ft_sec * velocity_ft_sec;

        let seeded = [
            (prop::LATITUDE_DEG, ic.latitude),
            (prop::LONGITUDE_DEG, ic.longitude),
            (prop::ALTITUDE_FT, units::meters_to_feet(ic.altitude)),
            (prop::TRUE_AIRSPEED_KTS, airspeed_kts),
            (prop::HEADING_RAD, ic.heading.to_radians()),
            (prop::ROLL_RAD, 0.0),
            (prop::PITCH_RAD, 0.0),
            (prop::PILOT_ACCEL_X_FT_SEC2, 0.0),
            (prop::PILOT_ACCEL_Y_FT_SEC2, 0.0),
            (prop::PILOT_ACCEL_Z_FT_SEC2, -STANDARD_GRAVITY_FT_SEC2),
            (prop::ROLL_RATE_RAD_SEC, 0.0),
            (prop::PITCH_RATE_RAD_SEC, 0.0),
            (prop::YAW_RATE_RAD_SEC, 0.0),
            (prop::TEMPERATURE_R, SEA_LEVEL_TEMPERATURE_R),
            (prop::STATIC_PRESSURE_PSF, SEA_LEVEL_PRESSURE_PSF),
            (prop::DYNAMIC_PRESSURE_PSF, qbar),
            (prop::THRUST_LBS, 0.0),
            (prop::AILERON_CMD, 0.0),
            (prop::ELEVATOR_CMD, 0.0),
            (prop::RUDDER_CMD, 0.0),
            (prop::THROTTLE_CMD, self.idle_throttle),
        ];
        for (name, value) in seeded {
            self.properties.insert(name.to_owned(), value);
        }
    }
}

impl FdmAdapter for PropertyTreeFdm {
    fn run(&mut self) -> bool {
        if let Some(remaining) = self.remaining_runs.as_mut() {
            if *remaining == 0 {
                warn!(steps = self.steps, "scripted engine failure");
                return false;
            }
            *remaining -= 1;
        }
        self.steps += 1;
        true
    }

    fn pause(&mut self) {
        self.paused = true;
        debug!("property tree paused");
    }

    fn resume(&mut self) {
        self.paused = false;
        debug!("property tree resumed");
    }

    fn reset(&mut self) -> bool {
        if self.reset_fails {
            warn!("scripted reset failure");
            return false;
        }
        self.steps = 0;
        self.apply_initial_condition();
        true
    }

    fn get_property(&self, name: &str) -> f64 {
        self.properties.get(name).copied().unwrap_or(0.0)
    }

    fn set_property(&mut self, name: &str, value: f64) {
        self.properties.insert(name.to_owned(), value);
    }

    fn sim_time(&self) -> f64 {
        self.steps as f64 * self.dt
    }

    fn dt(&self) -> f64 {
        self.dt
    }

    fn idle_throttle(&self) -> f64 {
        self.idle_throttle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_step() {
        let ic = InitialCondition::default();
        assert_eq!(
            PropertyTreeFdm::new(0.0, ic).unwrap_err(),
            FdmError::InvalidStep(0.0)
        );
        assert!(PropertyTreeFdm::new(f64::NAN, ic).is_err());
    }

    #[test]
    fn seeds_tree_from_initial_condition() {
        let ic = InitialCondition::default();
        let fdm = PropertyTreeFdm::new(0.01, ic).expect("adapter");
        assert_eq!(fdm.get_property(prop::LATITUDE_DEG), ic.latitude);
        assert!((units::feet_to_meters(fdm.get_property(prop::ALTITUDE_FT)) - ic.altitude).abs() < 1e-9);
        assert!(fdm.get_property(prop::DYNAMIC_PRESSURE_PSF) > 0.0);
        assert_eq!(fdm.get_property("no/such/property"), 0.0);
    }

    #[test]
    fn run_advances_time_until_scripted_failure() {
        let mut fdm = PropertyTreeFdm::new(0.5, InitialCondition::default())
            .expect("adapter")
            .fail_after(2);
        assert!(fdm.run());
        assert!(fdm.run());
        assert!(!fdm.run());
        assert_eq!(fdm.sim_time(), 1.0);
    }

    #[test]
    fn reset_restores_initial_condition() {
        let mut fdm = PropertyTreeFdm::new(0.5, InitialCondition::default())
            .expect("adapter")
            .with_idle_throttle(0.2);
        fdm.set_property(prop::LATITUDE_DEG, 0.0);
        fdm.set_property(prop::THROTTLE_CMD, 1.0);
        fdm.run();
        assert!(fdm.reset());
        assert_eq!(fdm.sim_time(), 0.0);
        assert_eq!(fdm.get_property(prop::THROTTLE_CMD), 0.2);
        assert_eq!(
            fdm.get_property(prop::LATITUDE_DEG),
            InitialCondition::default().latitude
        );

        let mut broken = fdm.fail_resets();
        assert!(!broken.reset());
    }
}
