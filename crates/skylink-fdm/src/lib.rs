//! ---
//! sky_section: "02-flight-model"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Flight-dynamics adapter contract and aircraft facade."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
//! Everything the gateway knows about the simulated aircraft.
//!
//! The physics lives behind [`FdmAdapter`]; this crate only names the
//! properties it reads and writes, converts them to SI units and, optionally,
//! perturbs sensor readings with a seeded noise model.

pub mod adapter;
pub mod aircraft;
pub mod noise;
pub mod properties;
pub mod property_tree;
pub mod units;

pub use adapter::FdmAdapter;
pub use aircraft::{
    Accelerometer, Aircraft, AircraftReadings, ControlSurfaces, Engine, Gps, Gyroscope,
    InertialNavigation,
};
pub use noise::SensorNoise;
pub use property_tree::{FdmError, PropertyTreeFdm};
