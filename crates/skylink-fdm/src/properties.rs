//! ---
//! sky_section: "02-flight-model"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Flight-dynamics adapter contract and aircraft facade."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
//! Property names read and written by the facade (JSBSim property tree naming).

pub const LATITUDE_DEG: &str = "position/lat-gc-deg";
pub const LONGITUDE_DEG: &str = "position/long-gc-deg";
pub const ALTITUDE_FT: &str = "position/h-sl-ft";
pub const TRUE_AIRSPEED_KTS: &str = "velocities/vtrue-kts";
pub const HEADING_RAD: &str = "attitude/heading-true-rad";
pub const ROLL_RAD: &str = "attitude/roll-rad";
pub const PITCH_RAD: &str = "attitude/pitch-rad";

pub const PILOT_ACCEL_X_FT_SEC2: &str = "accelerations/a-pilot-x-ft_sec2";
pub const PILOT_ACCEL_Y_FT_SEC2: &str = "accelerations/a-pilot-y-ft_sec2";
pub const PILOT_ACCEL_Z_FT_SEC2: &str = "accelerations/a-pilot-z-ft_sec2";

pub const ROLL_RATE_RAD_SEC: &str = "velocities/p-rad_sec";
pub const PITCH_RATE_RAD_SEC: &str = "velocities/q-rad_sec";
pub const YAW_RATE_RAD_SEC: &str = "velocities/r-rad_sec";

pub const TEMPERATURE_R: &str = "atmosphere/T-R";
pub const STATIC_PRESSURE_PSF: &str = "atmosphere/P-psf";
pub const DYNAMIC_PRESSURE_PSF: &str = "aero/qbar-psf";

pub const THRUST_LBS: &str = "propulsion/engine/thrust-lbs";

pub const AILERON_CMD: &str = "fcs/aileron-cmd-norm";
pub const ELEVATOR_CMD: &str = "fcs/elevator-cmd-norm";
pub const RUDDER_CMD: &str = "fcs/rudder-cmd-norm";
pub const THROTTLE_CMD: &str = "fcs/throttle-cmd-norm";
