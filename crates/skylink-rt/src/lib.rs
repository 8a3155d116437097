//! ---
//! sky_section: "03-simulation-clock"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Simulation clock and timer helpers for the server loop."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Fixed-step simulation clock and timer scheduling for the Skylink runtime.

pub mod clock;
pub mod scheduling;

pub use clock::{ClockError, ClockMode, ClockState, Simulator};
pub use scheduling::{PushSchedule, RateLimiter};
