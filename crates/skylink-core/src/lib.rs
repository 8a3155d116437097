//! ---
//! sky_section: "01-core-functionality"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Simulation server loop and control channel."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
//! Single-task simulation server: one `select!` loop owns the flight model
//! and every endpoint, so no handler ever runs concurrently with another.

pub mod command;
pub mod server;

pub use command::{CommandReply, ServerAddrs, ServerHandle, SimulatorCommand};
pub use server::{ServerError, SimulationServer};
