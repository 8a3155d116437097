//! ---
//! sky_section: "01-core-functionality"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Shared primitives and utilities for the gateway runtime."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
//! Shared primitives for the Skylink workspace.
//! This crate exposes configuration loading and tracing initialisation
//! consumed by the daemon, the client tool and the integration tests.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, ControlsConfig, DestinationConfig, FdmStreamConfig, InitialCondition,
    LoadedAppConfig, LoggingConfig, MetricsConfig, NoiseConfig, SensorsConfig, SerialConfig,
    SimulationConfig, TelemetryConfig,
};
pub use logging::{init_cli_tracing, init_tracing, LogFormat};
