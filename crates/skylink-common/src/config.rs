//! ---
//! sky_section: "01-core-functionality"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Shared primitives and utilities for the gateway runtime."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use tracing::debug;

use crate::logging::LogFormat;

fn default_dt() -> f64 {
    1.0 / 300.0
}

fn default_latitude() -> f64 {
    37.9232547
}

fn default_longitude() -> f64 {
    23.921773
}

fn default_altitude() -> f64 {
    300.0
}

fn default_airspeed() -> f64 {
    30.0
}

fn default_heading() -> f64 {
    45.0
}

fn default_sensors_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 10300))
}

fn default_controls_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 10301))
}

fn default_fdm_stream_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 0))
}

fn default_fdm_destination() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 10302))
}

fn default_fdm_period() -> Duration {
    Duration::from_millis(100)
}

fn default_telemetry_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 10400))
}

fn default_telemetry_period() -> Duration {
    Duration::from_secs(1)
}

fn default_telemetry_write_timeout() -> Duration {
    Duration::from_millis(500)
}

fn default_baud_rate() -> u32 {
    57_600
}

fn default_serial_period() -> Duration {
    Duration::from_millis(100)
}

fn default_noise_seed() -> u64 {
    0x5EED_u64
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9898))
}

/// Primary configuration object for the gateway daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub controls: ControlsConfig,
    #[serde(default)]
    pub fdm_stream: FdmStreamConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub noise: NoiseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "SKYLINK_CONFIG";

    /// Load configuration from disk, respecting the `SKYLINK_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration together with the effective source path.
    ///
    /// An explicit `SKYLINK_CONFIG` path must exist. Otherwise the first existing
    /// candidate wins; when none exists the built-in defaults are used, which
    /// mirror the stock port layout.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path.to_path_buf()),
                });
            }
        }

        debug!(
            inspected = %candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            "no configuration file found; using defaults"
        );
        let config = Self::default();
        config.validate()?;
        Ok(LoadedAppConfig {
            config,
            source: None,
        })
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.simulation.validate()?;
        self.fdm_stream.validate()?;
        if self.telemetry.period.is_zero() {
            return Err(anyhow!("telemetry period must be greater than zero"));
        }
        if self.serial.baud_rate == 0 {
            return Err(anyhow!("serial baud_rate must be greater than zero"));
        }
        if self.serial.period.is_zero() {
            return Err(anyhow!("serial period must be greater than zero"));
        }
        let sensors = self.sensors.listen;
        let controls = self.controls.listen;
        if sensors.port() != 0 && sensors == controls {
            return Err(anyhow!(
                "sensors and controls services cannot share the UDP address {}",
                sensors
            ));
        }
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Fixed integration step in seconds.
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default)]
    pub start_paused: bool,
    #[serde(default)]
    pub initial_condition: InitialCondition,
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(anyhow!(
                "simulation dt must be a positive number of seconds, got {}",
                self.dt
            ));
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            start_paused: false,
            initial_condition: InitialCondition::default(),
        }
    }
}

/// Initial aircraft state applied on start-up and on every reset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialCondition {
    /// Degrees.
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    /// Degrees.
    #[serde(default = "default_longitude")]
    pub longitude: f64,
    /// Meters above sea level.
    #[serde(default = "default_altitude")]
    pub altitude: f64,
    /// Meters per second.
    #[serde(default = "default_airspeed")]
    pub airspeed: f64,
    /// Degrees.
    #[serde(default = "default_heading")]
    pub heading: f64,
}

impl Default for InitialCondition {
    fn default() -> Self {
        Self {
            latitude: default_latitude(),
            longitude: default_longitude(),
            altitude: default_altitude(),
            airspeed: default_airspeed(),
            heading: default_heading(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorsConfig {
    #[serde(default = "default_sensors_listen")]
    pub listen: SocketAddr,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            listen: default_sensors_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlsConfig {
    #[serde(default = "default_controls_listen")]
    pub listen: SocketAddr,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            listen: default_controls_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FdmStreamConfig {
    /// Local address the streaming socket binds to.
    #[serde(default = "default_fdm_stream_bind")]
    pub bind: SocketAddr,
    #[serde(default = "FdmStreamConfig::default_destinations")]
    pub destinations: Vec<DestinationConfig>,
}

impl FdmStreamConfig {
    fn default_destinations() -> Vec<DestinationConfig> {
        vec![DestinationConfig::default()]
    }

    pub fn validate(&self) -> Result<()> {
        for destination in &self.destinations {
            if destination.period.is_zero() {
                return Err(anyhow!(
                    "fdm stream destination {} must have a positive period",
                    destination.address
                ));
            }
        }
        Ok(())
    }
}

impl Default for FdmStreamConfig {
    fn default() -> Self {
        Self {
            bind: default_fdm_stream_bind(),
            destinations: Self::default_destinations(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub address: SocketAddr,
    #[serde(default = "default_fdm_period")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub period: Duration,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            address: default_fdm_destination(),
            period: default_fdm_period(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_listen")]
    pub listen: SocketAddr,
    #[serde(default = "default_telemetry_period")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub period: Duration,
    /// Clients that cannot absorb a line within this window are dropped.
    #[serde(default = "default_telemetry_write_timeout")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub write_timeout: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            listen: default_telemetry_listen(),
            period: default_telemetry_period(),
            write_timeout: default_telemetry_write_timeout(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Character device of the point-to-point link; the link is disabled when unset.
    #[serde(default)]
    pub device: Option<PathBuf>,
    /// Line speed; the port is always opened 8N1 without flow control.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_serial_period")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub period: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: None,
            baud_rate: default_baud_rate(),
            period: default_serial_period(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_noise_seed")]
    pub seed: u64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            seed: default_noise_seed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}
