//! ---
//! sky_section: "06-observability"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Metrics collection and export utilities."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::Result;
use prometheus::{Gauge, GaugeVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

pub mod exporter;

pub use exporter::{render, MetricsExporter};

/// Registry shared between the server loop and the exporter.
pub type SharedRegistry = Arc<Registry>;

pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Collectors updated by the simulation server loop.
#[derive(Clone, Debug)]
pub struct ServerMetrics {
    registry: SharedRegistry,
    datagrams: IntCounterVec,
    frames_sent: IntCounterVec,
    commands: IntCounterVec,
    telemetry_clients: IntGauge,
    clock_steps: IntCounter,
    simulation_time: Gauge,
    build_info: GaugeVec,
}

impl ServerMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let datagrams = IntCounterVec::new(
            Opts::new(
                "skylink_datagrams_total",
                "Inbound protocol messages by protocol and outcome",
            ),
            &["protocol", "outcome"],
        )?;
        registry.register(Box::new(datagrams.clone()))?;

        let frames_sent = IntCounterVec::new(
            Opts::new(
                "skylink_frames_sent_total",
                "Outbound frames and lines by protocol",
            ),
            &["protocol"],
        )?;
        registry.register(Box::new(frames_sent.clone()))?;

        let commands = IntCounterVec::new(
            Opts::new(
                "skylink_commands_total",
                "Control-channel commands by name",
            ),
            &["command"],
        )?;
        registry.register(Box::new(commands.clone()))?;

        let telemetry_clients = IntGauge::with_opts(Opts::new(
            "skylink_telemetry_clients",
            "Connected telemetry subscribers",
        ))?;
        registry.register(Box::new(telemetry_clients.clone()))?;

        let clock_steps = IntCounter::with_opts(Opts::new(
            "skylink_clock_steps_total",
            "Flight-dynamics steps executed",
        ))?;
        registry.register(Box::new(clock_steps.clone()))?;

        let simulation_time = Gauge::with_opts(Opts::new(
            "skylink_simulation_time_seconds",
            "Current simulation time",
        ))?;
        registry.register(Box::new(simulation_time.clone()))?;

        let build_info = GaugeVec::new(
            Opts::new("skylink_build_info", "Build metadata for the running daemon"),
            &["version"],
        )?;
        registry.register(Box::new(build_info.clone()))?;

        Ok(Self {
            registry,
            datagrams,
            frames_sent,
            commands,
            telemetry_clients,
            clock_steps,
            simulation_time,
            build_info,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn record_datagram(&self, protocol: &str, outcome: &str) {
        self.datagrams.with_label_values(&[protocol, outcome]).inc();
    }

    pub fn record_sent(&self, protocol: &str, count: usize) {
        self.frames_sent
            .with_label_values(&[protocol])
            .inc_by(count as u64);
    }

    pub fn record_command(&self, command: &str) {
        self.commands.with_label_values(&[command]).inc();
    }

    pub fn set_telemetry_clients(&self, count: usize) {
        self.telemetry_clients.set(count as i64);
    }

    pub fn record_steps(&self, steps: u64, simulation_time: f64) {
        self.clock_steps.inc_by(steps);
        self.simulation_time.set(simulation_time);
    }

    pub fn set_build_info(&self, version: &str) {
        self.build_info.with_label_values(&[version]).set(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn collectors_register_once() {
        let registry = new_registry();
        let metrics = ServerMetrics::new(registry.clone()).expect("metrics");
        metrics.record_datagram("sensors", "ok");
        metrics.record_datagram("sensors", "error");
        metrics.record_steps(3, 0.03);
        assert!(ServerMetrics::new(registry.clone()).is_err());

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_owned())
            .collect();
        assert!(names.contains(&"skylink_datagrams_total".to_owned()));
        assert!(names.contains(&"skylink_clock_steps_total".to_owned()));
    }

    #[tokio::test]
    async fn serves_metrics_over_http() -> Result<()> {
        let registry = new_registry();
        let metrics = ServerMetrics::new(registry.clone())?;
        metrics.set_telemetry_clients(2);
        assert!(render(&registry)?.contains("skylink_telemetry_clients 2"));

        let exporter = MetricsExporter::start(registry, "127.0.0.1:0".parse()?).await?;
        let mut stream = tokio::net::TcpStream::connect(exporter.local_addr()).await?;
        stream
            .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await?;
        let mut response = String::new();
        stream.read_to_string(&mut response).await?;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("skylink_telemetry_clients 2"));

        exporter.stop().await
    }
}
