//! ---
//! sky_section: "01-core-functionality"
//! sky_subsection: "binary"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Binary entrypoint for the Skylink daemon."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use skylink_common::{init_tracing, AppConfig, LogFormat};
use skylink_core::{ServerHandle, SimulationServer};
use skylink_fdm::PropertyTreeFdm;
use skylink_metrics::{new_registry, MetricsExporter, ServerMetrics};
use skylink_net::open_port;
use tokio::signal;
use tracing::{error, info, warn};

mod console;

const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Skylink flight-simulation gateway daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Start with the simulation clock paused")]
    paused: bool,

    #[arg(long, value_name = "SECONDS", help = "Override the integration step")]
    dt: Option<f64>,

    #[arg(long, value_name = "FORMAT", help = "Override the log format (json or pretty)")]
    log_format: Option<LogFormat>,

    #[arg(long, help = "Read operator commands from stdin")]
    console: bool,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("skylinkd {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/skylink.toml"));
    candidates.push(PathBuf::from("configs/example.toml"));

    let load_started = Instant::now();
    let loaded = AppConfig::load_with_source(&candidates)?;
    let mut config = loaded.config;
    if cli.paused {
        config.simulation.start_paused = true;
    }
    if let Some(dt) = cli.dt {
        config.simulation.dt = dt;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    config.validate()?;
    init_tracing("skylinkd", &config.logging)?;
    info!(
        source = %loaded
            .source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "defaults".into()),
        elapsed_ms = load_started.elapsed().as_millis() as u64,
        "configuration loaded"
    );

    // The server owns non-Send endpoints and runs on this thread only.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let outcome = runtime.block_on(run_daemon(config, cli.console));
    // A pending stdin read would otherwise keep the process alive.
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    outcome
}

async fn run_daemon(config: AppConfig, console: bool) -> Result<()> {
    let initial = config.simulation.initial_condition;
    let fdm = PropertyTreeFdm::new(config.simulation.dt, initial)?;
    info!(
        dt = config.simulation.dt,
        latitude = initial.latitude,
        longitude = initial.longitude,
        altitude = initial.altitude,
        "flight dynamics model initialised"
    );

    let (mut server, handle) = SimulationServer::bind(&config, fdm).await?;

    if let Some(device) = &config.serial.device {
        let port = open_port(device, config.serial.baud_rate)?;
        server = server.with_serial(device.display().to_string(), port);
    }

    let metrics_server = if config.metrics.enabled {
        let registry = new_registry();
        let metrics = ServerMetrics::new(registry.clone())?;
        metrics.set_build_info(env!("CARGO_PKG_VERSION"));
        server = server.with_metrics(metrics);
        let exporter = MetricsExporter::start(registry, config.metrics.listen).await?;
        info!(address = %exporter.local_addr(), "metrics exporter enabled");
        Some(exporter)
    } else {
        info!("metrics exporter disabled by configuration");
        None
    };

    let run = server.run();
    tokio::pin!(run);
    let outcome = tokio::select! {
        served = &mut run => served,
        () = wait_for_stop(handle.clone(), console) => {
            let (served, sent) = tokio::join!(&mut run, handle.shutdown());
            if let Err(err) = sent {
                warn!(error = %err, "shutdown request not delivered");
            }
            served
        }
    };

    if let Some(exporter) = metrics_server {
        exporter.stop().await?;
    }

    match outcome {
        Ok(()) => {
            info!("daemon stopped");
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "simulation server terminated");
            Err(err.into())
        }
    }
}

/// Resolve on Ctrl-C, or when the console is closed.
async fn wait_for_stop(handle: ServerHandle, console_enabled: bool) {
    let operator = async {
        if !console_enabled {
            return std::future::pending::<()>().await;
        }
        if let Err(err) = console::run(handle).await {
            warn!(error = %err, "console stopped");
        }
    };

    tokio::select! {
        received = signal::ctrl_c() => match received {
            Ok(()) => info!("ctrl-c received; shutting down"),
            Err(err) => warn!(error = %err, "unable to listen for ctrl-c; shutting down"),
        },
        () = operator => info!("console closed; shutting down"),
    }
}
