//! ---
//! sky_section: "05-networking-external-interfaces"
//! sky_subsection: "binary"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Client utility for probing a running Skylink gateway."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use skylink_common::init_cli_tracing;

mod pilot;
mod watch;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Skylink gateway client utility",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Request one sensor group and print its values")]
    Sensors(pilot::SensorsArgs),
    #[command(about = "Send one set of control inputs")]
    Controls(pilot::ControlsArgs),
    #[command(about = "Follow the TCP telemetry stream")]
    Telemetry(watch::TelemetryArgs),
    #[command(about = "Receive and print FDM stream datagrams")]
    Stream(watch::StreamArgs),
}

fn main() -> Result<()> {
    init_cli_tracing();
    let cli = Cli::parse();
    if cli.version {
        println!("skylinkctl {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    match cli.command {
        Some(Commands::Sensors(args)) => pilot::sensors(args)?,
        Some(Commands::Controls(args)) => pilot::controls(args)?,
        Some(Commands::Telemetry(args)) => watch::telemetry(args)?,
        Some(Commands::Stream(args)) => watch::stream(args)?,
        None => anyhow::bail!("no command given; see --help"),
    }
    Ok(())
}
