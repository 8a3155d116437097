//! ---
//! sky_section: "05-networking-external-interfaces"
//! sky_subsection: "binary"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Sensor and controls requests against a running gateway."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use indexmap::IndexMap;
use skylink_msg::{ControlCommand, SensorCommand, SensorResponse};
use strum::IntoEnumIterator;
use tokio::net::UdpSocket;
use tokio::runtime::Runtime;

/// Options for a single sensor request.
#[derive(Debug, Args)]
pub struct SensorsArgs {
    /// Sensor group: gps, accelerometer, gyroscope, magnetometer, thermometer,
    /// pitot_tube, static_pressure or ins.
    pub group: SensorCommand,
    /// Sensor service address.
    #[arg(long, default_value = "127.0.0.1:10300")]
    pub target: SocketAddr,
    /// Seconds to wait for the reply.
    #[arg(long, default_value_t = 1.0)]
    pub timeout: f64,
}

/// Control inputs for one datagram.
#[derive(Debug, Args)]
#[command(allow_negative_numbers = true)]
pub struct ControlsArgs {
    pub aileron: f32,
    pub elevator: f32,
    pub rudder: f32,
    pub throttle: f32,
    /// Controls service address.
    #[arg(long, default_value = "127.0.0.1:10301")]
    pub target: SocketAddr,
}

pub fn sensors(args: SensorsArgs) -> Result<()> {
    let wait = Duration::try_from_secs_f64(args.timeout)
        .map_err(|_| anyhow!("timeout must be a non-negative number of seconds"))?;
    let runtime = Runtime::new()?;
    let reply = runtime.block_on(request(args.target, args.group.code(), wait))?;

    let response = SensorResponse::decode(&reply)
        .ok_or_else(|| anyhow!("truncated reply of {} bytes", reply.len()))?;
    if !response.is_ok() {
        let known: Vec<String> = SensorCommand::iter().map(|c| c.to_string()).collect();
        bail!(
            "gateway rejected the {} request (known groups: {})",
            args.group,
            known.join(", ")
        );
    }
    println!("{}", render(args.group, &response)?);
    Ok(())
}

async fn request(target: SocketAddr, code: u8, wait: Duration) -> Result<Vec<u8>> {
    let socket = UdpSocket::bind(local_for(target)).await?;
    socket.send_to(&[code], target).await?;
    let mut buf = [0u8; 512];
    let (len, _) = tokio::time::timeout(wait, socket.recv_from(&mut buf))
        .await
        .with_context(|| format!("no reply from {target} within {wait:?}"))??;
    Ok(buf[..len].to_vec())
}

fn render(group: SensorCommand, response: &SensorResponse) -> Result<String> {
    let values: IndexMap<&str, f32> = group
        .value_names()
        .iter()
        .copied()
        .zip(response.values.iter().copied())
        .collect();
    let mut record = IndexMap::new();
    record.insert("group", serde_json::to_value(group.to_string())?);
    record.insert("values", serde_json::to_value(values)?);
    Ok(serde_json::to_string_pretty(&record)?)
}

pub fn controls(args: ControlsArgs) -> Result<()> {
    let command = ControlCommand {
        aileron: args.aileron,
        elevator: args.elevator,
        rudder: args.rudder,
        throttle: args.throttle,
    };
    let runtime = Runtime::new()?;
    runtime.block_on(async {
        let socket = UdpSocket::bind(local_for(args.target)).await?;
        socket.send_to(&command.encode(), args.target).await?;
        Ok::<_, anyhow::Error>(())
    })?;
    println!(
        "sent aileron={} elevator={} rudder={} throttle={} to {}",
        command.aileron, command.elevator, command.rudder, command.throttle, args.target
    );
    Ok(())
}

fn local_for(target: SocketAddr) -> SocketAddr {
    match target {
        SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
        SocketAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
    }
}
