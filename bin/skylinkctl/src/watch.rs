//! ---
//! sky_section: "05-networking-external-interfaces"
//! sky_subsection: "binary"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Followers for the telemetry and FDM streams."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use std::net::SocketAddr;

use anyhow::{bail, Result};
use clap::Args;
use indexmap::IndexMap;
use skylink_msg::fdm_frame::FDM_FRAME_FIELD_NAMES;
use skylink_msg::telemetry::parse_line;
use skylink_msg::FdmFrame;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpStream, UdpSocket};
use tokio::runtime::Runtime;

#[derive(Debug, Args)]
pub struct TelemetryArgs {
    /// Telemetry server address.
    #[arg(default_value = "127.0.0.1:10400")]
    pub addr: SocketAddr,
    /// Stop after this many records.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Debug, Args)]
pub struct StreamArgs {
    /// Local address the gateway streams to.
    #[arg(default_value = "127.0.0.1:10302")]
    pub bind: SocketAddr,
    /// Stop after this many frames.
    #[arg(long)]
    pub count: Option<usize>,
}

pub fn telemetry(args: TelemetryArgs) -> Result<()> {
    Runtime::new()?.block_on(follow_telemetry(args))
}

async fn follow_telemetry(args: TelemetryArgs) -> Result<()> {
    let stream = TcpStream::connect(args.addr).await?;
    let mut lines = BufReader::new(stream).lines();

    let Some(header) = lines.next_line().await? else {
        bail!("telemetry server closed before sending a header");
    };
    let header = parse_line(&header)?;

    let mut seen = 0;
    while let Some(line) = lines.next_line().await? {
        let fields = parse_line(&line)?;
        println!("{}", serde_json::to_string(&keyed(&header, &fields))?);
        seen += 1;
        if args.count.is_some_and(|limit| seen >= limit) {
            break;
        }
    }
    Ok(())
}

/// Pair header names with values; numeric fields are emitted as numbers.
fn keyed<'a>(header: &'a [String], fields: &[String]) -> IndexMap<&'a str, serde_json::Value> {
    header
        .iter()
        .zip(fields)
        .map(|(name, raw)| {
            let value = raw
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(raw.clone()));
            (name.as_str(), value)
        })
        .collect()
}

pub fn stream(args: StreamArgs) -> Result<()> {
    Runtime::new()?.block_on(follow_stream(args))
}

async fn follow_stream(args: StreamArgs) -> Result<()> {
    let socket = UdpSocket::bind(args.bind).await?;
    let mut buf = [0u8; 1024];
    let mut seen = 0;
    loop {
        let (len, from) = socket.recv_from(&mut buf).await?;
        let frame = match FdmFrame::decode(&buf[..len]) {
            Ok(frame) => frame,
            Err(err) => {
                eprintln!("ignoring datagram from {from}: {err}");
                continue;
            }
        };
        let record: IndexMap<&str, f32> = FDM_FRAME_FIELD_NAMES
            .iter()
            .copied()
            .zip(frame.values())
            .collect();
        println!("{}", serde_json::to_string(&record)?);
        seen += 1;
        if args.count.is_some_and(|limit| seen >= limit) {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_fields_by_header() {
        let header = vec!["time".to_owned(), "dt".to_owned(), "tag".to_owned()];
        let fields = vec!["1.5".to_owned(), "0".to_owned(), "x".to_owned()];
        let record = keyed(&header, &fields);
        assert_eq!(record["time"], serde_json::json!(1.5));
        assert_eq!(record["dt"], serde_json::json!(0.0));
        assert_eq!(record["tag"], serde_json::json!("x"));
        assert_eq!(record.keys().copied().collect::<Vec<_>>(), ["time", "dt", "tag"]);
    }
}
