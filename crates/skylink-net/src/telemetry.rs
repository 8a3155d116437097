//! ---
//! sky_section: "05-networking-external-interfaces"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "TCP telemetry listener and multi-client fanout."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::time::Duration;

use futures::future::join_all;
use skylink_fdm::AircraftReadings;
use skylink_msg::telemetry::{header_line, TelemetryRow};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::{NetError, Result};

/// Accepts telemetry subscribers.
#[derive(Debug)]
pub struct TelemetryListener {
    listener: TcpListener,
}

impl TelemetryListener {
    /// Bind the TCP listener.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| NetError::Bind {
                service: "telemetry",
                addr,
                source,
            })?;
        Ok(Self { listener })
    }

    /// Bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for the next connection. Cancel safe.
    pub async fn accept(&self) -> std::io::Result<(TcpStream, SocketAddr)> {
        self.listener.accept().await
    }
}

struct TelemetryClient<W> {
    peer: String,
    writer: W,
    header_sent: bool,
}

/// Writes one CSV line per broadcast to every connected client.
///
/// A client gets the header line in the same write as its first values line.
/// Clients whose write fails or exceeds the write timeout are dropped without
/// affecting the rest of the pass.
pub struct TelemetryBroadcaster<W> {
    clients: Vec<TelemetryClient<W>>,
    header: Vec<u8>,
    write_timeout: Duration,
}

impl<W: AsyncWrite + Unpin> TelemetryBroadcaster<W> {
    /// Create an empty broadcaster.
    pub fn new(write_timeout: Duration) -> skylink_msg::Result<Self> {
        Ok(Self {
            clients: Vec::new(),
            header: header_line()?,
            write_timeout,
        })
    }

    /// Register a newly connected client.
    pub fn add_client(&mut self, peer: impl Into<String>, writer: W) {
        let peer = peer.into();
        info!(%peer, clients = self.clients.len() + 1, "telemetry client connected");
        self.clients.push(TelemetryClient {
            peer,
            writer,
            header_sent: false,
        });
    }

    /// Connected client count.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Send the current readings to every client. Returns how many were
    /// dropped during this pass.
    pub async fn broadcast(&mut self, readings: &AircraftReadings) -> skylink_msg::Result<usize> {
        if self.clients.is_empty() {
            return Ok(0);
        }
        let values = TelemetryRow::from_readings(readings).value_line()?;
        let mut with_header = Vec::with_capacity(self.header.len() + values.len());
        with_header.extend_from_slice(&self.header);
        with_header.extend_from_slice(&values);

        let before = self.clients.len();
        let write_timeout = self.write_timeout;
        let writes = self.clients.drain(..).map(|mut client| {
            let payload = if client.header_sent { &values } else { &with_header };
            async move {
                let outcome = tokio::time::timeout(write_timeout, async {
                    client.writer.write_all(payload).await?;
                    client.writer.flush().await
                })
                .await;
                (client, outcome)
            }
        });
        // Writes run concurrently; a pass takes at most one timeout.
        let mut kept = Vec::with_capacity(before);
        for (mut client, outcome) in join_all(writes).await {
            match outcome {
                Ok(Ok(())) => {
                    client.header_sent = true;
                    kept.push(client);
                }
                Ok(Err(err)) => {
                    info!(peer = %client.peer, error = %err, "telemetry client disconnected");
                }
                Err(_) => {
                    warn!(peer = %client.peer, timeout_ms = write_timeout.as_millis() as u64, "telemetry client too slow; dropping");
                }
            }
        }
        self.clients = kept;
        let dropped = before - self.clients.len();
        debug!(clients = self.clients.len(), dropped, "telemetry broadcast");
        Ok(dropped)
    }
}
