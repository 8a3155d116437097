//! ---
//! sky_section: "05-networking-external-interfaces"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "UDP sensor request/response service."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use std::net::SocketAddr;

use skylink_fdm::AircraftReadings;
use skylink_msg::sensor::handle_request;
use skylink_msg::{SensorCommand, SensorError};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::{NetError, Result};

const RECV_BUFFER: usize = 64;

/// Answers one-byte sensor requests with the current readings.
#[derive(Debug)]
pub struct SensorService {
    socket: UdpSocket,
    buf: [u8; RECV_BUFFER],
}

impl SensorService {
    /// Bind the request socket.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| NetError::Bind {
                service: "sensors",
                addr,
                source,
            })?;
        Ok(Self {
            socket,
            buf: [0u8; RECV_BUFFER],
        })
    }

    /// Bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Wait for the next request datagram. Cancel safe.
    pub async fn recv(&mut self) -> std::io::Result<(Vec<u8>, SocketAddr)> {
        let (len, peer) = self.socket.recv_from(&mut self.buf).await?;
        Ok((self.buf[..len].to_vec(), peer))
    }

    /// Reply to `peer`. Send failures are logged and swallowed.
    pub async fn respond(
        &self,
        datagram: &[u8],
        peer: SocketAddr,
        readings: &AircraftReadings,
    ) -> std::result::Result<SensorCommand, SensorError> {
        let (outcome, reply) = handle_request(datagram, readings);
        match &outcome {
            Ok(command) => debug!(%peer, %command, "sensor request"),
            Err(err) => debug!(%peer, error = %err, "rejected sensor request"),
        }
        if let Err(err) = self.socket.send_to(&reply, peer).await {
            warn!(%peer, error = %err, "failed to send sensor response");
        }
        outcome
    }
}
