//! ---
//! sky_section: "05-networking-external-interfaces"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "UDP controls service."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use std::net::SocketAddr;

use skylink_fdm::ControlSurfaces;
use skylink_msg::ControlCommand;
use tokio::net::UdpSocket;
use tracing::{trace, warn};

use crate::{NetError, Result};

const RECV_BUFFER: usize = 256;

/// Receives fire-and-forget control datagrams.
#[derive(Debug)]
pub struct ControlsService {
    socket: UdpSocket,
    buf: [u8; RECV_BUFFER],
}

impl ControlsService {
    /// Bind the controls socket.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| NetError::Bind {
                service: "controls",
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

    /// Wait for the next datagram. Cancel safe.
    pub async fn recv(&mut self) -> std::io::Result<(Vec<u8>, SocketAddr)> {
        let (len, peer) = self.socket.recv_from(&mut self.buf).await?;
        Ok((self.buf[..len].to_vec(), peer))
    }
}

/// Decode and clamp one controls payload. Wrong sizes are logged and dropped.
pub fn decode_controls(datagram: &[u8], source: &str) -> Option<ControlSurfaces> {
    match ControlCommand::decode(datagram) {
        Ok(command) => {
            trace!(source, ?command, "controls received");
            Some(command.into())
        }
        Err(err) => {
            warn!(source, error = %err, "dropping controls message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn receives_and_clamps_controls() -> anyhow::Result<()> {
        let mut service = ControlsService::bind("127.0.0.1:0".parse()?).await?;
        let client = UdpSocket::bind("127.0.0.1:0").await?;

        let command = ControlCommand {
            aileron: 1.5,
            elevator: 0.0,
            rudder: -0.5,
            throttle: -0.2,
        };
        client
            .send_to(&command.encode(), service.local_addr()?)
            .await?;
        let (datagram, peer) = service.recv().await?;
        let surfaces = decode_controls(&datagram, &peer.to_string()).expect("controls");
        assert_eq!(surfaces.aileron, 1.0);
        assert_eq!(surfaces.rudder, -0.5);
        assert_eq!(surfaces.throttle, 0.0);
        Ok(())
    }

    #[test]
    fn wrong_size_is_dropped() {
        assert!(decode_controls(&[0u8; 12], "test").is_none());
    }
}
