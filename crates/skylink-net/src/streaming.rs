//! ---
//! sky_section: "05-networking-external-interfaces"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Periodic UDP push of flight-model frames."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::time::Duration;

use skylink_msg::FdmFrame;
use skylink_rt::PushSchedule;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{NetError, Result};

/// Pushes [`FdmFrame`] datagrams to a set of destinations, each on its own
/// period.
#[derive(Debug)]
pub struct FdmStreamer {
    socket: UdpSocket,
    schedule: PushSchedule<SocketAddr>,
}

impl FdmStreamer {
    /// Bind the sending socket.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| NetError::Bind {
                service: "fdm stream",
                addr,
                source,
            })?;
        Ok(Self {
            socket,
            schedule: PushSchedule::new(),
        })
    }

    /// Bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Add a destination, or change the period of an existing one.
    pub fn add_destination(&mut self, addr: SocketAddr, period: Duration) {
        let replaced = self.schedule.insert(addr, period, Instant::now());
        info!(destination = %addr, period_secs = period.as_secs_f64(), replaced, "fdm stream destination set");
    }

    /// Stop streaming to `addr`. Returns whether it was registered.
    pub fn remove_destination(&mut self, addr: &SocketAddr) -> bool {
        let removed = self.schedule.remove(addr);
        if removed {
            info!(destination = %addr, "fdm stream destination removed");
        }
        removed
    }

    /// Registered destinations.
    pub fn destinations(&self) -> Vec<SocketAddr> {
        self.schedule.keys().copied().collect()
    }

    /// Resolve when at least one destination is due. Pending while empty.
    pub async fn wait(&self) {
        self.schedule.wait().await
    }

    /// Destinations due at `now`, rescheduled to their next period.
    pub fn take_due(&mut self, now: Instant) -> Vec<SocketAddr> {
        self.schedule.take_due(now)
    }

    /// Send `frame` to each destination. Returns how many sends succeeded.
    pub async fn push(&self, destinations: &[SocketAddr], frame: &FdmFrame) -> usize {
        let datagram = frame.encode();
        let mut sent = 0;
        for addr in destinations {
            match self.socket.send_to(&datagram, addr).await {
                Ok(_) => {
                    sent += 1;
                    debug!(destination = %addr, time = frame.time, "fdm frame sent");
                }
                Err(err) => warn!(destination = %addr, error = %err, "failed to send fdm frame"),
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylink_msg::FDM_FRAME_LEN;

    #[tokio::test]
    async fn streams_frames_to_due_destinations() -> anyhow::Result<()> {
        let mut streamer = FdmStreamer::bind("127.0.0.1:0".parse()?).await?;
        let receiver = UdpSocket::bind("127.0.0.1:0").await?;
        let dest = receiver.local_addr()?;

        streamer.add_destination(dest, Duration::from_millis(10));
        streamer.wait().await;
        let due = streamer.take_due(Instant::now());
        assert_eq!(due, vec![dest]);

        let frame = FdmFrame {
            time: 4.0,
            ..FdmFrame::default()
        };
        assert_eq!(streamer.push(&due, &frame).await, 1);

        let mut buf = [0u8; 128];
        let len = receiver.recv(&mut buf).await?;
        assert_eq!(len, FDM_FRAME_LEN);
        assert_eq!(FdmFrame::decode(&buf[..len])?, frame);
        Ok(())
    }

    #[tokio::test]
    async fn destinations_can_be_replaced_and_removed() -> anyhow::Result<()> {
        let mut streamer = FdmStreamer::bind("127.0.0.1:0".parse()?).await?;
        let dest: SocketAddr = "127.0.0.1:9".parse()?;
        streamer.add_destination(dest, Duration::from_secs(1));
        streamer.add_destination(dest, Duration::from_millis(50));
        assert_eq!(streamer.destinations(), vec![dest]);
        assert!(streamer.remove_destination(&dest));
        assert!(!streamer.remove_destination(&dest));
        assert!(streamer.destinations().is_empty());
        Ok(())
    }
}
