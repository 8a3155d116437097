//! ---
//! sky_section: "01-core-functionality"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Simulation server loop and control channel."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::time::Duration;

use serde::Serialize;
use skylink_rt::ClockState;
use tokio::sync::{mpsc, oneshot};

use crate::server::ServerError;

/// Requests an embedding process can make of a running server.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulatorCommand {
    Pause,
    Resume,
    Reset,
    Step,
    RunFor(f64),
    Status,
    AddDestination { addr: SocketAddr, period: Duration },
    RemoveDestination { addr: SocketAddr },
    Shutdown,
}

impl SimulatorCommand {
    /// Short name used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Reset => "reset",
            Self::Step => "step",
            Self::RunFor(_) => "run_for",
            Self::Status => "status",
            Self::AddDestination { .. } => "add_destination",
            Self::RemoveDestination { .. } => "remove_destination",
            Self::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum CommandReply {
    Ok,
    Failed(String),
    Status(ClockState),
}

#[derive(Debug)]
pub(crate) struct CommandRequest {
    pub(crate) command: SimulatorCommand,
    pub(crate) reply: oneshot::Sender<CommandReply>,
}

/// Bound addresses of the server's endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerAddrs {
    pub sensors: SocketAddr,
    pub controls: SocketAddr,
    pub fdm_stream: SocketAddr,
    pub telemetry: SocketAddr,
}

/// Cloneable front door to a running [`crate::SimulationServer`].
#[derive(Debug, Clone)]
pub struct ServerHandle {
    commands: mpsc::Sender<CommandRequest>,
    addrs: ServerAddrs,
}

impl ServerHandle {
    pub(crate) fn new(commands: mpsc::Sender<CommandRequest>, addrs: ServerAddrs) -> Self {
        Self { commands, addrs }
    }

    pub fn addrs(&self) -> ServerAddrs {
        self.addrs
    }

    /// Issue a command and wait for its reply.
    pub async fn send(&self, command: SimulatorCommand) -> Result<CommandReply, ServerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(CommandRequest { command, reply })
            .await
            .map_err(|_| ServerError::ChannelClosed)?;
        response.await.map_err(|_| ServerError::ChannelClosed)
    }

    pub async fn status(&self) -> Result<ClockState, ServerError> {
        match self.send(SimulatorCommand::Status).await? {
            CommandReply::Status(state) => Ok(state),
            other => Err(ServerError::UnexpectedReply(format!("{other:?}"))),
        }
    }

    pub async fn shutdown(&self) -> Result<(), ServerError> {
        self.send(SimulatorCommand::Shutdown).await.map(|_| ())
    }
}
