//! ---
//! sky_section: "01-core-functionality"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Simulation server loop and control channel."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use skylink_common::AppConfig;
use skylink_fdm::{AircraftReadings, FdmAdapter, SensorNoise};
use skylink_metrics::ServerMetrics;
use skylink_msg::{FdmFrame, FrameEvent, MessagingError};
use skylink_net::controls::decode_controls;
use skylink_net::serial::controls_from_frame;
use skylink_net::{
    ControlsService, FdmStreamer, NetError, SensorService, SerialLink, SerialPort,
    TelemetryBroadcaster, TelemetryListener,
};
use skylink_rt::{ClockError, RateLimiter, Simulator};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::command::{CommandReply, CommandRequest, ServerAddrs, ServerHandle, SimulatorCommand};

const COMMAND_QUEUE: usize = 32;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Net(#[from] NetError),
    #[error("fatal flight dynamics failure: {0}")]
    Fatal(#[from] ClockError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error("invalid sensor noise parameters: {0}")]
    Noise(#[from] rand_distr::NormalError),
    #[error("simulation server is not running")]
    ChannelClosed,
    #[error("unexpected reply from simulation server: {0}")]
    UnexpectedReply(String),
}

type SerialStream = Box<dyn SerialPort>;

/// What the loop does after handling a command.
enum Flow {
    Continue,
    Resumed,
    Stop,
}

/// Owns the simulator and every protocol endpoint.
///
/// Nothing here is shared: [`SimulationServer::run`] borrows fields
/// disjointly inside one `select!` so handlers get exclusive access.
pub struct SimulationServer<F> {
    sim: Simulator<F>,
    noise: Option<SensorNoise>,
    sensors: SensorService,
    controls: ControlsService,
    streamer: FdmStreamer,
    telemetry_listener: TelemetryListener,
    telemetry: TelemetryBroadcaster<TcpStream>,
    telemetry_period: Duration,
    serial: Option<SerialLink<SerialStream>>,
    serial_period: Duration,
    commands: mpsc::Receiver<CommandRequest>,
    metrics: Option<ServerMetrics>,
}

impl<F: FdmAdapter> SimulationServer<F> {
    /// Bind every endpoint named in `config` and wrap `fdm` in a clock.
    pub async fn bind(config: &AppConfig, fdm: F) -> Result<(Self, ServerHandle), ServerError> {
        let sensors = SensorService::bind(config.sensors.listen).await?;
        let controls = ControlsService::bind(config.controls.listen).await?;
        let mut streamer = FdmStreamer::bind(config.fdm_stream.bind).await?;
        let telemetry_listener = TelemetryListener::bind(config.telemetry.listen).await?;

        for destination in &config.fdm_stream.destinations {
            streamer.add_destination(destination.address, destination.period);
        }

        let addrs = ServerAddrs {
            sensors: sensors.local_addr()?,
            controls: controls.local_addr()?,
            fdm_stream: streamer.local_addr()?,
            telemetry: telemetry_listener.local_addr()?,
        };

        let noise = if config.noise.enabled {
            Some(SensorNoise::new(config.noise.seed)?)
        } else {
            None
        };

        let mut sim = Simulator::new(fdm);
        if !config.simulation.start_paused {
            sim.resume();
        }

        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        info!(
            sensors = %addrs.sensors,
            controls = %addrs.controls,
            fdm_stream = %addrs.fdm_stream,
            telemetry = %addrs.telemetry,
            dt = sim.dt(),
            noise = noise.is_some(),
            "simulation server bound"
        );

        let server = Self {
            sim,
            noise,
            sensors,
            controls,
            streamer,
            telemetry_listener,
            telemetry: TelemetryBroadcaster::new(config.telemetry.write_timeout)?,
            telemetry_period: config.telemetry.period,
            serial: None,
            serial_period: config.serial.period,
            commands: rx,
            metrics: None,
        };
        Ok((server, ServerHandle::new(tx, addrs)))
    }

    /// Attach a framed serial link.
    pub fn with_serial<S: SerialPort + 'static>(mut self, name: impl Into<String>, port: S) -> Self {
        let link = SerialLink::new(name, Box::new(port) as SerialStream);
        info!(link = link.name(), period_secs = self.serial_period.as_secs_f64(), "serial link attached");
        self.serial = Some(link);
        self
    }

    pub fn with_metrics(mut self, metrics: ServerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run until a `Shutdown` command or a fatal engine failure.
    pub async fn run(mut self) -> Result<(), ServerError> {
        let mut clock = RateLimiter::new(self.sim.period());
        let mut telemetry_timer = RateLimiter::new(self.telemetry_period);
        let mut serial_timer = RateLimiter::new(self.serial_period);
        let mut commands_open = true;

        info!(running = self.sim.is_running(), "simulation server started");
        loop {
            tokio::select! {
                received = self.sensors.recv() => self.on_sensor_datagram(received).await,
                received = self.controls.recv() => self.on_controls_datagram(received),
                accepted = self.telemetry_listener.accept() => self.on_telemetry_client(accepted),
                _ = clock.tick(), if self.sim.is_running() => self.on_clock_tick()?,
                _ = telemetry_timer.tick() => self.broadcast_telemetry().await,
                _ = self.streamer.wait() => self.push_fdm_frames().await,
                _ = serial_timer.tick(), if self.serial.is_some() => self.push_serial().await,
                frames = read_serial(&mut self.serial), if self.serial.is_some() => self.on_serial_frames(frames),
                request = self.commands.recv(), if commands_open => match request {
                    Some(request) => match self.on_command(request)? {
                        Flow::Continue => {}
                        Flow::Resumed => clock.reset(),
                        Flow::Stop => break,
                    },
                    None => {
                        debug!("all server handles dropped; command channel closed");
                        commands_open = false;
                    }
                },
            }
        }
        info!(simulation_time = self.sim.state().simulation_time, "simulation server stopped");
        Ok(())
    }

    fn readings(&mut self) -> AircraftReadings {
        let mut readings = self.sim.aircraft().readings();
        if let Some(noise) = self.noise.as_mut() {
            noise.apply(&mut readings);
        }
        readings
    }

    fn record_datagram(&self, protocol: &str, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_datagram(protocol, outcome);
        }
    }

    fn record_sent(&self, protocol: &str, count: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.record_sent(protocol, count);
        }
    }

    fn record_steps(&self, steps: u64) {
        if let Some(metrics) = &self.metrics {
            metrics.record_steps(steps, self.sim.state().simulation_time);
        }
    }

    async fn on_sensor_datagram(&mut self, received: io::Result<(Vec<u8>, SocketAddr)>) {
        let (datagram, peer) = match received {
            Ok(received) => received,
            Err(err) => {
                warn!(error = %err, "sensor socket receive failed");
                return;
            }
        };
        let readings = self.readings();
        let outcome = self.sensors.respond(&datagram, peer, &readings).await;
        self.record_datagram("sensors", if outcome.is_ok() { "ok" } else { "error" });
    }

    fn on_controls_datagram(&mut self, received: io::Result<(Vec<u8>, SocketAddr)>) {
        let (datagram, peer) = match received {
            Ok(received) => received,
            Err(err) => {
                warn!(error = %err, "controls socket receive failed");
                return;
            }
        };
        match decode_controls(&datagram, &peer.to_string()) {
            Some(surfaces) => {
                self.sim.apply_controls(surfaces);
                self.record_datagram("controls", "ok");
            }
            None => self.record_datagram("controls", "error"),
        }
    }

    fn on_telemetry_client(&mut self, accepted: io::Result<(TcpStream, SocketAddr)>) {
        match accepted {
            Ok((stream, peer)) => {
                if let Err(err) = stream.set_nodelay(true) {
                    debug!(%peer, error = %err, "could not disable nagle");
                }
                self.telemetry.add_client(peer.to_string(), stream);
                if let Some(metrics) = &self.metrics {
                    metrics.set_telemetry_clients(self.telemetry.client_count());
                }
            }
            Err(err) => warn!(error = %err, "telemetry accept failed"),
        }
    }

    fn on_clock_tick(&mut self) -> Result<(), ServerError> {
        if self.sim.tick()? {
            self.record_steps(1);
        }
        Ok(())
    }

    async fn broadcast_telemetry(&mut self) {
        if self.telemetry.client_count() == 0 {
            return;
        }
        let readings = self.readings();
        match self.telemetry.broadcast(&readings).await {
            Ok(_) => {
                let clients = self.telemetry.client_count();
                self.record_sent("telemetry", clients);
                if let Some(metrics) = &self.metrics {
                    metrics.set_telemetry_clients(clients);
                }
            }
            Err(err) => error!(error = %err, "failed to encode telemetry line"),
        }
    }

    async fn push_fdm_frames(&mut self) {
        let due = self.streamer.take_due(Instant::now());
        if due.is_empty() {
            return;
        }
        let frame = FdmFrame::from_readings(&self.readings());
        let sent = self.streamer.push(&due, &frame).await;
        self.record_sent("fdm_stream", sent);
    }

    async fn push_serial(&mut self) {
        let frame = FdmFrame::from_readings(&self.readings());
        let Some(link) = self.serial.as_mut() else {
            return;
        };
        // A frame cut short here is discarded by the peer at the next START.
        match tokio::time::timeout(self.serial_period, link.send_fdm(&frame)).await {
            Ok(Ok(())) => self.record_sent("serial", 1),
            Ok(Err(err)) => {
                error!(link = link.name(), error = %err, "serial write failed; closing link");
                self.serial = None;
            }
            Err(_) => warn!(link = link.name(), "serial device not draining; frame dropped"),
        }
    }

    fn on_serial_frames(&mut self, frames: io::Result<Option<Vec<FrameEvent>>>) {
        let Some(link) = self.serial.as_ref() else {
            return;
        };
        let name = link.name().to_owned();
        match frames {
            Ok(Some(events)) => {
                for event in events {
                    match controls_from_frame(&name, event) {
                        Some(surfaces) => {
                            self.sim.apply_controls(surfaces);
                            self.record_datagram("serial", "ok");
                        }
                        None => self.record_datagram("serial", "error"),
                    }
                }
            }
            Ok(None) => {
                warn!(link = %name, "serial link reached end of stream; closing");
                self.serial = None;
            }
            Err(err) => {
                error!(link = %name, error = %err, "serial read failed; closing link");
                self.serial = None;
            }
        }
    }

    fn on_command(&mut self, request: CommandRequest) -> Result<Flow, ServerError> {
        let CommandRequest { command, reply } = request;
        debug!(command = command.name(), "server command");
        if let Some(metrics) = &self.metrics {
            metrics.record_command(command.name());
        }

        let mut flow = Flow::Continue;
        let mut fatal = None;
        let response = match command {
            SimulatorCommand::Pause => {
                self.sim.pause();
                CommandReply::Ok
            }
            SimulatorCommand::Resume => {
                self.sim.resume();
                flow = Flow::Resumed;
                CommandReply::Ok
            }
            SimulatorCommand::Reset => {
                if self.sim.reset() {
                    CommandReply::Ok
                } else {
                    CommandReply::Failed("flight dynamics engine failed to reset".into())
                }
            }
            SimulatorCommand::Step => match self.sim.step() {
                Ok(()) => {
                    self.record_steps(1);
                    CommandReply::Ok
                }
                Err(err) => {
                    let reply = CommandReply::Failed(err.to_string());
                    fatal = Some(err);
                    reply
                }
            },
            SimulatorCommand::RunFor(seconds) => match self.sim.run_for(seconds) {
                Ok(steps) => {
                    self.record_steps(steps);
                    CommandReply::Ok
                }
                Err(err @ ClockError::InvalidDuration(_)) => CommandReply::Failed(err.to_string()),
                Err(err) => {
                    let reply = CommandReply::Failed(err.to_string());
                    fatal = Some(err);
                    reply
                }
            },
            SimulatorCommand::Status => CommandReply::Status(self.sim.state()),
            SimulatorCommand::AddDestination { addr, period } => {
                if period.is_zero() {
                    CommandReply::Failed("stream period must be positive".into())
                } else {
                    self.streamer.add_destination(addr, period);
                    CommandReply::Ok
                }
            }
            SimulatorCommand::RemoveDestination { addr } => {
                if self.streamer.remove_destination(&addr) {
                    CommandReply::Ok
                } else {
                    CommandReply::Failed(format!("{addr} is not a stream destination"))
                }
            }
            SimulatorCommand::Shutdown => {
                info!("shutdown requested");
                flow = Flow::Stop;
                CommandReply::Ok
            }
        };

        let _ = reply.send(response);
        match fatal {
            Some(err) => Err(ServerError::Fatal(err)),
            None => Ok(flow),
        }
    }
}

async fn read_serial(
    link: &mut Option<SerialLink<SerialStream>>,
) -> io::Result<Option<Vec<FrameEvent>>> {
    match link.as_mut() {
        Some(link) => link.read_frames().await,
        None => std::future::pending().await,
    }
}
