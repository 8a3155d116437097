//! ---
//! sky_section: "01-core-functionality"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Simulation server loop and control channel."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, ensure};
use skylink_common::AppConfig;
use skylink_core::{CommandReply, ServerError, ServerHandle, SimulationServer, SimulatorCommand};
use skylink_fdm::PropertyTreeFdm;
use skylink_msg::telemetry::{header_line, parse_line};
use skylink_msg::{
    encode_frame, ControlCommand, FdmFrame, FrameDecoder, FrameEvent, FDM_FRAME_LEN,
    TELEMETRY_FIELDS,
};
use tokio::io::{duplex, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::{sleep, timeout};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);
const DT: f64 = 0.01;

fn local() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.simulation.dt = DT;
    config.sensors.listen = local();
    config.controls.listen = local();
    config.fdm_stream.bind = local();
    config.fdm_stream.destinations.clear();
    config.telemetry.listen = local();
    config.telemetry.period = Duration::from_millis(20);
    config.serial.period = Duration::from_millis(20);
    config
}

fn fdm(config: &AppConfig) -> anyhow::Result<PropertyTreeFdm> {
    Ok(PropertyTreeFdm::new(
        config.simulation.dt,
        config.simulation.initial_condition,
    )?)
}

/// Run `client` against a live server, then shut the server down.
async fn drive<F, Fut>(
    server: SimulationServer<PropertyTreeFdm>,
    handle: ServerHandle,
    client: F,
) -> anyhow::Result<()>
where
    F: FnOnce(ServerHandle) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let control = handle.clone();
    let client = async move {
        let outcome = timeout(TEST_TIMEOUT, client(handle)).await;
        let _ = control.shutdown().await;
        outcome?
    };
    let (served, checked) = tokio::join!(server.run(), client);
    checked?;
    served?;
    Ok(())
}

async fn request(socket: &UdpSocket, to: SocketAddr, datagram: &[u8]) -> anyhow::Result<Vec<u8>> {
    socket.send_to(datagram, to).await?;
    let mut buf = [0u8; 512];
    let (len, _) = socket.recv_from(&mut buf).await?;
    Ok(buf[..len].to_vec())
}

#[tokio::test]
async fn sensor_requests_are_answered() -> anyhow::Result<()> {
    let config = test_config();
    let latitude = config.simulation.initial_condition.latitude as f32;
    let (server, handle) = SimulationServer::bind(&config, fdm(&config)?).await?;

    drive(server, handle, |handle| async move {
        let sensors = handle.addrs().sensors;
        let client = UdpSocket::bind(local()).await?;

        let gps = request(&client, sensors, &[0x00]).await?;
        assert_eq!(gps.len(), 22);
        assert_eq!(&gps[..2], &[0x00, 0x00]);
        assert_eq!(&gps[2..6], &latitude.to_be_bytes());

        let ins = request(&client, sensors, &[0x07]).await?;
        assert_eq!(ins.len(), 2 + 7 * 4);
        assert_eq!(ins[1], 0x07);

        assert_eq!(request(&client, sensors, &[0x50]).await?, vec![0xFF]);
        assert_eq!(request(&client, sensors, &[0x00, 0x01]).await?, vec![0xFF]);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn controls_are_clamped_and_streamed() -> anyhow::Result<()> {
    let config = test_config();
    let (server, handle) = SimulationServer::bind(&config, fdm(&config)?).await?;

    drive(server, handle, |handle| async move {
        let receiver = UdpSocket::bind(local()).await?;
        let reply = handle
            .send(SimulatorCommand::AddDestination {
                addr: receiver.local_addr()?,
                period: Duration::from_millis(20),
            })
            .await?;
        assert_eq!(reply, CommandReply::Ok);

        let pilot = UdpSocket::bind(local()).await?;
        let controls = ControlCommand {
            aileron: 2.0,
            elevator: -0.5,
            rudder: 0.0,
            throttle: 1.5,
        };
        pilot.send_to(&controls.encode(), handle.addrs().controls).await?;
        // A short datagram is ignored.
        pilot.send_to(&[0u8; 8], handle.addrs().controls).await?;

        let mut buf = [0u8; 512];
        loop {
            let (len, from) = receiver.recv_from(&mut buf).await?;
            assert_eq!(len, FDM_FRAME_LEN);
            assert_eq!(from, handle.addrs().fdm_stream);
            let frame = FdmFrame::decode(&buf[..len])?;
            if frame.aileron == 1.0 {
                assert_eq!(frame.elevator, -0.5);
                assert_eq!(frame.throttle, 1.0);
                break;
            }
        }
        Ok(())
    })
    .await
}

#[tokio::test]
async fn late_telemetry_client_gets_header_first() -> anyhow::Result<()> {
    let config = test_config();
    let (server, handle) = SimulationServer::bind(&config, fdm(&config)?).await?;

    drive(server, handle, |handle| async move {
        // Let the server broadcast to nobody for a while.
        sleep(Duration::from_millis(60)).await;

        let stream = TcpStream::connect(handle.addrs().telemetry).await?;
        let mut lines = BufReader::new(stream);

        let mut header = String::new();
        lines.read_line(&mut header).await?;
        assert_eq!(header.as_bytes(), header_line()?.as_slice());

        let mut values = String::new();
        lines.read_line(&mut values).await?;
        assert!(values.ends_with("\r\n"));
        let fields = parse_line(&values)?;
        assert_eq!(fields.len(), TELEMETRY_FIELDS.len());
        let time: f64 = fields[0].parse()?;
        assert!(time > 0.0);
        assert_eq!(fields[1].parse::<f64>()?, DT);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn paused_server_steps_on_command() -> anyhow::Result<()> {
    let mut config = test_config();
    config.simulation.start_paused = true;
    let (server, handle) = SimulationServer::bind(&config, fdm(&config)?).await?;

    drive(server, handle, |handle| async move {
        sleep(Duration::from_millis(50)).await;
        let state = handle.status().await?;
        assert!(state.paused);
        assert_eq!(state.simulation_time, 0.0);

        assert_eq!(handle.send(SimulatorCommand::Step).await?, CommandReply::Ok);
        assert_eq!(handle.send(SimulatorCommand::Step).await?, CommandReply::Ok);
        let state = handle.status().await?;
        assert!(state.paused);
        assert!((state.simulation_time - 2.0 * DT).abs() < 1e-9);

        assert_eq!(handle.send(SimulatorCommand::RunFor(0.1)).await?, CommandReply::Ok);
        let state = handle.status().await?;
        assert!(state.paused);
        assert!((state.simulation_time - 12.0 * DT).abs() < 1e-9);

        match handle.send(SimulatorCommand::RunFor(-1.0)).await? {
            CommandReply::Failed(_) => {}
            other => return Err(anyhow!("negative duration accepted: {other:?}")),
        }

        assert_eq!(handle.send(SimulatorCommand::Reset).await?, CommandReply::Ok);
        let state = handle.status().await?;
        assert_eq!(state.simulation_time, 0.0);
        assert!(state.paused);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn running_clock_advances_and_pauses() -> anyhow::Result<()> {
    let config = test_config();
    let (server, handle) = SimulationServer::bind(&config, fdm(&config)?).await?;

    drive(server, handle, |handle| async move {
        sleep(Duration::from_millis(100)).await;
        let running = handle.status().await?;
        assert!(!running.paused);
        assert!(running.simulation_time > 0.0);

        assert_eq!(handle.send(SimulatorCommand::Pause).await?, CommandReply::Ok);
        let frozen = handle.status().await?.simulation_time;
        sleep(Duration::from_millis(60)).await;
        assert_eq!(handle.status().await?.simulation_time, frozen);

        assert_eq!(handle.send(SimulatorCommand::Resume).await?, CommandReply::Ok);
        sleep(Duration::from_millis(60)).await;
        ensure!(handle.status().await?.simulation_time > frozen, "clock did not resume");
        Ok(())
    })
    .await
}

#[tokio::test]
async fn destination_changes_are_validated() -> anyhow::Result<()> {
    let config = test_config();
    let (server, handle) = SimulationServer::bind(&config, fdm(&config)?).await?;

    drive(server, handle, |handle| async move {
        let addr: SocketAddr = "127.0.0.1:9".parse()?;
        assert!(matches!(
            handle.send(SimulatorCommand::RemoveDestination { addr }).await?,
            CommandReply::Failed(_)
        ));
        assert!(matches!(
            handle
                .send(SimulatorCommand::AddDestination {
                    addr,
                    period: Duration::ZERO,
                })
                .await?,
            CommandReply::Failed(_)
        ));
        assert_eq!(
            handle
                .send(SimulatorCommand::AddDestination {
                    addr,
                    period: Duration::from_secs(1),
                })
                .await?,
            CommandReply::Ok
        );
        assert_eq!(
            handle.send(SimulatorCommand::RemoveDestination { addr }).await?,
            CommandReply::Ok
        );
        Ok(())
    })
    .await
}

#[tokio::test]
async fn step_failure_is_fatal() -> anyhow::Result<()> {
    let mut config = test_config();
    config.simulation.start_paused = true;
    let (server, handle) = SimulationServer::bind(&config, fdm(&config)?.fail_after(1)).await?;

    let client = async {
        assert_eq!(handle.send(SimulatorCommand::Step).await?, CommandReply::Ok);
        let reply = handle.send(SimulatorCommand::Step).await?;
        assert!(matches!(reply, CommandReply::Failed(_)));
        // The loop has exited; nobody answers any more.
        assert!(matches!(
            handle.status().await,
            Err(ServerError::ChannelClosed)
        ));
        Ok::<_, anyhow::Error>(())
    };
    let (served, checked) = timeout(TEST_TIMEOUT, async { tokio::join!(server.run(), client) }).await?;
    checked?;
    assert!(matches!(served, Err(ServerError::Fatal(_))));
    Ok(())
}

#[tokio::test]
async fn serial_link_carries_frames_both_ways() -> anyhow::Result<()> {
    let config = test_config();
    let (host, mut device) = duplex(8192);
    let (server, handle) = SimulationServer::bind(&config, fdm(&config)?).await?;
    let server = server.with_serial("duplex", host);

    drive(server, handle, |_handle| async move {
        let controls = ControlCommand {
            aileron: 0.25,
            elevator: 0.0,
            rudder: -3.0,
            throttle: 0.5,
        };
        device.write_all(&encode_frame(&controls.encode())).await?;
        // Corrupted checksum; dropped by the server.
        device.write_all(&[0x7D, 0x01, 0x02, 0x00, 0x7F]).await?;

        let mut decoder = FrameDecoder::new();
        let mut raw = [0u8; 1024];
        'frames: loop {
            let len = device.read(&mut raw).await?;
            ensure!(len > 0, "serial link closed");
            for event in decoder.decode(&raw[..len]) {
                let FrameEvent::FrameReceived(payload) = event else {
                    return Err(anyhow!("server sent a corrupt frame"));
                };
                let frame = FdmFrame::decode(&payload)?;
                if frame.aileron == 0.25 {
                    assert_eq!(frame.rudder, -1.0);
                    assert_eq!(frame.throttle, 0.5);
                    break 'frames;
                }
            }
        }
        Ok(())
    })
    .await
}

#[cfg(unix)]
#[tokio::test]
async fn silent_serial_device_does_not_stall_the_loop() -> anyhow::Result<()> {
    use std::path::Path;

    use anyhow::Context;
    use skylink_net::open_port;
    use tokio_serial::{SerialPort as _, SerialStream};

    let config = test_config();
    let (first, second) = SerialStream::pair()?;
    // The end with a device path is the tty; the other one stays silent and unread.
    let (_silent, pty) = if first.name().is_some() {
        (second, first)
    } else {
        (first, second)
    };
    let path = pty.name().context("pty has a device path")?;
    let port = open_port(Path::new(&path), config.serial.baud_rate)?;
    let (server, handle) = SimulationServer::bind(&config, fdm(&config)?).await?;
    let server = server.with_serial(path, port);

    drive(server, handle, |handle| async move {
        let sensors = handle.addrs().sensors;
        let client = UdpSocket::bind(local()).await?;
        let started = handle.status().await?.simulation_time;

        // Long enough for several serial pushes to queue up unread.
        for _ in 0..25 {
            let reply = timeout(Duration::from_millis(500), request(&client, sensors, &[0x04]))
                .await
                .context("sensor reply while serial device is silent")??;
            assert_eq!(reply.len(), 6);
            sleep(Duration::from_millis(20)).await;
        }

        let state = timeout(Duration::from_millis(500), handle.status())
            .await
            .context("status reply while serial device is silent")??;
        assert!(state.simulation_time > started);
        Ok(())
    })
    .await
}
