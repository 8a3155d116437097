//! ---
//! sky_section: "05-networking-external-interfaces"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Framed serial link carrying FDM frames out and controls in."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use std::path::Path;

use skylink_fdm::ControlSurfaces;
use skylink_msg::{encode_frame, FdmFrame, FrameDecoder, FrameEvent};
use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info, warn};

use crate::controls::decode_controls;
use crate::{NetError, Result};

const READ_CHUNK: usize = 256;

/// Byte streams a [`SerialLink`] can run over.
pub trait SerialPort: AsyncRead + AsyncWrite + Unpin {}

impl<T: AsyncRead + AsyncWrite + Unpin + ?Sized> SerialPort for T {}

/// Open `device` as a raw 8N1 tty at `baud_rate`, registered with the reactor.
///
/// Must be called from inside a tokio runtime.
pub fn open_port(device: &Path, baud_rate: u32) -> Result<SerialStream> {
    let name = device.to_string_lossy();
    let port = tokio_serial::new(name.as_ref(), baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|source| NetError::Serial {
            device: name.to_string(),
            source,
        })?;
    info!(device = %name, baud_rate, "serial device opened");
    Ok(port)
}

/// Point-to-point framed link over a tty or any other async byte stream.
pub struct SerialLink<T> {
    name: String,
    reader: ReadHalf<T>,
    writer: WriteHalf<T>,
    decoder: FrameDecoder,
    buf: [u8; READ_CHUNK],
}

impl<T: AsyncRead + AsyncWrite> SerialLink<T> {
    /// Wrap a byte stream; `name` labels log lines.
    pub fn new(name: impl Into<String>, stream: T) -> Self {
        let (reader, writer) = split(stream);
        Self {
            name: name.into(),
            reader,
            writer,
            decoder: FrameDecoder::new(),
            buf: [0u8; READ_CHUNK],
        }
    }

    /// Link label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the next chunk and return every frame it completes. `Ok(None)`
    /// signals end of stream. Cancel safe.
    pub async fn read_frames(&mut self) -> std::io::Result<Option<Vec<FrameEvent>>> {
        let len = self.reader.read(&mut self.buf).await?;
        if len == 0 {
            return Ok(None);
        }
        Ok(Some(self.decoder.decode(&self.buf[..len])))
    }

    /// Frame and write one FDM snapshot.
    pub async fn send_fdm(&mut self, frame: &FdmFrame) -> std::io::Result<()> {
        let bytes = encode_frame(&frame.encode());
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await
    }
}

/// Map a decoded frame to control inputs; invalid and wrong-size frames are
/// logged and dropped.
pub fn controls_from_frame(link: &str, event: FrameEvent) -> Option<ControlSurfaces> {
    match event {
        FrameEvent::FrameReceived(payload) => decode_controls(&payload, link),
        FrameEvent::InvalidFrame(payload) => {
            warn!(link, len = payload.len(), "serial frame failed checksum");
            None
        }
    }
}

impl<T> Drop for SerialLink<T> {
    fn drop(&mut self) {
        debug!(link = %self.name, "serial link closed");
    }
}
