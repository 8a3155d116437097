//! ---
//! sky_section: "04-wire-protocols"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Byte-stuffed, checksummed framing for the serial link."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
//! Frames look like `START, escape(payload ++ checksum), END`.
//!
//! Any `START`, `ESCAPE` or `END` byte inside the body is sent as `ESCAPE`
//! followed by the byte XOR `ESCAPE`.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{trace, warn};

/// Opens a frame.
pub const START: u8 = 0x7D;
/// Precedes an escaped byte.
pub const ESCAPE: u8 = 0x7E;
/// Closes a frame.
pub const END: u8 = 0x7F;

/// Largest raw frame the decoder buffers before giving up on it.
pub const MAX_FRAME_LEN: usize = 1024;

fn is_flag(byte: u8) -> bool {
    matches!(byte, START | ESCAPE | END)
}

/// 8-bit additive checksum with end-around carry.
pub fn checksum(payload: &[u8]) -> u8 {
    let mut acc: u32 = 0;
    for &byte in payload {
        acc += u32::from(byte);
        acc += acc >> 8;
        acc &= 0xFF;
    }
    acc as u8
}

/// Stuff every flag byte in `data`.
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 4);
    for &byte in data {
        if is_flag(byte) {
            out.push(ESCAPE);
            out.push(byte ^ ESCAPE);
        } else {
            out.push(byte);
        }
    }
    out
}

/// Reverse [`escape`]. A dangling trailing `ESCAPE` is dropped.
pub fn unescape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut bytes = data.iter().copied();
    while let Some(byte) = bytes.next() {
        if byte == ESCAPE {
            if let Some(next) = bytes.next() {
                out.push(next ^ ESCAPE);
            }
        } else {
            out.push(byte);
        }
    }
    out
}

/// Build a complete frame around `payload`.
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let mut body = Vec::with_capacity(payload.len() + 1);
    body.extend_from_slice(payload);
    body.push(checksum(payload));

    let stuffed = escape(&body);
    let mut frame = BytesMut::with_capacity(stuffed.len() + 2);
    frame.put_u8(START);
    frame.put_slice(&stuffed);
    frame.put_u8(END);
    frame.freeze()
}

/// Outcome of a completed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// Checksum matched; carries the payload.
    FrameReceived(Vec<u8>),
    /// Checksum mismatched; carries the payload for diagnostics.
    InvalidFrame(Vec<u8>),
}

/// Decoder states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderState {
    /// Waiting for `START`.
    #[default]
    Ready,
    /// Inside a frame.
    Receiving,
    /// Inside a frame, right after `ESCAPE`.
    ReceivingEscaped,
}

/// Streaming frame decoder fed one byte at a time.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: DecoderState,
    buffer: Vec<u8>,
    max_len: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Decoder bounded at [`MAX_FRAME_LEN`].
    pub fn new() -> Self {
        Self::with_max_len(MAX_FRAME_LEN)
    }

    /// Decoder bounded at `max_len` raw bytes per frame.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            state: DecoderState::Ready,
            buffer: Vec::new(),
            max_len,
        }
    }

    /// Current state.
    pub fn state(&self) -> DecoderState {
        self.state
    }

    fn start_frame(&mut self) {
        self.buffer.clear();
        self.buffer.push(START);
        self.state = DecoderState::Receiving;
    }

    fn abort(&mut self) {
        self.buffer.clear();
        self.state = DecoderState::Ready;
    }

    fn append(&mut self, byte: u8, next: DecoderState) {
        if self.buffer.len() >= self.max_len {
            warn!(limit = self.max_len, "serial frame exceeds buffer limit; dropping");
            self.abort();
            return;
        }
        self.buffer.push(byte);
        self.state = next;
    }

    /// Feed one byte; returns an event when it completes a frame.
    pub fn push(&mut self, byte: u8) -> Option<FrameEvent> {
        use DecoderState::*;

        match (self.state, byte) {
            (Ready, START) => self.start_frame(),
            (Ready, _) => {}
            (Receiving, ESCAPE) => self.append(byte, ReceivingEscaped),
            (Receiving, START) => {
                trace!(discarded = self.buffer.len(), "frame restarted");
                self.start_frame();
            }
            (Receiving, END) => {
                let raw = std::mem::take(&mut self.buffer);
                self.state = Ready;
                return validate(&raw);
            }
            (Receiving, _) => self.append(byte, Receiving),
            (ReceivingEscaped, b) if is_flag(b) => {
                warn!(byte = b, "malformed escape sequence; frame dropped");
                self.abort();
            }
            (ReceivingEscaped, _) => self.append(byte, Receiving),
        }
        None
    }

    /// Feed a chunk, collecting every completed frame.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<FrameEvent> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }
}

/// Check a raw `START..END` frame.
fn validate(raw: &[u8]) -> Option<FrameEvent> {
    if raw.len() < 3 {
        return None;
    }
    let mut body = unescape(&raw[1..raw.len() - 1]);
    let received = body.pop()?;
    if body.is_empty() {
        return None;
    }
    if checksum(&body) == received {
        Some(FrameEvent::FrameReceived(body))
    } else {
        Some(FrameEvent::InvalidFrame(body))
    }
}
