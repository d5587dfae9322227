//! Inbound frame decoding.
//!
//! The lights send bytes encoded as hex text, and one UDP datagram may carry
//! several frames back to back:
//!
//! ```text
//! 4C54 0B 00 30 03 01 02 32 2C 38 19 D268
//! magic len id type kind |--payload--| crc
//! ```
//!
//! `len` counts every byte after the 3-byte header, checksum included. The
//! checksum is CRC-16/XMODEM over everything before it, big endian.
//!
//! Decoding walks the datagram frame by frame and stops for good at the first
//! position that is not a valid frame: short header, wrong magic, a length
//! running past the datagram, or a checksum mismatch. There is no attempt to
//! resynchronise; the lights re-broadcast their status every few seconds.

use crate::constants::{
    CHECKSUM_SIZE, DEVICE_ID_OFFSET, DEVICE_TYPE_OFFSET, HEADER_SIZE, KIND_OFFSET, MAGIC, MIN_DECLARED_LEN, PAYLOAD_OFFSET,
};
use crate::crc::crc16_xmodem;
use crate::hex;
use crate::state::DeviceState;
use bytes::{Buf, Bytes};
use num_enum::{FromPrimitive, IntoPrimitive};
use std::fmt;
use tracing::{debug, trace};

/// Message kind byte at offset 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum MessageKind {
    /// Reply to a set command carrying the field that changed
    SetAcknowledge = 0x02,
    /// Full status, sent periodically and after a hello
    StatusReport = 0x03,
    /// Hello from the app, and the light's reply to it
    Hello = 0x53,
    /// Set command, outbound only
    SetVariable = 0x57,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// A frame whose checksum has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub magic: [u8; 2],
    /// Bytes after the header, checksum included
    pub declared_len: u8,
    pub device_id: u8,
    pub device_type: u8,
    pub kind: MessageKind,
    /// Bytes between the message kind and the checksum
    pub payload: Bytes,
    /// Checksum carried by the frame
    pub checksum: u16,
    /// Checksum computed over the frame's hex text
    pub computed_checksum: u16,
}

impl Frame {
    /// Frame size in bytes, header and checksum included
    pub fn total_len(&self) -> usize {
        HEADER_SIZE + self.declared_len as usize
    }

    pub fn is_valid(&self) -> bool {
        self.checksum == self.computed_checksum
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "len={} id={} type={:#04x} kind={:?} payload={} crc={:04X}",
            self.declared_len,
            self.device_id,
            self.device_type,
            self.kind,
            hex::encode(&self.payload),
            self.checksum
        )
    }
}

/// Iterator over the validated frames in one datagram of hex text.
///
/// The text is decoded to bytes once for header inspection, while checksums
/// are computed over the received text. Both views advance together, one frame
/// at a time.
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    text: &'a [u8],
    bytes: Bytes,
    text_pos: usize,
    byte_pos: usize,
    stopped: bool,
}

/// Iterate over the validated frames in `text`.
pub fn frames(text: &[u8]) -> Frames<'_> {
    Frames {
        text,
        bytes: hex::decode(text),
        text_pos: 0,
        byte_pos: 0,
        stopped: false,
    }
}

impl<'a> Frames<'a> {
    /// Hex text not consumed by a validated frame.
    pub fn remainder(&self) -> &'a [u8] {
        &self.text[self.text_pos..]
    }

    fn stop(&mut self, reason: &str) -> Option<Frame> {
        if self.byte_pos < self.bytes.len() {
            trace!(offset = self.byte_pos, reason, "Stopped decoding datagram");
        }
        self.stopped = true;
        None
    }

    fn next_frame(&mut self) -> Option<Frame> {
        let remaining = self.bytes.len() - self.byte_pos;
        if remaining < HEADER_SIZE {
            return self.stop("short header");
        }

        let mut header = self.bytes.slice(self.byte_pos..self.byte_pos + HEADER_SIZE);
        let mut magic = [0u8; 2];
        header.copy_to_slice(&mut magic);
        if magic != MAGIC {
            return self.stop("bad magic");
        }

        let declared_len = header.get_u8();
        if (declared_len as usize) < MIN_DECLARED_LEN || declared_len as usize > remaining - HEADER_SIZE {
            return self.stop("bad length");
        }

        let total = HEADER_SIZE + declared_len as usize;
        let Some(frame_text) = self.text.get(self.text_pos..self.text_pos + total * 2) else {
            return self.stop("truncated text");
        };
        let computed_checksum = crc16_xmodem(&frame_text[..(total - CHECKSUM_SIZE) * 2]);

        let frame_bytes = self.bytes.slice(self.byte_pos..self.byte_pos + total);
        let checksum = (&frame_bytes[total - CHECKSUM_SIZE..]).get_u16();
        if computed_checksum != checksum {
            debug!("Checksum mismatch ({computed_checksum:04X} vs {checksum:04X}), dropping rest of datagram");
            return self.stop("checksum mismatch");
        }

        self.byte_pos += total;
        self.text_pos += total * 2;

        Some(Frame {
            magic,
            declared_len,
            device_id: frame_bytes[DEVICE_ID_OFFSET],
            device_type: frame_bytes[DEVICE_TYPE_OFFSET],
            kind: MessageKind::from_primitive(frame_bytes[KIND_OFFSET]),
            payload: frame_bytes.slice(PAYLOAD_OFFSET..total - CHECKSUM_SIZE),
            checksum,
            computed_checksum,
        })
    }
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.stopped {
            return None;
        }
        self.next_frame()
    }
}

/// Decode every validated frame in one datagram and fold it into `state`.
///
/// `on_update` runs once per frame that changed the state, before the next
/// frame of the same datagram is looked at. Returns the number of validated
/// frames, whatever their kind.
pub fn process_datagram(text: &[u8], state: &mut DeviceState, mut on_update: impl FnMut(&DeviceState)) -> usize {
    let mut processed = 0;
    for frame in frames(text) {
        processed += 1;
        debug!(%frame, "Light message");
        if state.apply(&frame) {
            debug!(%state, "Status updated");
            on_update(state);
        } else {
            debug!(kind = ?frame.kind, payload = %hex::encode(&frame.payload), "Ignoring message");
        }
    }
    processed
}
