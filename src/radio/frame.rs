//! Inbound API frame parser.
//!
//! The radio delivers an unframed byte stream. A receive frame starts with
//! the `0x7E` delimiter and a length field; nothing else marks its end.
//!
//! ```text
//!  0x7E │ len_hi │ len_lo │ type │ addr64 (8) │ addr16 (2) │ opts │ payload (len - 12) │ cksum
//! ```
//!
//! The checksum byte is consumed but not validated, so a checksum that
//! happens to equal `0x7E` is never mistaken for the next frame.

use core::fmt;

use heapless::Vec;

pub const START_DELIMITER: u8 = 0x7E;
/// API id of a receive-packet frame.
pub const FRAME_TYPE_RX_PACKET: u8 = 0x90;
/// Frame type, addresses and options: the part of `length` that is not payload.
pub const FRAME_HEADER_LEN: u16 = 12;
/// Largest inbound payload accepted.
pub const MAX_INBOUND_PAYLOAD: usize = 128;
/// Bytes examined for a delimiter before the line is treated as idle.
pub const MAX_DELIMITER_SCAN: usize = 256;

/// A parsed receive frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub length: u16,
    pub frame_type: u8,
    pub src_addr64: [u8; 8],
    pub src_addr16: [u8; 2],
    pub options: u8,
    pub payload: Vec<u8, MAX_INBOUND_PAYLOAD>,
}

impl InboundFrame {
    pub fn is_rx_packet(&self) -> bool {
        self.frame_type == FRAME_TYPE_RX_PACKET
    }

    pub fn source(&self) -> u64 {
        u64::from_be_bytes(self.src_addr64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The stream ran dry before the frame was complete.
    Truncated,
    /// Length field too small to hold the frame header.
    InvalidLength(u16),
    /// Payload larger than [`MAX_INBOUND_PAYLOAD`].
    Oversized(u16),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "frame truncated"),
            Self::InvalidLength(len) => write!(f, "invalid frame length {}", len),
            Self::Oversized(len) => write!(f, "frame payload of {} bytes too large", len),
        }
    }
}

/// Read one frame from `next`, which yields bytes until the stream runs dry.
///
/// Returns `Ok(None)` if no delimiter turned up (nothing pending).
pub fn parse_frame(mut next: impl FnMut() -> Option<u8>) -> Result<Option<InboundFrame>, FrameError> {
    let mut found = false;
    for _ in 0..MAX_DELIMITER_SCAN {
        match next() {
            Some(START_DELIMITER) => {
                found = true;
                break;
            }
            Some(_) => {}
            None => return Ok(None),
        }
    }
    if !found {
        return Ok(None);
    }

    let mut byte = || next().ok_or(FrameError::Truncated);

    let length = u16::from_be_bytes([byte()?, byte()?]);
    if length < FRAME_HEADER_LEN {
        return Err(FrameError::InvalidLength(length));
    }
    let payload_len = length - FRAME_HEADER_LEN;
    if usize::from(payload_len) > MAX_INBOUND_PAYLOAD {
        return Err(FrameError::Oversized(payload_len));
    }

    let frame_type = byte()?;
    let mut src_addr64 = [0u8; 8];
    for b in &mut src_addr64 {
        *b = byte()?;
    }
    let src_addr16 = [byte()?, byte()?];
    let options = byte()?;

    let mut payload = Vec::new();
    for _ in 0..payload_len {
        // Capacity checked above.
        let _ = payload.push(byte()?);
    }
    byte()?; // checksum, not validated

    Ok(Some(InboundFrame {
        length,
        frame_type,
        src_addr64,
        src_addr16,
        options,
        payload,
    }))
}
