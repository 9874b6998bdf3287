//! XBee API-mode transceiver over UART.
//!
//! Outbound payloads go out as Transmit Request (0x10) frames:
//!
//! ```text
//!  7E │ len_hi len_lo │ 10 │ id │ dest64 (8) │ FF FE │ radius │ opts │ payload… │ cksum
//!     └── length covers type..payload ──┘             checksum = 0xFF - Σ(type..payload)
//! ```
//!
//! - **`target_os = "espidf"`**: [`esp_idf_hal::uart::UartDriver`].
//! - **`not(target_os = "espidf")`**: an in-memory loopback: encoded
//!   frames are recorded, inbound bytes are injected by the caller.

use log::debug;

use crate::app::ports::Transceiver;
use crate::radio::frame::START_DELIMITER;
use crate::radio::payload::MAX_PAYLOAD;

pub const FRAME_TYPE_TX_REQUEST: u8 = 0x10;

/// 16-bit address meaning "unknown, use the 64-bit one".
const UNKNOWN_ADDR16: u16 = 0xFFFE;

/// Type through options: 1 + 1 + 8 + 2 + 1 + 1.
const TX_HEADER_LEN: usize = 14;

/// Largest frame [`encode_tx_request`] produces for a full payload.
pub const TX_FRAME_MAX: usize = 3 + TX_HEADER_LEN + MAX_PAYLOAD + 1;

/// Encode a Transmit Request into `out`. Returns the frame length, or
/// `None` if `out` is too small.
pub fn encode_tx_request(frame_id: u8, dest: u64, payload: &[u8], out: &mut [u8]) -> Option<usize> {
    let body_len = TX_HEADER_LEN + payload.len();
    let total = 3 + body_len + 1;
    let length = u16::try_from(body_len).ok()?;
    if out.len() < total {
        return None;
    }

    out[0] = START_DELIMITER;
    out[1..3].copy_from_slice(&length.to_be_bytes());
    out[3] = FRAME_TYPE_TX_REQUEST;
    out[4] = frame_id;
    out[5..13].copy_from_slice(&dest.to_be_bytes());
    out[13..15].copy_from_slice(&UNKNOWN_ADDR16.to_be_bytes());
    out[15] = 0; // broadcast radius: network maximum
    out[16] = 0; // options
    out[17..17 + payload.len()].copy_from_slice(payload);

    let sum = out[3..3 + body_len]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b));
    out[total - 1] = 0xFF - sum;
    Some(total)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XbeeError {
    /// Payload larger than one frame.
    Oversized(usize),
    /// UART write failed or was short.
    Uart,
}

pub struct XbeeRadio {
    #[cfg(target_os = "espidf")]
    uart: esp_idf_hal::uart::UartDriver<'static>,
    #[cfg(not(target_os = "espidf"))]
    sent: std::vec::Vec<std::vec::Vec<u8>>,
    #[cfg(not(target_os = "espidf"))]
    inbound: std::collections::VecDeque<u8>,
    frame_id: u8,
}

impl XbeeRadio {
    #[cfg(target_os = "espidf")]
    pub fn new(uart: esp_idf_hal::uart::UartDriver<'static>) -> Self {
        Self { uart, frame_id: 0 }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            sent: std::vec::Vec::new(),
            inbound: std::collections::VecDeque::new(),
            frame_id: 0,
        }
    }

    /// Frame ids cycle through 1..=255; 0 would suppress the TX status.
    fn next_frame_id(&mut self) -> u8 {
        self.frame_id = self.frame_id.wrapping_add(1).max(1);
        self.frame_id
    }

    #[cfg(target_os = "espidf")]
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), XbeeError> {
        match self.uart.write(frame) {
            Ok(n) if n == frame.len() => Ok(()),
            _ => Err(XbeeError::Uart),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), XbeeError> {
        self.sent.push(frame.to_vec());
        Ok(())
    }

    /// Queue bytes as if the radio had received them.
    #[cfg(not(target_os = "espidf"))]
    pub fn inject(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes);
    }

    /// Encoded frames written so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sent_frames(&self) -> &[std::vec::Vec<u8>] {
        &self.sent
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for XbeeRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl Transceiver for XbeeRadio {
    type Error = XbeeError;

    fn send(&mut self, dest: u64, payload: &[u8]) -> Result<(), XbeeError> {
        let id = self.next_frame_id();
        let mut buf = [0u8; TX_FRAME_MAX];
        let len = encode_tx_request(id, dest, payload, &mut buf)
            .ok_or(XbeeError::Oversized(payload.len()))?;
        debug!("xbee: tx id={} {} payload bytes", id, payload.len());
        self.write_frame(&buf[..len])
    }

    #[cfg(target_os = "espidf")]
    fn poll_byte(&mut self, wait_ms: u32) -> Option<u8> {
        let ticks = esp_idf_hal::delay::TickType::new_millis(u64::from(wait_ms)).ticks();
        let mut byte = [0u8; 1];
        match self.uart.read(&mut byte, ticks) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn poll_byte(&mut self, _wait_ms: u32) -> Option<u8> {
        self.inbound.pop_front()
    }
}
