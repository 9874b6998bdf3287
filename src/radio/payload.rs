//! Outbound payload accumulator.

use heapless::Vec;

use super::RadioError;

/// Largest payload the radio carries in one frame.
pub const MAX_PAYLOAD: usize = 66;

/// Bytes collected for the next outbound frame.
#[derive(Debug, Default)]
pub struct PayloadAccumulator {
    buf: Vec<u8, MAX_PAYLOAD>,
}

impl PayloadAccumulator {
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn push(&mut self, byte: u8) -> Result<(), RadioError> {
        self.buf.push(byte).map_err(|_| RadioError::PayloadFull)
    }

    /// Append all of `bytes`, or none of them.
    pub fn extend(&mut self, bytes: &[u8]) -> Result<(), RadioError> {
        self.buf
            .extend_from_slice(bytes)
            .map_err(|()| RadioError::PayloadFull)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn remaining(&self) -> usize {
        MAX_PAYLOAD - self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
