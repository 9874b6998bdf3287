//! Radio gateway: outbound reports, inbound frames, radio power.
//!
//! ```text
//!  push()/push_time() ──▶ PayloadAccumulator ──flush()──▶ Transceiver::send
//!  Transceiver::poll_byte ──▶ parse_frame ──▶ InboundFrame
//! ```

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::app::ports::{DigitalIo, Transceiver};
use crate::config::SystemConfig;

use super::RadioError;
use super::frame::{FrameError, InboundFrame, parse_frame};
use super::payload::PayloadAccumulator;

pub struct RadioGateway<T> {
    transceiver: T,
    acc: PayloadAccumulator,
    dest: u64,
    byte_wait_ms: u32,
    wake_timeout_ms: u32,
    sleep_pin: u8,
    rts_pin: u8,
    cts_pin: u8,
}

impl<T: Transceiver> RadioGateway<T> {
    pub fn new(transceiver: T, config: &SystemConfig) -> Self {
        Self {
            transceiver,
            acc: PayloadAccumulator::new(),
            dest: config.coordinator_addr,
            byte_wait_ms: config.frame_byte_wait_ms,
            wake_timeout_ms: config.radio_wake_timeout_ms,
            sleep_pin: config.pins.radio_sleep,
            rts_pin: config.pins.radio_rts,
            cts_pin: config.pins.radio_cts,
        }
    }

    pub fn transceiver(&self) -> &T {
        &self.transceiver
    }

    pub fn transceiver_mut(&mut self) -> &mut T {
        &mut self.transceiver
    }

    // ── Outbound ──────────────────────────────────────────────

    pub fn push(&mut self, byte: u8) -> Result<(), RadioError> {
        self.acc.push(byte)
    }

    /// Append a big-endian epoch.
    pub fn push_time(&mut self, epoch: u32) -> Result<(), RadioError> {
        self.acc.extend(&epoch.to_be_bytes())
    }

    pub fn pending(&self) -> usize {
        self.acc.len()
    }

    /// Bytes that still fit in the current payload.
    pub fn room(&self) -> usize {
        self.acc.remaining()
    }

    /// Drop a half-built payload without sending it.
    pub fn discard(&mut self) {
        self.acc.clear();
    }

    /// Send the accumulated bytes to the coordinator. The accumulator is
    /// empty afterwards whether or not the send succeeded.
    pub fn flush(&mut self) -> Result<(), RadioError> {
        if self.acc.is_empty() {
            return Ok(());
        }
        let result = self.transceiver.send(self.dest, self.acc.as_slice());
        let len = self.acc.len();
        self.acc.clear();
        match result {
            Ok(()) => {
                debug!("radio: sent {} bytes", len);
                Ok(())
            }
            Err(e) => {
                warn!("radio: send of {} bytes failed: {:?}", len, e);
                Err(RadioError::SendFailed)
            }
        }
    }

    /// One frame: `code`, the epoch, then `extra`.
    pub fn report(&mut self, code: u8, epoch: u32, extra: &[u8]) -> Result<(), RadioError> {
        let composed = self
            .push(code)
            .and_then(|()| self.push_time(epoch))
            .and_then(|()| self.acc.extend(extra));
        if let Err(e) = composed {
            self.acc.clear();
            return Err(e);
        }
        self.flush()
    }

    // ── Inbound ───────────────────────────────────────────────

    /// Parse the next pending frame. `Ok(None)` when nothing is waiting.
    pub fn receive_frame(&mut self) -> Result<Option<InboundFrame>, FrameError> {
        let wait = self.byte_wait_ms;
        let transceiver = &mut self.transceiver;
        parse_frame(|| transceiver.poll_byte(wait))
    }

    // ── Radio power / flow control ────────────────────────────

    /// Pull the radio out of pin sleep and wait for clear-to-send.
    ///
    /// Gives up after the wake timeout and carries on regardless; returns
    /// whether CTS was seen.
    pub fn wake(&mut self, hw: &mut (impl DigitalIo + DelayNs)) -> bool {
        hw.write(self.sleep_pin, false);
        for _ in 0..self.wake_timeout_ms {
            if !hw.read(self.cts_pin) {
                return true;
            }
            hw.delay_ms(1);
        }
        let ready = !hw.read(self.cts_pin);
        if !ready {
            warn!("radio: no CTS after {} ms", self.wake_timeout_ms);
        }
        ready
    }

    pub fn sleep(&mut self, hw: &mut impl DigitalIo) {
        hw.write(self.sleep_pin, true);
    }

    /// RTS low lets the radio hand us data.
    pub fn set_receive_enabled(&mut self, hw: &mut impl DigitalIo, enabled: bool) {
        hw.write(self.rts_pin, !enabled);
    }
}
