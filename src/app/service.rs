//! Controller, the hexagonal core.
//!
//! [`Controller`] owns every domain component and the adapters behind
//! them. One call to [`run_cycle`](Controller::run_cycle) handles one wake;
//! [`sleep`](Controller::sleep) re-arms and halts until the next.
//!
//! ```text
//!  ClockDevice ─┐                                  ┌─▶ Transceiver
//!  StorageMedium┼▶ PeripheralArbiter ─┐           │
//!  ByteStore ───┴──▶ PersistentLog ───┼▶ Controller┤
//!                    LeakDetector ────┘     ▲      └─▶ DigitalIo (valve, radio lines)
//!                    PowerScheduler ────────┘
//! ```
//!
//! Nothing in a cycle is fatal. Each action logs its own failure and the
//! next cycle starts clean.

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::bus::PeripheralArbiter;
use crate::config::SystemConfig;
use crate::drivers::valve::ValveActuator;
use crate::error::Result;
use crate::events::WakeLatch;
use crate::leak::{LeakClass, LeakDetector};
use crate::persist::{PersistentLog, ReportMark};
use crate::persist::block::ValvePosition;
use crate::power::{CycleAction, PowerScheduler};
use crate::radio::RadioGateway;

use super::commands::Opcode;
use super::events::EventCode;
use super::ports::{ByteStore, ClockDevice, DigitalIo, LowPower, StorageMedium, Transceiver};

/// Inbound frames handled per wake; the rest wait for the next one.
pub const MAX_FRAMES_PER_CYCLE: usize = 4;

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

pub struct Controller<C, S, E, T, H> {
    config: SystemConfig,
    bus: PeripheralArbiter<C, S>,
    log: PersistentLog<E>,
    radio: RadioGateway<T>,
    valve: ValveActuator,
    detector: LeakDetector,
    scheduler: PowerScheduler,
    hw: H,
}

impl<C, S, E, T, H> Controller<C, S, E, T, H>
where
    C: ClockDevice,
    S: StorageMedium,
    E: ByteStore,
    T: Transceiver,
    H: DigitalIo + LowPower + DelayNs,
{
    /// Wire the components together. Call [`start`](Self::start) next.
    pub fn new(
        config: SystemConfig,
        bus: PeripheralArbiter<C, S>,
        store: E,
        transceiver: T,
        hw: H,
        latch: &'static WakeLatch,
    ) -> Self {
        Self {
            log: PersistentLog::new(store),
            radio: RadioGateway::new(transceiver, &config),
            valve: ValveActuator::new(&config),
            detector: LeakDetector::new(&config),
            scheduler: PowerScheduler::new(&config, latch),
            bus,
            hw,
            config,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load persisted state and put the outputs in their idle levels.
    pub fn start(&mut self) {
        let now = self.bus.now();
        self.log.boot(&now);
        self.valve.release(&mut self.hw);
        self.radio.set_receive_enabled(&mut self.hw, false);
        self.radio.sleep(&mut self.hw);
        info!(
            "controller: started {:04}-{:02}-{:02} {:02}:{:02}:{:02}, valve {:?}, leak {:?}",
            now.year,
            now.month,
            now.day,
            now.hour,
            now.min,
            now.sec,
            self.log.valve(),
            LeakClass::from_code(self.log.leak_condition())
        );
    }

    /// Handle one wake. Returns what the cycle did.
    pub fn run_cycle(&mut self) -> CycleAction {
        let now = self.bus.now();
        self.log.rotate_if_needed(&now);

        let action = self.scheduler.begin_cycle(&mut self.hw);
        debug!("controller: cycle {:?}", action);

        let transmits = matches!(
            action,
            CycleAction::ManualReset | CycleAction::PeriodicReport | CycleAction::MeterPulse
        );
        let radio_on = transmits || action.services_radio();
        if radio_on {
            self.radio.wake(&mut self.hw);
        }

        match action {
            CycleAction::ManualReset => self.reset_system(),
            CycleAction::PeriodicReport => {
                let reported = self.report_log();
                log_failure("report leak", self.report_leak());
                self.clear_if_reported(reported);
            }
            CycleAction::MeterPulse => self.handle_pulse(),
            CycleAction::Idle | CycleAction::Bounce | CycleAction::RadioReady => {}
        }

        if action.services_radio() {
            self.poll_radio();
        }
        if radio_on {
            self.radio.sleep(&mut self.hw);
        }
        self.bus.release();
        action
    }

    /// Re-arm the wake sources and halt.
    pub fn sleep(&mut self) {
        self.scheduler.sleep(&mut self.hw);
    }

    // ── Inbound commands ──────────────────────────────────────

    /// Read and dispatch pending frames with RTS asserted.
    fn poll_radio(&mut self) {
        self.radio.set_receive_enabled(&mut self.hw, true);
        for _ in 0..MAX_FRAMES_PER_CYCLE {
            match self.radio.receive_frame() {
                Ok(Some(frame)) if frame.is_rx_packet() => {
                    debug!(
                        "radio: {} opcode(s) from {:016X}",
                        frame.payload.len(),
                        frame.source()
                    );
                    for &raw in &frame.payload {
                        self.handle_opcode(raw);
                    }
                }
                Ok(Some(frame)) => {
                    debug!("radio: dropping frame type 0x{:02X}", frame.frame_type);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("radio: {}", e);
                    break;
                }
            }
        }
        self.radio.set_receive_enabled(&mut self.hw, false);
    }

    /// Run the action for one opcode byte. Unknown bytes are ignored.
    pub fn handle_opcode(&mut self, raw: u8) {
        let Some(op) = Opcode::from_u8(raw) else {
            debug!("controller: ignoring opcode 0x{:02X}", raw);
            return;
        };
        info!("controller: {:?}", op);
        match op {
            Opcode::ResetSystem => self.reset_system(),
            Opcode::CloseValve => log_failure("close valve", self.set_valve(ValvePosition::Closed)),
            Opcode::OpenValve => log_failure("open valve", self.set_valve(ValvePosition::Open)),
            Opcode::ReportLeak => log_failure("report leak", self.report_leak()),
            Opcode::ReportValve => log_failure("report valve", self.report_valve()),
            Opcode::ReportLog => log_failure("report log", self.report_log()),
            Opcode::ClearLog => log_failure("clear log", self.clear_log()),
            Opcode::ClearLeak => log_failure("clear leak", self.clear_leak()),
        }
    }

    // ── Actions ───────────────────────────────────────────────

    /// Log a gallon and react if it completes a leak pattern.
    fn handle_pulse(&mut self) {
        self.record(EventCode::GallonPulse);

        let now = self.bus.now();
        let mut block = self.log.block();
        let recorded = block.leak_condition;
        let class = self.detector.evaluate(&mut block, &now);
        self.log.store_block(&block);

        if class == LeakClass::None || recorded != 0 {
            return;
        }
        warn!("controller: leak detected ({:?}), closing valve", class);
        self.log.set_leak_condition(class.code());
        self.record(EventCode::LeakDetected);
        log_failure("close valve", self.set_valve(ValvePosition::Closed));
        let reported = self.report_log();
        log_failure("report leak", self.report_leak());
        self.clear_if_reported(reported);
    }

    /// Clear the log only once its contents reached the gateway.
    fn clear_if_reported(&mut self, reported: Result<()>) {
        match reported {
            Ok(()) => log_failure("clear log", self.clear_log()),
            Err(e) => warn!("controller: report log failed, keeping log: {}", e),
        }
    }

    /// Drive the valve, persist the position, log and report it.
    pub fn set_valve(&mut self, target: ValvePosition) -> Result<()> {
        self.valve.drive(target, &mut self.hw);
        self.log.set_valve(target);
        let code = valve_event(target);
        let epoch = self.record(code);
        self.radio.report(code.as_u8(), epoch, &[])?;
        Ok(())
    }

    /// Open the valve, clear the log and every counter.
    pub fn reset_system(&mut self) {
        log_failure("open valve", self.set_valve(ValvePosition::Open));
        log_failure("clear log", self.clear_log());
        self.log.reset_counters();
        let epoch = self.bus.now().to_epoch();
        log_failure(
            "report reset",
            self.radio
                .report(EventCode::SystemReset.as_u8(), epoch, &[])
                .map_err(Into::into),
        );
        self.record(EventCode::SystemReset);
    }

    pub fn report_leak(&mut self) -> Result<()> {
        let condition = self.log.leak_condition();
        let epoch = self.bus.now().to_epoch();
        if condition == 0 {
            self.radio.report(EventCode::NoLeak.as_u8(), epoch, &[])?;
        } else {
            self.radio
                .report(EventCode::LeakDetected.as_u8(), epoch, &[condition])?;
        }
        Ok(())
    }

    pub fn report_valve(&mut self) -> Result<()> {
        let code = valve_event(self.log.valve());
        let epoch = self.bus.now().to_epoch();
        self.radio.report(code.as_u8(), epoch, &[])?;
        Ok(())
    }

    /// Stream every unreported log byte in full frames, then an end marker.
    /// An empty log is answered with a single empty-log report.
    ///
    /// The report position only advances past bytes whose frame was sent.
    pub fn report_log(&mut self) -> Result<()> {
        let streamed = self.stream_log();
        let (total, mut mark) = match streamed {
            Ok(done) => done,
            Err(e) => {
                self.radio.discard();
                return Err(e);
            }
        };

        if total == 0 {
            let epoch = self.bus.now().to_epoch();
            self.radio.report(EventCode::EmptyLog.as_u8(), epoch, &[])?;
        } else {
            self.radio.push(EventCode::EndOfLog.as_u8())?;
            self.radio.flush()?;
            info!("controller: reported {} log bytes", total);
        }
        self.log.commit_report(&mut self.bus, &mut mark);
        Ok(())
    }

    fn stream_log(&mut self) -> Result<(usize, ReportMark)> {
        let mut mark = self.log.report_mark(&mut self.bus);
        let mut total = 0;
        loop {
            let room = self.radio.room();
            let radio = &mut self.radio;
            let n = self.log.stream_unreported(&mut self.bus, &mut mark, room, |b| {
                // Never more than `room` bytes.
                let _ = radio.push(b);
            })?;
            total += n;
            if n < room {
                return Ok((total, mark));
            }
            self.radio.flush()?;
            self.log.commit_report(&mut self.bus, &mut mark);
        }
    }

    pub fn clear_log(&mut self) -> Result<()> {
        self.log.clear(&mut self.bus)?;
        let epoch = self.bus.now().to_epoch();
        self.radio.report(EventCode::LogCleared.as_u8(), epoch, &[])?;
        Ok(())
    }

    pub fn clear_leak(&mut self) -> Result<()> {
        self.log.set_leak_condition(0);
        let epoch = self.bus.now().to_epoch();
        self.radio.report(EventCode::LeakCleared.as_u8(), epoch, &[])?;
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn persist(&self) -> &PersistentLog<E> {
        &self.log
    }

    pub fn radio(&self) -> &RadioGateway<T> {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut RadioGateway<T> {
        &mut self.radio
    }

    pub fn bus_mut(&mut self) -> &mut PeripheralArbiter<C, S> {
        &mut self.bus
    }

    pub fn hw(&self) -> &H {
        &self.hw
    }

    pub fn hw_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    // ── Internal ──────────────────────────────────────────────

    /// Append a log entry. A storage failure is logged and the current
    /// time returned anyway so the radio report still goes out.
    fn record(&mut self, code: EventCode) -> u32 {
        match self.log.append(&mut self.bus, code.as_u8()) {
            Ok(epoch) => epoch,
            Err(e) => {
                warn!("controller: log 0x{:02X} failed: {}", code.as_u8(), e);
                self.bus.release();
                self.bus.now().to_epoch()
            }
        }
    }
}

fn valve_event(position: ValvePosition) -> EventCode {
    match position {
        ValvePosition::Open => EventCode::ValveOpened,
        ValvePosition::Closed => EventCode::ValveClosed,
    }
}

fn log_failure(what: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!("controller: {} failed: {}", what, e);
    }
}
