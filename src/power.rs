//! Sleep/wake scheduling.
//!
//! Each wake runs exactly one cycle:
//!
//! ```text
//!   halt ──▶ take cause ──▶ reset line low? ──yes──▶ ManualReset
//!                                 │no
//!             ┌───────────────────┼─────────────────────┐
//!             ▼ None              ▼ MeterPulse          ▼ RadioReady
//!        idle += 1          nap, re-sample        RadioReady
//!     == N ? PeriodicReport   low and new ? MeterPulse
//!          : Idle                 else : Bounce
//! ```
//!
//! A pulse counts once, on its falling edge. While the line stays low the
//! meter wake is switched to fire on the release instead, so a held line
//! neither re-triggers the wake nor counts again.
//!
//! Every action except [`CycleAction::ManualReset`] and
//! [`CycleAction::Bounce`] is followed by a radio service pass. The cycle
//! ends with the latch re-armed and the processor halted.

use log::{debug, info};

use crate::app::ports::{DigitalIo, LowPower};
use crate::config::SystemConfig;
use crate::events::{WakeCause, WakeLatch};

/// What the current wake cycle has to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleAction {
    /// Reset line held low.
    ManualReset,
    /// Enough timed wakes have passed: report and clear.
    PeriodicReport,
    /// Timed wake with nothing due.
    Idle,
    /// A confirmed gallon pulse.
    MeterPulse,
    /// Meter edge that did not survive the debounce nap.
    Bounce,
    /// The radio signalled pending data.
    RadioReady,
}

impl CycleAction {
    /// Whether the radio gets woken and polled after the action.
    pub fn services_radio(self) -> bool {
        !matches!(self, Self::ManualReset | Self::Bounce)
    }
}

pub struct PowerScheduler {
    latch: &'static WakeLatch,
    idle_cycles: u8,
    idle_threshold: u8,
    sleep_interval_ms: u32,
    debounce_ms: u32,
    meter_pin: u8,
    reset_pin: u8,
    /// A counted pulse whose line has not been released yet.
    meter_held: bool,
}

impl PowerScheduler {
    pub fn new(config: &SystemConfig, latch: &'static WakeLatch) -> Self {
        Self {
            latch,
            idle_cycles: 0,
            idle_threshold: config.idle_cycles_per_report,
            sleep_interval_ms: config.sleep_interval_ms,
            debounce_ms: config.debounce_ms,
            meter_pin: config.pins.meter_pulse,
            reset_pin: config.pins.manual_reset,
            meter_held: false,
        }
    }

    /// Consume the wake cause and decide what this cycle does.
    pub fn begin_cycle(&mut self, hw: &mut (impl DigitalIo + LowPower)) -> CycleAction {
        let cause = self.latch.take();

        if !hw.read(self.reset_pin) {
            info!("power: manual reset asserted");
            return CycleAction::ManualReset;
        }

        if self.meter_held && hw.read(self.meter_pin) {
            debug!("power: meter released");
            self.meter_held = false;
        }

        match cause {
            WakeCause::None => {
                self.idle_cycles = self.idle_cycles.saturating_add(1);
                if self.idle_cycles >= self.idle_threshold {
                    self.idle_cycles = 0;
                    CycleAction::PeriodicReport
                } else {
                    debug!("power: idle wake {}/{}", self.idle_cycles, self.idle_threshold);
                    CycleAction::Idle
                }
            }
            WakeCause::MeterPulse => {
                hw.nap(self.debounce_ms);
                if hw.read(self.meter_pin) {
                    debug!("power: meter bounce");
                    self.meter_held = false;
                    CycleAction::Bounce
                } else if self.meter_held {
                    debug!("power: meter still held");
                    CycleAction::Bounce
                } else {
                    self.meter_held = true;
                    CycleAction::MeterPulse
                }
            }
            WakeCause::RadioReady => CycleAction::RadioReady,
        }
    }

    /// Re-arm both wake sources and halt until one fires or the timer runs out.
    pub fn sleep(&mut self, hw: &mut impl LowPower) {
        hw.set_meter_wake(self.meter_held);
        self.latch.arm();
        hw.halt(self.sleep_interval_ms);
    }

    pub fn idle_cycles(&self) -> u8 {
        self.idle_cycles
    }
}
