//! Interrupt-to-scheduler wake latch.
//!
//! Two edge sources can end a low-power halt: the radio's data-ready line
//! and the water meter's reed switch. The ISR records which one fired and
//! disarms the latch so that no nested wake overwrites it. The scheduler
//! takes the cause once per cycle and re-arms before the next halt.
//!
//! ```text
//! ┌──────────────┐  record()  ┌─────────────┐  take()  ┌────────────────┐
//! │ radio ISR    │───────────▶│             │─────────▶│                │
//! │ meter ISR    │───────────▶│  WakeLatch  │          │ PowerScheduler │
//! └──────────────┘            │ cause+armed │◀─────────│                │
//!                             └─────────────┘  arm()   └────────────────┘
//! ```

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Why the processor left the halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WakeCause {
    /// Sleep timer, or nothing recorded.
    None = 0,
    RadioReady = 1,
    MeterPulse = 2,
}

impl WakeCause {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::RadioReady,
            2 => Self::MeterPulse,
            _ => Self::None,
        }
    }
}

/// Single-writer (ISR) / single-reader (scheduler) wake cell.
pub struct WakeLatch {
    cause: AtomicU8,
    armed: AtomicBool,
}

impl WakeLatch {
    pub const fn new() -> Self {
        Self {
            cause: AtomicU8::new(WakeCause::None as u8),
            armed: AtomicBool::new(false),
        }
    }

    /// Allow the next edge to be recorded.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// ISR side. Only the first edge after [`arm`](Self::arm) is kept.
    /// Returns `true` if this call recorded the cause.
    pub fn record(&self, cause: WakeCause) -> bool {
        if self.armed.swap(false, Ordering::AcqRel) {
            self.cause.store(cause as u8, Ordering::Release);
            true
        } else {
            false
        }
    }

    /// Scheduler side. Returns the recorded cause and resets it to `None`.
    pub fn take(&self) -> WakeCause {
        WakeCause::from_u8(self.cause.swap(WakeCause::None as u8, Ordering::AcqRel))
    }
}

impl Default for WakeLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// The latch the GPIO ISRs write into.
pub static WAKE_LATCH: WakeLatch = WakeLatch::new();

/// Radio data-ready edge. Safe to call from ISR context (lock-free).
pub fn on_radio_ready() -> bool {
    WAKE_LATCH.record(WakeCause::RadioReady)
}

/// Meter reed-switch edge. Safe to call from ISR context (lock-free).
pub fn on_meter_pulse() -> bool {
    WAKE_LATCH.record(WakeCause::MeterPulse)
}
