//! Leak classification from metered pulses.
//!
//! Two patterns count as a leak:
//!
//! - **Daily excess**: the gallons metered since midnight reach the daily
//!   limit.
//! - **Duration excess**: a run of pulses, each no more than the window
//!   apart, reaches the consecutive limit (a tap left running).
//!
//! Each flag fires on the pulse that *reaches* its limit, not on every
//! pulse past it, so a long leak is reported once.

use crate::config::SystemConfig;
use crate::persist::block::RotatingBlock;
use crate::time::CalendarTime;

/// Result of evaluating one pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeakClass {
    None,
    DailyExcess,
    DurationExcess,
}

impl LeakClass {
    /// Value stored in the block's leak-condition byte and sent in reports.
    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::DailyExcess => 1,
            Self::DurationExcess => 2,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::DailyExcess,
            2 => Self::DurationExcess,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LeakDetector {
    daily_limit: u16,
    consecutive_limit: u8,
    window_secs: u32,
}

impl LeakDetector {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            daily_limit: config.daily_limit_gallons,
            consecutive_limit: config.consecutive_limit,
            window_secs: config.consecutive_window_secs,
        }
    }

    /// Fold one confirmed pulse at `now` into `block` and classify it.
    pub fn evaluate(&self, block: &mut RotatingBlock, now: &CalendarTime) -> LeakClass {
        // Day total
        if block.day_of_month != now.day {
            block.day_of_month = now.day;
            block.day_gallons = 0;
        }
        block.day_gallons = block.day_gallons.saturating_add(1);
        let daily = block.day_gallons == self.daily_limit;

        // Consecutive run; a clock that went backwards counts as a gap.
        let epoch = now.to_epoch();
        let within_window = epoch
            .checked_sub(block.last_pulse_epoch)
            .is_some_and(|elapsed| elapsed <= self.window_secs);
        let duration = if within_window {
            block.consecutive_gallons = block.consecutive_gallons.saturating_add(1);
            block.consecutive_gallons == self.consecutive_limit
        } else {
            block.consecutive_gallons = 0;
            false
        };

        block.prev_pulse_epoch = block.last_pulse_epoch;
        block.last_pulse_epoch = epoch;

        if daily {
            LeakClass::DailyExcess
        } else if duration {
            LeakClass::DurationExcess
        } else {
            LeakClass::None
        }
    }
}
