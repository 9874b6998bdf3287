//! Month-partitioned event log records.
//!
//! Each calendar month gets its own region file, `log_MM_YY.bin`, holding
//! back-to-back 5-byte [`LogEntry`] records.

use core::fmt::Write;

use crate::bus::FileName;
use crate::time::CalendarTime;

/// Bytes per log entry: event code + big-endian epoch.
pub const ENTRY_LEN: usize = 5;

/// One month's region of the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionId {
    /// 1..=12
    pub month: u8,
    /// Two-digit year.
    pub year: u8,
}

impl RegionId {
    pub fn of(time: &CalendarTime) -> Self {
        Self {
            month: time.month,
            year: time.short_year(),
        }
    }

    /// Header bytes of a region that was never set.
    pub fn from_header(month: u8, year: u8) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { month, year })
    }

    pub fn name(&self) -> FileName {
        let mut name = FileName::new();
        // 13 characters always fit.
        let _ = write!(name, "log_{:02}_{:02}.bin", self.month, self.year % 100);
        name
    }
}

/// A single appended event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntry {
    pub code: u8,
    pub epoch: u32,
}

impl LogEntry {
    pub fn encode(&self) -> [u8; ENTRY_LEN] {
        let t = self.epoch.to_be_bytes();
        [self.code, t[0], t[1], t[2], t[3]]
    }
}
