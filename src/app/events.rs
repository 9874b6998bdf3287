//! Outbound event codes.
//!
//! The same byte leads every radio report and every 5-byte log entry.

/// Events written to the log and reported to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventCode {
    /// End-of-log marker after a non-empty log stream.
    EndOfLog = 0x02,
    /// Nothing to report.
    EmptyLog = 0x03,
    /// One gallon metered.
    GallonPulse = 0x04,
    LogCleared = 0x05,
    ValveOpened = 0x11,
    ValveClosed = 0x12,
    NoLeak = 0x21,
    LeakCleared = 0x22,
    LeakDetected = 0x23,
    SystemReset = 0x51,
}

impl EventCode {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}
