//! Inbound radio opcodes.
//!
//! Every payload byte of a received frame is one opcode. The
//! [`Controller`](super::service::Controller) maps each to an action;
//! bytes that are not listed here are ignored.

/// Commands the coordinator can send to the valve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Stream all unreported log bytes.
    ReportLog = 0x01,
    /// Delete the report region and reset the cursor.
    ClearLog = 0x02,
    OpenValve = 0x11,
    CloseValve = 0x12,
    /// Report the current valve position.
    ReportValve = 0x13,
    /// Report the recorded leak condition.
    ReportLeak = 0x21,
    /// Forget the recorded leak condition.
    ClearLeak = 0x22,
    /// Open the valve and reset every counter.
    ResetSystem = 0x51,
}

impl Opcode {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0x01 => Some(Self::ReportLog),
            0x02 => Some(Self::ClearLog),
            0x11 => Some(Self::OpenValve),
            0x12 => Some(Self::CloseValve),
            0x13 => Some(Self::ReportValve),
            0x21 => Some(Self::ReportLeak),
            0x22 => Some(Self::ClearLeak),
            0x51 => Some(Self::ResetSystem),
            _ => None,
        }
    }
}
