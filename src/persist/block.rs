//! Wear-levelled small-state block.
//!
//! The byte store is split into 16 slots of [`BLOCK_LEN`] bytes. Slot 0 is
//! the header; slots 1..=15 take turns holding the live [`RotatingBlock`],
//! selected from the month and year parity so that no cell sees more than
//! one stretch of writes every couple of months.
//!
//! ```text
//!  slot 0 (header)          slot n (block)
//!  ┌────┬────┬───┬───┬───┐  ┌───┬───┬───┬─────┬───┬───┬────────┬────────┐
//!  │cursor│idx│mon│ yy│   │  │vlv│lk │ - │day g│con│dom│ prev   │ last   │
//!  └────┴────┴───┴───┴───┘  └───┴───┴───┴─────┴───┴───┴────────┴────────┘
//!   0  1   2   3   4          0   1   2  3  4   5   6   7..=10   11..=14
//! ```

/// Bytes per slot and per block.
pub const BLOCK_LEN: usize = 15;
/// Slot count, header included.
pub const SLOT_COUNT: usize = 16;
/// Size of the byte store the layout needs.
pub const STORE_LEN: usize = BLOCK_LEN * SLOT_COUNT;

// ── Header offsets (slot 0) ───────────────────────────────────

pub const HDR_CURSOR: u16 = 0;
pub const HDR_ACTIVE_INDEX: u16 = 2;
pub const HDR_REPORT_MONTH: u16 = 3;
pub const HDR_REPORT_YEAR: u16 = 4;

// ── Block field offsets ───────────────────────────────────────

pub const OFF_VALVE: usize = 0;
pub const OFF_LEAK: usize = 1;
pub const OFF_DAY_GALLONS: usize = 3;
pub const OFF_CONSECUTIVE: usize = 5;
pub const OFF_DAY_OF_MONTH: usize = 6;
pub const OFF_PREV_EPOCH: usize = 7;
pub const OFF_LAST_EPOCH: usize = 11;

/// Block slot for a given month and year parity, always in `1..=15`.
pub fn block_index(month: u8, parity: u8) -> u8 {
    let m = u16::from(month.wrapping_sub(1) % 12);
    let p = u16::from(parity & 1);
    1 + ((m + 12 * p) % 15) as u8
}

/// Whether a stored header index points at a block slot.
pub fn is_valid_index(index: u8) -> bool {
    (1..=15).contains(&index)
}

/// Byte-store address of field `offset` within block `index`.
pub fn field_addr(index: u8, offset: usize) -> u16 {
    (usize::from(index) * BLOCK_LEN + offset) as u16
}

/// Valve position as stored in the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValvePosition {
    Closed,
    Open,
}

impl ValvePosition {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
        }
    }

    /// Anything non-zero reads as open.
    pub fn from_u8(raw: u8) -> Self {
        if raw == 0 { Self::Closed } else { Self::Open }
    }
}

/// Valve, leak and flow bookkeeping that must survive power loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RotatingBlock {
    pub valve_position: u8,
    /// 0 = none, otherwise a [`LeakClass`](crate::leak::LeakClass) code.
    pub leak_condition: u8,
    pub day_gallons: u16,
    pub consecutive_gallons: u8,
    pub day_of_month: u8,
    pub prev_pulse_epoch: u32,
    pub last_pulse_epoch: u32,
}

impl RotatingBlock {
    pub fn from_bytes(raw: &[u8; BLOCK_LEN]) -> Self {
        Self {
            valve_position: raw[OFF_VALVE],
            leak_condition: raw[OFF_LEAK],
            day_gallons: u16::from_be_bytes([raw[OFF_DAY_GALLONS], raw[OFF_DAY_GALLONS + 1]]),
            consecutive_gallons: raw[OFF_CONSECUTIVE],
            day_of_month: raw[OFF_DAY_OF_MONTH],
            prev_pulse_epoch: be_u32(raw, OFF_PREV_EPOCH),
            last_pulse_epoch: be_u32(raw, OFF_LAST_EPOCH),
        }
    }

    pub fn to_bytes(&self) -> [u8; BLOCK_LEN] {
        let mut raw = [0u8; BLOCK_LEN];
        raw[OFF_VALVE] = self.valve_position;
        raw[OFF_LEAK] = self.leak_condition;
        raw[OFF_DAY_GALLONS..OFF_DAY_GALLONS + 2].copy_from_slice(&self.day_gallons.to_be_bytes());
        raw[OFF_CONSECUTIVE] = self.consecutive_gallons;
        raw[OFF_DAY_OF_MONTH] = self.day_of_month;
        raw[OFF_PREV_EPOCH..OFF_PREV_EPOCH + 4].copy_from_slice(&self.prev_pulse_epoch.to_be_bytes());
        raw[OFF_LAST_EPOCH..OFF_LAST_EPOCH + 4].copy_from_slice(&self.last_pulse_epoch.to_be_bytes());
        raw
    }

    pub fn valve(&self) -> ValvePosition {
        ValvePosition::from_u8(self.valve_position)
    }
}

fn be_u32(raw: &[u8; BLOCK_LEN], at: usize) -> u32 {
    u32::from_be_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
}
