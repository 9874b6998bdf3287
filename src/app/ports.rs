//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller (domain)
//! ```
//!
//! Driven adapters (clock chip, storage medium, byte store, GPIO, radio)
//! implement these traits. The [`Controller`](super::service::Controller)
//! consumes them via generics, so the domain core never touches hardware
//! directly.
//!
//! Bounded waits and the valve settle time go through
//! [`embedded_hal::delay::DelayNs`] rather than a port of our own.

use crate::config::SystemConfig;
use crate::time::CalendarTime;

// ───────────────────────────────────────────────────────────────
// Clock device (shared bus)
// ───────────────────────────────────────────────────────────────

/// Calendar clock chip. Shares the peripheral bus with [`StorageMedium`];
/// only the [`PeripheralArbiter`](crate::bus::PeripheralArbiter) calls it.
pub trait ClockDevice {
    /// (Re-)initialise the device after another bus user held the bus.
    fn init(&mut self);

    fn now(&mut self) -> CalendarTime;
}

// ───────────────────────────────────────────────────────────────
// Storage medium (shared bus)
// ───────────────────────────────────────────────────────────────

/// Open mode for a region file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Read,
    Write,
}

/// Removable or flash-backed file storage holding the event log.
///
/// At most one file is open at a time. `write_byte` appends in
/// [`FileMode::Write`]; reads walk forward from the position set by `seek`.
pub trait StorageMedium {
    /// Bring the medium up. Fails with [`StorageError::MediumAbsent`].
    fn begin(&mut self) -> Result<(), StorageError>;

    /// Open `name`, creating it in write mode if it does not exist.
    fn open(&mut self, name: &str, mode: FileMode) -> Result<(), StorageError>;

    /// Next byte of the open file, or `None` at end of file.
    fn read_byte(&mut self) -> Option<u8>;

    fn write_byte(&mut self, byte: u8) -> Result<(), StorageError>;

    /// Move the read position. Returns `false` if `pos` is past the end.
    fn seek(&mut self, pos: u32) -> bool;

    fn close(&mut self);

    fn exists(&mut self, name: &str) -> bool;

    fn remove(&mut self, name: &str) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Byte store (EEPROM-like small state)
// ───────────────────────────────────────────────────────────────

/// Byte-addressable non-volatile memory for the header and rotating blocks.
/// Unwritten cells read as zero.
///
/// Writes may be staged. [`commit`](Self::commit) makes every write since
/// the last commit durable in one step; stores that persist each byte
/// immediately can keep the default.
pub trait ByteStore {
    fn read_byte(&self, addr: u16) -> u8;

    fn write_byte(&mut self, addr: u16, value: u8);

    fn commit(&mut self) {}
}

// ───────────────────────────────────────────────────────────────
// Digital I/O + low power
// ───────────────────────────────────────────────────────────────

/// Plain GPIO level access by pin number.
pub trait DigitalIo {
    /// `true` when the line is high.
    fn read(&mut self, pin: u8) -> bool;

    fn write(&mut self, pin: u8, high: bool);
}

/// Processor sleep states.
pub trait LowPower {
    /// Sleep until an armed wake source fires or `max_ms` elapses.
    fn halt(&mut self, max_ms: u32);

    /// Short bounded nap with wake sources untouched.
    fn nap(&mut self, ms: u32);

    /// Choose the meter line level that wakes the next `halt`: low for a
    /// new pulse, high (`on_release`) while a counted pulse is still held.
    fn set_meter_wake(&mut self, on_release: bool);
}

// ───────────────────────────────────────────────────────────────
// Transceiver
// ───────────────────────────────────────────────────────────────

/// Raw radio driver: addressed send and byte-at-a-time receive.
pub trait Transceiver {
    type Error: core::fmt::Debug;

    /// Send `payload` to the 64-bit address `dest`.
    fn send(&mut self, dest: u64, payload: &[u8]) -> Result<(), Self::Error>;

    /// Next received byte, waiting at most `wait_ms`.
    fn poll_byte(&mut self, wait_ms: u32) -> Option<u8>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StorageMedium`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The medium did not come up.
    MediumAbsent,
    /// A region file could not be opened.
    OpenFailed,
    /// A byte could not be written.
    WriteFailed,
    /// The named region does not exist.
    NotFound,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MediumAbsent => write!(f, "storage medium absent"),
            Self::OpenFailed => write!(f, "file open failed"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::NotFound => write!(f, "file not found"),
        }
    }
}
