//! Unified error types for the FlowGuard firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! boot-time and top-level handling uniform. All variants are `Copy`.

use core::fmt;

pub use crate::app::ports::{ConfigError, StorageError};
pub use crate::radio::RadioError;
pub use crate::radio::frame::FrameError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The storage medium or a log region could not be used.
    Storage(StorageError),
    /// An outbound report could not be assembled or sent.
    Radio(RadioError),
    /// An inbound frame could not be parsed.
    Frame(FrameError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Radio(e) => write!(f, "radio: {e}"),
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl core::error::Error for Error {}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
