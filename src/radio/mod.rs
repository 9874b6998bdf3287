//! Mesh radio protocol layer.
//!
//! - [`payload`]: fixed-capacity outbound accumulator.
//! - [`frame`]: byte-at-a-time inbound frame parser.
//! - [`gateway`]: [`RadioGateway`], which composes both over a
//!   [`Transceiver`](crate::app::ports::Transceiver) and drives the radio's
//!   sleep and flow-control lines.

pub mod frame;
pub mod gateway;
pub mod payload;

use core::fmt;

pub use gateway::RadioGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// The outbound payload would exceed one frame.
    PayloadFull,
    /// The transceiver rejected the frame.
    SendFailed,
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadFull => write!(f, "payload buffer full"),
            Self::SendFailed => write!(f, "send failed"),
        }
    }
}
