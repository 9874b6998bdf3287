//! FlowGuard firmware library.
//!
//! Exposes the domain core and adapters for integration testing. All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module; on the host the adapters fall back to simulation.

#![deny(unused_must_use)]

pub mod app;
pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod leak;
pub mod persist;
pub mod pins;
pub mod power;
pub mod radio;
pub mod time;

pub mod adapters;
pub mod drivers;
