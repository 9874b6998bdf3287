//! System configuration parameters
//!
//! All tunable parameters for the FlowGuard controller, passed into the
//! component constructors. Values can be overridden via NVS.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::pins;

/// Board wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinMap {
    pub valve_enable: u8,
    pub valve_control_1: u8,
    pub valve_control_2: u8,
    pub radio_alarm: u8,
    pub meter_pulse: u8,
    pub manual_reset: u8,
    pub radio_sleep: u8,
    pub radio_rts: u8,
    pub radio_cts: u8,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            valve_enable: pins::VALVE_ENABLE_GPIO,
            valve_control_1: pins::VALVE_CONTROL_1_GPIO,
            valve_control_2: pins::VALVE_CONTROL_2_GPIO,
            radio_alarm: pins::RADIO_ALARM_GPIO,
            meter_pulse: pins::METER_PULSE_GPIO,
            manual_reset: pins::MANUAL_RESET_GPIO,
            radio_sleep: pins::RADIO_SLEEP_GPIO,
            radio_rts: pins::RADIO_RTS_GPIO,
            radio_cts: pins::RADIO_CTS_GPIO,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub pins: PinMap,

    // --- Leak detection ---
    /// Gallons in one calendar day that count as a leak.
    pub daily_limit_gallons: u16,
    /// Back-to-back gallons (each within the window) that count as a leak.
    pub consecutive_limit: u8,
    /// Maximum gap between two pulses for them to count as consecutive.
    pub consecutive_window_secs: u32,

    // --- Scheduler ---
    /// Timed wake interval of the low-power halt (milliseconds).
    pub sleep_interval_ms: u32,
    /// Timed wakes between two periodic report-and-clear passes.
    pub idle_cycles_per_report: u8,
    /// Settle time before re-sampling the meter line (milliseconds).
    pub debounce_ms: u32,

    // --- Valve ---
    /// Time the H-bridge is held on so the valve completes its travel.
    pub valve_settle_ms: u32,

    // --- Radio ---
    /// Upper bound on waiting for the radio to signal clear-to-send.
    pub radio_wake_timeout_ms: u32,
    /// Wait for each inbound byte before a parse is abandoned.
    pub frame_byte_wait_ms: u32,
    /// 64-bit destination for every outbound report (0 = coordinator).
    pub coordinator_addr: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            pins: PinMap::default(),

            // Leak detection
            daily_limit_gallons: 1000,
            consecutive_limit: 120, // ~1 GPM for two hours
            consecutive_window_secs: 60,

            // Scheduler
            sleep_interval_ms: 8_000,
            idle_cycles_per_report: 10,
            debounce_ms: 250,

            // Valve
            valve_settle_ms: 5_000,

            // Radio
            radio_wake_timeout_ms: 1_000,
            frame_byte_wait_ms: 20,
            coordinator_addr: 0,
        }
    }
}

impl SystemConfig {
    /// Range-check every field. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.daily_limit_gallons == 0 {
            return Err(ConfigError::ValidationFailed(
                "daily_limit_gallons must be non-zero",
            ));
        }
        if self.consecutive_limit == 0 {
            return Err(ConfigError::ValidationFailed(
                "consecutive_limit must be non-zero",
            ));
        }
        if !(1..=3600).contains(&self.consecutive_window_secs) {
            return Err(ConfigError::ValidationFailed(
                "consecutive_window_secs must be 1–3600",
            ));
        }
        if !(250..=60_000).contains(&self.sleep_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "sleep_interval_ms must be 250–60000",
            ));
        }
        if self.idle_cycles_per_report == 0 {
            return Err(ConfigError::ValidationFailed(
                "idle_cycles_per_report must be non-zero",
            ));
        }
        if self.debounce_ms > 2_000 {
            return Err(ConfigError::ValidationFailed("debounce_ms must be 0–2000"));
        }
        if !(500..=30_000).contains(&self.valve_settle_ms) {
            return Err(ConfigError::ValidationFailed(
                "valve_settle_ms must be 500–30000",
            ));
        }
        if self.radio_wake_timeout_ms > 5_000 {
            return Err(ConfigError::ValidationFailed(
                "radio_wake_timeout_ms must be 0–5000",
            ));
        }
        if !(1..=500).contains(&self.frame_byte_wait_ms) {
            return Err(ConfigError::ValidationFailed(
                "frame_byte_wait_ms must be 1–500",
            ));
        }
        Ok(())
    }
}
