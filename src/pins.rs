//! GPIO / peripheral pin assignments for the FlowGuard valve board.
//!
//! Default wiring only. The runtime source of truth is
//! [`PinMap`](crate::config::PinMap) inside `SystemConfig`, which is seeded
//! from these constants.

// ---------------------------------------------------------------------------
// Valve H-bridge
// ---------------------------------------------------------------------------

/// Digital output: HIGH enables the H-bridge driver.
pub const VALVE_ENABLE_GPIO: u8 = 7;
/// Direction line 1. HIGH (with line 2 LOW) drives the valve open.
pub const VALVE_CONTROL_1_GPIO: u8 = 8;
/// Direction line 2. HIGH (with line 1 LOW) drives the valve closed.
pub const VALVE_CONTROL_2_GPIO: u8 = 9;

// ---------------------------------------------------------------------------
// Wake sources (active low, internal pull-ups)
// ---------------------------------------------------------------------------

/// Pulled low by the radio when it has data for us.
pub const RADIO_ALARM_GPIO: u8 = 2;
/// Pulled low by the meter reed switch once per gallon.
pub const METER_PULSE_GPIO: u8 = 3;
/// Manual reset input; held low by the installer to reset the system.
pub const MANUAL_RESET_GPIO: u8 = 6;

// ---------------------------------------------------------------------------
// XBee radio (UART1 + flow control + pin sleep)
// ---------------------------------------------------------------------------

/// Driven low to wake the radio, high to let it sleep.
pub const RADIO_SLEEP_GPIO: u8 = 14;
/// Driven high to stop the radio from sending us data.
pub const RADIO_RTS_GPIO: u8 = 15;
/// Driven high by the radio while it cannot accept data (asleep / busy).
pub const RADIO_CTS_GPIO: u8 = 16;

pub const RADIO_UART_TX_GPIO: u8 = 17;
pub const RADIO_UART_RX_GPIO: u8 = 18;
pub const RADIO_UART_BAUD: u32 = 9_600;
