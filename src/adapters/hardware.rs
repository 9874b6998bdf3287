//! Hardware adapter: GPIO lines, light sleep and delays behind port traits.
//!
//! Implements [`DigitalIo`], [`LowPower`] and [`DelayNs`] so the
//! [`Controller`](crate::app::service::Controller) drives the valve bridge,
//! the radio control lines and the sleep cycle through one handle. On
//! non-espidf targets line levels live in a map and sleeps are recorded
//! instead of taken.

use embedded_hal::delay::DelayNs;

use crate::app::ports::{DigitalIo, LowPower};
use crate::config::PinMap;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

pub struct HardwareAdapter {
    pins: PinMap,
    /// The meter wake currently waits for the line to go high.
    meter_on_release: bool,
    #[cfg(not(target_os = "espidf"))]
    levels: HashMap<u8, bool>,
    #[cfg(not(target_os = "espidf"))]
    halts: std::vec::Vec<u32>,
    #[cfg(not(target_os = "espidf"))]
    slept_ms: u64,
}

impl HardwareAdapter {
    /// Expects `hw_init::init_peripherals` and `init_isr_service` to have run.
    pub fn new(pins: PinMap) -> Self {
        Self {
            pins,
            meter_on_release: false,
            #[cfg(not(target_os = "espidf"))]
            levels: HashMap::new(),
            #[cfg(not(target_os = "espidf"))]
            halts: std::vec::Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            slept_ms: 0,
        }
    }

    pub fn pins(&self) -> &PinMap {
        &self.pins
    }

    /// Force a line level. Unset lines read high (pull-ups).
    #[cfg(not(target_os = "espidf"))]
    pub fn set_level(&mut self, pin: u8, high: bool) {
        self.levels.insert(pin, high);
    }

    /// Every `halt` timeout requested so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn halts(&self) -> &[u32] {
        &self.halts
    }

    /// Total time spent in naps and delays.
    #[cfg(not(target_os = "espidf"))]
    pub fn slept_ms(&self) -> u64 {
        self.slept_ms
    }

    /// Attribute a GPIO wake to the line at its wake level. Needed when the
    /// edge happened inside light sleep and the ISR never ran.
    #[cfg(target_os = "espidf")]
    fn classify_gpio_wake(&self) {
        use crate::drivers::hw_init::gpio_read;

        if !gpio_read(self.pins.radio_alarm) {
            crate::events::on_radio_ready();
        } else if gpio_read(self.pins.meter_pulse) == self.meter_on_release {
            crate::events::on_meter_pulse();
        }
    }
}

// ── DigitalIo ─────────────────────────────────────────────────

impl DigitalIo for HardwareAdapter {
    #[cfg(target_os = "espidf")]
    fn read(&mut self, pin: u8) -> bool {
        crate::drivers::hw_init::gpio_read(pin)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read(&mut self, pin: u8) -> bool {
        self.levels.get(&pin).copied().unwrap_or(true)
    }

    #[cfg(target_os = "espidf")]
    fn write(&mut self, pin: u8, high: bool) {
        crate::drivers::hw_init::gpio_write(pin, high);
    }

    #[cfg(not(target_os = "espidf"))]
    fn write(&mut self, pin: u8, high: bool) {
        self.levels.insert(pin, high);
    }
}

// ── LowPower ──────────────────────────────────────────────────

impl LowPower for HardwareAdapter {
    #[cfg(target_os = "espidf")]
    fn halt(&mut self, max_ms: u32) {
        use crate::drivers::hw_init::enable_wake_interrupts;
        use esp_idf_svc::sys::*;

        enable_wake_interrupts();
        // SAFETY: sleep configuration and entry from the main task; GPIO
        // wake sources were registered by init_isr_service().
        let cause = unsafe {
            esp_sleep_enable_timer_wakeup(u64::from(max_ms) * 1_000);
            esp_light_sleep_start();
            esp_sleep_get_wakeup_cause()
        };
        if cause == esp_sleep_source_t_ESP_SLEEP_WAKEUP_GPIO {
            self.classify_gpio_wake();
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn halt(&mut self, max_ms: u32) {
        self.halts.push(max_ms);
    }

    #[cfg(target_os = "espidf")]
    fn nap(&mut self, ms: u32) {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn nap(&mut self, ms: u32) {
        self.slept_ms += u64::from(ms);
    }

    fn set_meter_wake(&mut self, on_release: bool) {
        if on_release != self.meter_on_release {
            crate::drivers::hw_init::set_meter_wake_level(on_release);
            self.meter_on_release = on_release;
        }
    }
}

// ── DelayNs ───────────────────────────────────────────────────

impl DelayNs for HardwareAdapter {
    #[cfg(target_os = "espidf")]
    fn delay_ns(&mut self, ns: u32) {
        esp_idf_hal::delay::Ets::delay_us(ns.div_ceil(1_000));
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ns(&mut self, ns: u32) {
        self.slept_ms += u64::from(ns / 1_000_000);
    }

    #[cfg(target_os = "espidf")]
    fn delay_ms(&mut self, ms: u32) {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ms(&mut self, ms: u32) {
        self.slept_ms += u64::from(ms);
    }
}
