//! One-shot hardware peripheral initialization.
//!
//! Configures GPIO directions and the two wake interrupts using raw ESP-IDF
//! sys calls. Called once from `main()` before the first cycle. The radio
//! UART is owned by [`XbeeRadio`](crate::adapters::xbee::XbeeRadio).

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicI32, Ordering};

#[cfg(target_os = "espidf")]
use log::{info, warn};

use crate::config::PinMap;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
    WakeConfigFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
            Self::WakeConfigFailed(rc) => write!(f, "sleep wake source config failed (rc={})", rc),
        }
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals(pins: &PinMap) -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the first cycle; single-threaded.
    unsafe {
        init_gpio_inputs(pins)?;
        init_gpio_outputs(pins)?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals(_pins: &PinMap) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

/// Wait `after_ms`, then reboot the chip. Used when start-up cannot
/// continue; a fresh boot retries it.
#[cfg(target_os = "espidf")]
pub fn restart(after_ms: u32) -> ! {
    esp_idf_hal::delay::FreeRtos::delay_ms(after_ms);
    // SAFETY: esp_restart never returns.
    unsafe { esp_restart() }
}

#[cfg(not(target_os = "espidf"))]
pub fn restart(after_ms: u32) -> ! {
    panic!("hw_init(sim): restart requested after {} ms", after_ms);
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs(pins: &PinMap) -> Result<(), HwInitError> {
    // Wake sources and the reset line idle high on internal pull-ups.
    let pulled_up = [pins.radio_alarm, pins.meter_pulse, pins.manual_reset];

    for &pin in &pulled_up {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
    }

    // CTS is driven by the radio.
    let cts_cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins.radio_cts,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&cts_cfg) };
    if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }

    info!("hw_init: GPIO inputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: u8) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin; safe to call from main context.
    (unsafe { gpio_get_level(i32::from(pin)) }) != 0
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: u8) -> bool {
    true
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs(pins: &PinMap) -> Result<(), HwInitError> {
    // (pin, boot level): bridge off, radio asleep, RTS de-asserted.
    let outputs = [
        (pins.valve_enable, 0),
        (pins.valve_control_1, 0),
        (pins.valve_control_2, 0),
        (pins.radio_sleep, 1),
        (pins.radio_rts, 1),
    ];

    for &(pin, level) in &outputs {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
        unsafe { gpio_set_level(i32::from(pin), level) };
    }

    info!("hw_init: GPIO outputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: u8, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin.
    // Main-loop only.
    unsafe { gpio_set_level(i32::from(pin), u32::from(high)); }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: u8, _high: bool) {}

// ── Wake interrupts ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
static RADIO_ALARM_PIN: AtomicI32 = AtomicI32::new(-1);
#[cfg(target_os = "espidf")]
static METER_PIN: AtomicI32 = AtomicI32::new(-1);

/// Mask both wake interrupts. ISR-safe.
#[cfg(target_os = "espidf")]
pub fn disable_wake_interrupts() {
    for pin in [&RADIO_ALARM_PIN, &METER_PIN] {
        let pin = pin.load(Ordering::Relaxed);
        if pin >= 0 {
            // SAFETY: register write on a pin configured in init_isr_service().
            unsafe { gpio_intr_disable(pin) };
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn disable_wake_interrupts() {}

/// Unmask both wake interrupts.
#[cfg(target_os = "espidf")]
pub fn enable_wake_interrupts() {
    for pin in [&RADIO_ALARM_PIN, &METER_PIN] {
        let pin = pin.load(Ordering::Relaxed);
        if pin >= 0 {
            // SAFETY: register write on a pin configured in init_isr_service().
            unsafe { gpio_intr_enable(pin) };
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn enable_wake_interrupts() {}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn radio_alarm_isr(_arg: *mut core::ffi::c_void) {
    crate::events::on_radio_ready();
    disable_wake_interrupts();
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn meter_pulse_isr(_arg: *mut core::ffi::c_void) {
    crate::events::on_meter_pulse();
    disable_wake_interrupts();
}

/// Install the GPIO ISR service, register both wake handlers and let
/// either line pull the chip out of light sleep.
/// Call after init_peripherals() and before the first cycle.
#[cfg(target_os = "espidf")]
pub fn init_isr_service(pins: &PinMap) -> Result<(), HwInitError> {
    let radio = i32::from(pins.radio_alarm);
    let meter = i32::from(pins.meter_pulse);
    RADIO_ALARM_PIN.store(radio, Ordering::Relaxed);
    METER_PIN.store(meter, Ordering::Relaxed);

    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed. The handlers only touch the wake
    // latch atomics and the interrupt-enable registers.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        // Both lines are active low.
        gpio_set_intr_type(radio, gpio_int_type_t_GPIO_INTR_NEGEDGE);
        gpio_isr_handler_add(radio, Some(radio_alarm_isr), core::ptr::null_mut());

        gpio_set_intr_type(meter, gpio_int_type_t_GPIO_INTR_NEGEDGE);
        gpio_isr_handler_add(meter, Some(meter_pulse_isr), core::ptr::null_mut());

        for pin in [radio, meter] {
            let ret = gpio_wakeup_enable(pin, gpio_int_type_t_GPIO_INTR_LOW_LEVEL);
            if ret != ESP_OK as i32 { return Err(HwInitError::WakeConfigFailed(ret)); }
        }
        let ret = esp_sleep_enable_gpio_wakeup();
        if ret != ESP_OK as i32 { return Err(HwInitError::WakeConfigFailed(ret)); }

        info!("hw_init: wake ISRs installed (radio={}, meter={})", radio, meter);
    }
    Ok(())
}

/// Make the meter line wake on its next falling edge, or on the release of
/// a pulse that is still held low.
#[cfg(target_os = "espidf")]
pub fn set_meter_wake_level(on_release: bool) {
    let pin = METER_PIN.load(Ordering::Relaxed);
    if pin < 0 {
        return;
    }
    let (edge, level) = if on_release {
        (gpio_int_type_t_GPIO_INTR_POSEDGE, gpio_int_type_t_GPIO_INTR_HIGH_LEVEL)
    } else {
        (gpio_int_type_t_GPIO_INTR_NEGEDGE, gpio_int_type_t_GPIO_INTR_LOW_LEVEL)
    };
    // SAFETY: pin registered in init_isr_service(); called from the main
    // task with the wake interrupts masked.
    let ret = unsafe {
        gpio_set_intr_type(pin, edge);
        gpio_wakeup_enable(pin, level)
    };
    if ret != ESP_OK as i32 {
        warn!("hw_init: meter wake level change failed (rc={})", ret);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn set_meter_wake_level(_on_release: bool) {}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service(_pins: &PinMap) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}
