//! FlowGuard firmware entry point.
//!
//! Battery-powered leak shutoff: hexagonal core, one cycle per wake,
//! light sleep in between.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SystemClock   FsStorage       NvsAdapter       XbeeRadio      │
//! │  (Clock)       (StorageMedium) (ByteStore+Cfg)  (Transceiver)  │
//! │  HardwareAdapter (DigitalIo · LowPower · DelayNs)              │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              Controller (pure logic)                   │    │
//! │  │  PersistentLog · LeakDetector · RadioGateway · Valve   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  PowerScheduler (wake latch ← GPIO ISRs, light sleep timer)    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::gpio::Gpio0;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::{UartDriver, config::Config as UartConfig};
use esp_idf_hal::units::Hertz;
use log::{error, info, warn};

use flowguard::adapters::fs_storage::FsStorage;
use flowguard::adapters::hardware::HardwareAdapter;
use flowguard::adapters::nvs::NvsAdapter;
use flowguard::adapters::time::SystemClock;
use flowguard::adapters::xbee::XbeeRadio;
use flowguard::app::ports::ConfigPort;
use flowguard::app::service::Controller;
use flowguard::bus::PeripheralArbiter;
use flowguard::config::SystemConfig;
use flowguard::drivers::hw_init;
use flowguard::error::Error;
use flowguard::events::WAKE_LATCH;
use flowguard::pins;

/// Pause before rebooting after a failed peripheral init.
const INIT_RETRY_MS: u32 = 10_000;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  FlowGuard v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = NvsAdapter::new().map_err(Error::from)?;
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };

    // ── 3. Initialise hardware peripherals ────────────────────
    if let Err(e) = hw_init::init_peripherals(&config.pins) {
        // Without GPIO there is no valve control; reboot and retry.
        error!("HAL init failed: {}, restarting in {} ms", e, INIT_RETRY_MS);
        hw_init::restart(INIT_RETRY_MS);
    }
    if let Err(e) = hw_init::init_isr_service(&config.pins) {
        error!("ISR service init failed: {}, running on timed wakes only", e);
    }

    // ── 4. Radio UART ─────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let uart_config = UartConfig::default().baudrate(Hertz(pins::RADIO_UART_BAUD));
    let uart = UartDriver::new(
        peripherals.uart1,
        peripherals.pins.gpio17,
        peripherals.pins.gpio18,
        Option::<Gpio0>::None,
        Option::<Gpio0>::None,
        &uart_config,
    )?;
    info!("Radio UART up at {} baud", pins::RADIO_UART_BAUD);

    // ── 5. Construct adapters and the controller ──────────────
    let bus = PeripheralArbiter::new(SystemClock::new(), FsStorage::on_flash());
    let hw = HardwareAdapter::new(config.pins);
    let mut controller = Controller::new(
        config,
        bus,
        nvs,
        XbeeRadio::new(uart),
        hw,
        &WAKE_LATCH,
    );
    controller.start();

    // ── 6. Wake cycle ─────────────────────────────────────────
    loop {
        controller.sleep();
        controller.run_cycle();
    }
}
