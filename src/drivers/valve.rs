//! Motorized ball-valve driver (H-bridge, two direction lines + enable).
//!
//! The valve has no position feedback; it is driven for a fixed settle time
//! and then de-energised. Position bookkeeping lives in the block, not here.
//!
//! ## Sequencing
//!
//! ```text
//!            open         close
//!  enable    ▔▔▔▔▔╲__     ▔▔▔▔▔╲__
//!  ctrl 1    ▔▔▔▔▔╲__     ________
//!  ctrl 2    ________     ▔▔▔▔▔╲__
//!            │settle│     │settle│
//! ```

use embedded_hal::delay::DelayNs;
use log::info;

use crate::app::ports::DigitalIo;
use crate::config::SystemConfig;
use crate::persist::block::ValvePosition;

pub struct ValveActuator {
    enable_pin: u8,
    control_1_pin: u8,
    control_2_pin: u8,
    settle_ms: u32,
}

impl ValveActuator {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            enable_pin: config.pins.valve_enable,
            control_1_pin: config.pins.valve_control_1,
            control_2_pin: config.pins.valve_control_2,
            settle_ms: config.valve_settle_ms,
        }
    }

    /// Run the valve to `target`. Blocks for the settle time.
    ///
    /// There is no interlock: driving to the current position repeats the
    /// full sequence.
    pub fn drive(&self, target: ValvePosition, hw: &mut (impl DigitalIo + DelayNs)) {
        let open = target == ValvePosition::Open;
        info!("valve: driving {:?}", target);

        hw.write(self.enable_pin, true);
        hw.write(self.control_1_pin, open);
        hw.write(self.control_2_pin, !open);
        hw.delay_ms(self.settle_ms);
        self.release(hw);
    }

    /// De-energise the bridge.
    pub fn release(&self, hw: &mut impl DigitalIo) {
        hw.write(self.enable_pin, false);
        hw.write(self.control_1_pin, false);
        hw.write(self.control_2_pin, false);
    }
}
