//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements          | Connects to                   |
//! |--------------|---------------------|-------------------------------|
//! | `fs_storage` | StorageMedium       | FAT partition / host dir      |
//! | `hardware`   | DigitalIo, LowPower | ESP32 GPIO, light sleep       |
//! |              | DelayNs             | FreeRTOS / ROM delays         |
//! | `nvs`        | ByteStore           | NVS blob + RAM shadow         |
//! |              | ConfigPort          |                               |
//! | `time`       | ClockDevice         | RTC system time               |
//! | `xbee`       | Transceiver         | XBee API frames over UART     |

pub mod fs_storage;
pub mod hardware;
pub mod nvs;
pub mod time;
pub mod xbee;
