//! Calendar clock adapter.
//!
//! - **`target_os = "espidf"`**: the RTC-backed system time via
//!   `gettimeofday`. Keeps counting through light sleep. Setting it is the
//!   provisioning tool's job; the firmware only reads it.
//! - **`not(target_os = "espidf")`**: host wall clock, for simulation.

use crate::app::ports::ClockDevice;
use crate::time::CalendarTime;

#[derive(Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }

    /// Seconds since the Unix epoch, clamped to the `u32` range.
    #[cfg(target_os = "espidf")]
    fn epoch(&self) -> u32 {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: gettimeofday only writes into `tv`.
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            log::warn!("clock: gettimeofday failed");
            return 0;
        }
        (tv.tv_sec as i64).clamp(0, i64::from(u32::MAX)) as u32
    }

    #[cfg(not(target_os = "espidf"))]
    fn epoch(&self) -> u32 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs().min(u64::from(u32::MAX)) as u32)
    }
}

impl ClockDevice for SystemClock {
    fn init(&mut self) {}

    fn now(&mut self) -> CalendarTime {
        CalendarTime::from_epoch(self.epoch())
    }
}
