//! Calendar time and 32-bit epoch conversion.
//!
//! The clock device hands out broken-down calendar time; the log, the leak
//! detector and every radio report work in epoch seconds (UTC, proleptic
//! Gregorian). Conversion in both directions is O(1) using Howard Hinnant's
//! `days_from_civil` / `civil_from_days`.

const SECONDS_PER_DAY: u32 = 86_400;

/// Days from 0000-03-01 to 1970-01-01.
const EPOCH_SHIFT_DAYS: i64 = 719_468;

/// Broken-down UTC time as held by the clock device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub min: u8,
    pub sec: u8,
}

impl CalendarTime {
    pub const UNIX_EPOCH: Self = Self {
        year: 1970,
        month: 1,
        day: 1,
        hour: 0,
        min: 0,
        sec: 0,
    };

    pub const fn new(year: u16, month: u8, day: u8, hour: u8, min: u8, sec: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            min,
            sec,
        }
    }

    /// Convert epoch seconds to calendar time.
    pub fn from_epoch(epoch: u32) -> Self {
        let days = epoch / SECONDS_PER_DAY;
        let secs_today = epoch % SECONDS_PER_DAY;
        let (year, month, day) = civil_from_days(i64::from(days));

        Self {
            year,
            month,
            day,
            hour: (secs_today / 3600) as u8,
            min: ((secs_today % 3600) / 60) as u8,
            sec: (secs_today % 60) as u8,
        }
    }

    /// Convert to epoch seconds.
    ///
    /// Dates before 1970 clamp to 0, dates past 2106-02-07 clamp to
    /// `u32::MAX`.
    pub fn to_epoch(&self) -> u32 {
        let days = days_from_civil(self.year, self.month, self.day);
        let secs = days * i64::from(SECONDS_PER_DAY)
            + i64::from(self.hour) * 3600
            + i64::from(self.min) * 60
            + i64::from(self.sec);
        secs.clamp(0, i64::from(u32::MAX)) as u32
    }

    /// Two-digit year, as used in log region names.
    pub fn short_year(&self) -> u8 {
        (self.year % 100) as u8
    }

    /// 0 for even years, 1 for odd years.
    pub fn year_parity(&self) -> u8 {
        (self.year % 2) as u8
    }
}

fn civil_from_days(days_since_epoch: i64) -> (u16, u8, u8) {
    let z = days_since_epoch + EPOCH_SHIFT_DAYS;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097; // [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365; // [0, 399]
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // March = 0
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if m <= 2 { y + 1 } else { y };

    (year as u16, m as u8, d as u8)
}

fn days_from_civil(year: u16, month: u8, day: u8) -> i64 {
    let m = i64::from(month);
    let (y, m) = if m <= 2 {
        (i64::from(year) - 1, m + 9)
    } else {
        (i64::from(year), m - 3)
    };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let doy = (153 * m + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;

    era * 146_097 + doe - EPOCH_SHIFT_DAYS
}
