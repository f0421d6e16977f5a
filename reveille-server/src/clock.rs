//! Time source for the wakeup scheduler.
//!
//! All wakeup comparisons happen on local time-of-day, derived from UTC
//! plus a fixed signed hour offset from the preference record. The trait
//! exists so the scheduler can run against a fake clock in tests.

use time::{OffsetDateTime, UtcOffset};

pub const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl TimeOfDay {
    pub const fn new(hour: u8, minute: u8, second: u8) -> Self {
        Self {
            hour,
            minute,
            second,
        }
    }

    pub fn seconds_of_day(self) -> u32 {
        (u32::from(self.hour) * 60 + u32::from(self.minute)) * 60 + u32::from(self.second)
    }
}

impl From<OffsetDateTime> for TimeOfDay {
    fn from(t: OffsetDateTime) -> Self {
        Self::new(t.hour(), t.minute(), t.second())
    }
}

pub trait Clock: Send + Sync {
    /// Current local time-of-day at the given UTC offset (signed hours).
    fn now_local(&self, utc_offset: i32) -> TimeOfDay;
}

/// Wall-clock implementation. An offset the `time` crate cannot express
/// falls back to plain UTC.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_local(&self, utc_offset: i32) -> TimeOfDay {
        let offset = i8::try_from(utc_offset)
            .ok()
            .and_then(|hours| UtcOffset::from_hms(hours, 0, 0).ok())
            .unwrap_or(UtcOffset::UTC);
        OffsetDateTime::now_utc().to_offset(offset).into()
    }
}

/// Fixed clock for tests.
#[cfg(test)]
pub struct FakeClock {
    now: TimeOfDay,
}

#[cfg(test)]
impl FakeClock {
    pub fn at(hour: u8, minute: u8, second: u8) -> Self {
        Self {
            now: TimeOfDay::new(hour, minute, second),
        }
    }
}

#[cfg(test)]
impl Clock for FakeClock {
    fn now_local(&self, _utc_offset: i32) -> TimeOfDay {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn seconds_of_day_counts_from_midnight() {
        assert_eq!(TimeOfDay::new(0, 0, 0).seconds_of_day(), 0);
        assert_eq!(TimeOfDay::new(6, 56, 0).seconds_of_day(), 24_960);
        assert_eq!(TimeOfDay::new(23, 59, 59).seconds_of_day(), 86_399);
    }

    #[test]
    fn datetime_conversion_keeps_the_local_components() {
        let t: TimeOfDay = datetime!(2026-08-04 06:56:12 UTC)
            .to_offset(UtcOffset::from_hms(2, 0, 0).unwrap())
            .into();
        assert_eq!(t, TimeOfDay::new(8, 56, 12));
    }
}
