//! Real-time clock: set once from the satellite fix, read on every record.

use std::time::Instant;

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike};

use crate::constants::SENTINEL_YEAR;
use crate::error::{NodeError, Result};

/// Broken-down UTC calendar time as reported by the positioning receiver.
///
/// `weekday` counts from Monday = 0 and `yearday` from January 1st = 1.
/// Daylight saving is never known for receiver time and is not carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub weekday: u32,
    pub yearday: u32,
}

impl CalendarTime {
    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
            weekday: dt.weekday().num_days_from_monday(),
            yearday: dt.ordinal(),
        }
    }

    /// Midnight, January 1st of the sentinel year: what the receiver and the
    /// soft RTC hold before any real time arrives.
    pub fn power_on_default() -> Self {
        Self {
            year: SENTINEL_YEAR,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            weekday: 2,
            yearday: 1,
        }
    }

    pub fn to_datetime(&self) -> Result<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .and_then(|date| date.and_hms_opt(self.hour, self.minute, self.second))
            .ok_or_else(|| NodeError::Gps(format!("invalid calendar time {:?}", self)))
    }
}

/// Clock collaborator.
pub trait RealTimeClock {
    fn set(&mut self, time: &CalendarTime) -> Result<()>;
    fn now(&self) -> NaiveDateTime;

    fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot::new(self.now())
    }
}

/// One reading of the clock. ISO string and epoch seconds are both derived
/// from the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSnapshot {
    datetime: NaiveDateTime,
}

impl ClockSnapshot {
    pub fn new(datetime: NaiveDateTime) -> Self {
        Self {
            datetime: datetime.with_nanosecond(0).unwrap_or(datetime),
        }
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.datetime
    }

    /// `YYYY-MM-DDThh:mm:ss`
    pub fn iso8601(&self) -> String {
        self.datetime.format("%Y-%m-%dT%H:%M:%S").to_string()
    }

    pub fn epoch_seconds(&self) -> i64 {
        self.datetime.and_utc().timestamp()
    }
}

/// Software RTC: a base time plus the monotonic time elapsed since it was set.
pub struct SoftRtc {
    base: NaiveDateTime,
    set_at: Instant,
}

impl SoftRtc {
    /// Clock at its power-on default.
    pub fn new() -> Self {
        let base = CalendarTime::power_on_default()
            .to_datetime()
            .unwrap_or(NaiveDateTime::UNIX_EPOCH);
        Self {
            base,
            set_at: Instant::now(),
        }
    }
}

impl Default for SoftRtc {
    fn default() -> Self {
        Self::new()
    }
}

impl RealTimeClock for SoftRtc {
    fn set(&mut self, time: &CalendarTime) -> Result<()> {
        self.base = time.to_datetime()?;
        self.set_at = Instant::now();
        log::debug!("RTC set to {}", self.base);
        Ok(())
    }

    fn now(&self) -> NaiveDateTime {
        let elapsed = TimeDelta::from_std(self.set_at.elapsed()).unwrap_or(TimeDelta::zero());
        self.base + elapsed
    }
}
