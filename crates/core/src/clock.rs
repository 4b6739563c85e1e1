//! Source of "now" and "today" for the queue.
//!
//! The service day is a calendar date in a configured fixed offset from UTC.
//! Rollover is lazy: a new day begins for the queue the first time a
//! mutating operation runs with a different `today()`.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// The service day `now()` falls on.
    fn today(&self) -> NaiveDate;
}

/// Wall clock, with the service day taken in a fixed offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::utc()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        service_date(self.now(), self.offset)
    }
}

/// Calendar date of `instant` as seen from `offset`.
pub fn service_date(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}
