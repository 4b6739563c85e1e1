//! The singleton per-day counter record and its lazy rollover.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fixed logical key of the singleton state record.
pub const STATE_KEY: &str = "state";

/// Counters for one service day.
///
/// `next_number` starts at 1 and `current_number` at 0 (nothing called).
/// Both reset whenever a mutating operation observes a `service_date` other
/// than its own notion of today; there is no background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDayState {
    pub service_date: NaiveDate,
    pub next_number: u32,
    pub current_number: u32,
}

impl QueueDayState {
    pub fn fresh(today: NaiveDate) -> Self {
        Self {
            service_date: today,
            next_number: 1,
            current_number: 0,
        }
    }

    pub fn is_for(&self, today: NaiveDate) -> bool {
        self.service_date == today
    }

    /// The state a mutation on `today` starts from: the stored record if it
    /// belongs to today, otherwise the reset shape.
    pub fn rolled_over(stored: Option<Self>, today: NaiveDate) -> Self {
        match stored {
            Some(state) if state.is_for(today) => state,
            _ => Self::fresh(today),
        }
    }

    /// The stored record only if the queue has been started today.
    pub fn started(stored: Option<Self>, today: NaiveDate) -> Option<Self> {
        stored.filter(|state| state.is_for(today))
    }

    /// Hand out the next ticket number.
    pub fn allocate(&mut self) -> u32 {
        let number = self.next_number;
        self.next_number += 1;
        number
    }

    /// Move the now-serving pointer forward by one and return the new value.
    pub fn call_next(&mut self) -> u32 {
        self.current_number += 1;
        self.current_number
    }

    /// How many numbers have been handed out today.
    pub fn issued(&self) -> u32 {
        self.next_number.saturating_sub(1)
    }
}
