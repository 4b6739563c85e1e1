//! Derived ticket status.
//!
//! Status is never stored. It is recomputed from `(completed, number,
//! current_number)` on every read, so a ticket can change status purely
//! because the now-serving pointer moved.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::Ticket;

/// Where a ticket stands relative to the now-serving pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Not called yet.
    Waiting,
    /// Currently being served.
    Called,
    /// Passed over without being marked completed.
    Missed,
    /// Finalized as served.
    Done,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Called => "called",
            Self::Missed => "missed",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a ticket against the current now-serving number of its day.
pub fn derive_status(completed: bool, number: u32, current_number: u32) -> TicketStatus {
    if completed {
        return TicketStatus::Done;
    }
    match number.cmp(&current_number) {
        Ordering::Less => TicketStatus::Missed,
        Ordering::Equal => TicketStatus::Called,
        Ordering::Greater => TicketStatus::Waiting,
    }
}

/// Per-status ticket counts for one service day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub waiting: u32,
    pub called: u32,
    pub missed: u32,
    pub done: u32,
}

impl StatusCounts {
    pub fn tally<'a>(tickets: impl IntoIterator<Item = &'a Ticket>, current_number: u32) -> Self {
        let mut counts = Self::default();
        for ticket in tickets {
            counts.record(ticket.status(current_number));
        }
        counts
    }

    pub fn record(&mut self, status: TicketStatus) {
        match status {
            TicketStatus::Waiting => self.waiting += 1,
            TicketStatus::Called => self.called += 1,
            TicketStatus::Missed => self.missed += 1,
            TicketStatus::Done => self.done += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.waiting + self.called + self.missed + self.done
    }
}
