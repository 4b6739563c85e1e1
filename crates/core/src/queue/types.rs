use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::day_state::QueueDayState;
use super::status::{derive_status, StatusCounts, TicketStatus};

/// One customer's claim to a sequence number for a service day.
///
/// Only the issuer creates tickets and only the advancer flips `completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub number: u32,
    pub service_date: NaiveDate,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    pub fn status(&self, current_number: u32) -> TicketStatus {
        derive_status(self.completed, self.number, current_number)
    }
}

/// Result of a successful advance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvanceOutcome {
    pub service_date: NaiveDate,
    pub previous_number: u32,
    pub new_current_number: u32,
    /// Ticket finalized as done, if one was requested and found.
    pub completed_ticket_id: Option<String>,
}

/// Result of an administrative reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetOutcome {
    pub state: QueueDayState,
    /// The record that was overwritten, if any.
    pub replaced: Option<QueueDayState>,
}

/// What every observer of the queue sees for today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub today: NaiveDate,
    /// False until the first ticket of the day is issued (or a reset happens).
    pub started: bool,
    pub current_number: u32,
    pub next_number: u32,
    pub issued: u32,
    pub stats: StatusCounts,
}

impl QueueSnapshot {
    pub fn new(stored: Option<QueueDayState>, tickets: &[Ticket], today: NaiveDate) -> Self {
        let started = QueueDayState::started(stored, today).is_some();
        let state = QueueDayState::rolled_over(stored, today);
        let todays = tickets.iter().filter(|t| t.service_date == today);

        Self {
            today,
            started,
            current_number: state.current_number,
            next_number: state.next_number,
            issued: state.issued(),
            stats: StatusCounts::tally(todays, state.current_number),
        }
    }
}

/// A ticket with its status derived at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketView {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub status: TicketStatus,
    /// The pointer the status was derived against; `None` for past days.
    pub current_number: Option<u32>,
    /// Tickets still to be called before this one, while waiting.
    pub ahead: Option<u32>,
}

impl TicketView {
    pub fn new(ticket: Ticket, stored: Option<QueueDayState>, today: NaiveDate) -> Self {
        if ticket.service_date != today {
            // Counters of a past day are gone; anything not finalized was missed.
            let status = if ticket.completed {
                TicketStatus::Done
            } else {
                TicketStatus::Missed
            };
            return Self {
                ticket,
                status,
                current_number: None,
                ahead: None,
            };
        }

        let current = QueueDayState::rolled_over(stored, today).current_number;
        let status = ticket.status(current);
        let ahead = (status == TicketStatus::Waiting)
            .then(|| ticket.number.saturating_sub(current).saturating_sub(1));

        Self {
            ticket,
            status,
            current_number: Some(current),
            ahead,
        }
    }
}
