//! Storage seam for the queue.
//!
//! The issuer and advancer algorithms run against [`QueueTransaction`], a
//! single atomic unit of work. A [`QueueStore`] owns the substrate: it opens
//! transactions, commits them, and re-runs the whole body when the substrate
//! reports a conflict.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use super::{AdvanceOutcome, QueueDayState, ResetOutcome, Ticket};

#[derive(Debug, Error)]
pub enum QueueError {
    /// Operator-only operation invoked without the operator capability.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The queue has not been started for today.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Another writer held or changed the state concurrently. Retried internally.
    #[error("Transaction conflict")]
    Conflict,

    /// Conflicts persisted through every allowed attempt.
    #[error("Queue is busy, gave up after {attempts} attempts")]
    Transient { attempts: u32 },

    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    /// Stable machine-readable kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "permission_denied",
            Self::FailedPrecondition(_) => "failed_precondition",
            Self::Conflict | Self::Transient { .. } => "unavailable",
            Self::TicketNotFound(_) => "not_found",
            Self::Database(_) | Self::Internal(_) => "internal",
        }
    }
}

/// One atomic unit of work against the queue records.
///
/// Nothing written through a transaction is visible to others until the
/// owning store commits it, and nothing is kept if the body returns an error.
pub trait QueueTransaction {
    fn load_state(&mut self) -> Result<Option<QueueDayState>, QueueError>;

    fn save_state(&mut self, state: &QueueDayState) -> Result<(), QueueError>;

    fn insert_ticket(&mut self, ticket: &Ticket) -> Result<(), QueueError>;

    /// The most recently issued ticket carrying `number` on `service_date`.
    fn find_ticket(
        &mut self,
        service_date: NaiveDate,
        number: u32,
    ) -> Result<Option<Ticket>, QueueError>;

    fn mark_completed(&mut self, ticket_id: &str) -> Result<(), QueueError>;
}

/// Trait for queue storage backends.
pub trait QueueStore: Send + Sync {
    /// Allocate the next number for `today` and persist a new ticket.
    fn issue(&self, today: NaiveDate, now: DateTime<Utc>) -> Result<Ticket, QueueError>;

    /// Move the now-serving pointer forward, optionally finalizing the outgoing ticket.
    fn advance(&self, today: NaiveDate, mark_completed: bool)
        -> Result<AdvanceOutcome, QueueError>;

    /// Unconditionally overwrite the state with today's reset shape.
    fn reset(&self, today: NaiveDate) -> Result<ResetOutcome, QueueError>;

    /// Current stored state, whatever day it belongs to.
    fn day_state(&self) -> Result<Option<QueueDayState>, QueueError>;

    fn get_ticket(&self, id: &str) -> Result<Option<Ticket>, QueueError>;

    /// All tickets of a service day, ordered by number then issuance.
    fn tickets_for_date(&self, service_date: NaiveDate) -> Result<Vec<Ticket>, QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            QueueError::PermissionDenied("x".into()).kind(),
            "permission_denied"
        );
        assert_eq!(
            QueueError::FailedPrecondition("x".into()).kind(),
            "failed_precondition"
        );
        assert_eq!(QueueError::Transient { attempts: 3 }.kind(), "unavailable");
        assert_eq!(QueueError::TicketNotFound("x".into()).kind(), "not_found");
        assert_eq!(QueueError::Database("x".into()).kind(), "internal");
    }

    #[test]
    fn test_transient_message_mentions_attempts() {
        let err = QueueError::Transient { attempts: 7 };
        assert_eq!(err.to_string(), "Queue is busy, gave up after 7 attempts");
    }
}
