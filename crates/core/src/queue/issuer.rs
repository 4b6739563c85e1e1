//! Ticket issuance.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::{QueueDayState, QueueError, QueueTransaction, Ticket};

/// Allocate the next number for `today` and record a new ticket.
///
/// Rolls the day state over if it belongs to another day. Numbers handed out
/// on one day form a gapless sequence starting at 1 because the store
/// serializes every transaction touching the state record.
pub fn issue(
    tx: &mut dyn QueueTransaction,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Ticket, QueueError> {
    let mut state = QueueDayState::rolled_over(tx.load_state()?, today);
    let number = state.allocate();

    let ticket = Ticket {
        id: Uuid::new_v4().to_string(),
        number,
        service_date: today,
        completed: false,
        created_at: now,
    };

    tx.insert_ticket(&ticket)?;
    tx.save_state(&state)?;

    Ok(ticket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryTransaction;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[test]
    fn test_first_tickets_on_empty_state() {
        let mut tx = MemoryTransaction::default();

        let first = issue(&mut tx, day(19), Utc::now()).unwrap();
        let second = issue(&mut tx, day(19), Utc::now()).unwrap();

        assert_eq!(first.number, 1);
        assert_eq!(second.number, 2);
        assert_ne!(first.id, second.id);
        assert!(!first.completed);
        assert_eq!(first.service_date, day(19));
        assert_eq!(tx.tickets.len(), 2);
        assert_eq!(
            tx.state,
            Some(QueueDayState {
                service_date: day(19),
                next_number: 3,
                current_number: 0,
            })
        );
    }

    #[test]
    fn test_keeps_current_number_of_same_day() {
        let mut tx = MemoryTransaction::with_state(QueueDayState {
            service_date: day(19),
            next_number: 6,
            current_number: 4,
        });

        let ticket = issue(&mut tx, day(19), Utc::now()).unwrap();

        assert_eq!(ticket.number, 6);
        let state = tx.state.unwrap();
        assert_eq!(state.next_number, 7);
        assert_eq!(state.current_number, 4);
    }

    #[test]
    fn test_new_day_rolls_over() {
        let mut tx = MemoryTransaction::with_state(QueueDayState {
            service_date: day(18),
            next_number: 57,
            current_number: 50,
        });

        let ticket = issue(&mut tx, day(19), Utc::now()).unwrap();

        assert_eq!(ticket.number, 1);
        assert_eq!(
            tx.state,
            Some(QueueDayState {
                service_date: day(19),
                next_number: 2,
                current_number: 0,
            })
        );
    }

    #[test]
    fn test_records_creation_time() {
        let mut tx = MemoryTransaction::default();
        let now = Utc::now();

        let ticket = issue(&mut tx, day(19), now).unwrap();

        assert_eq!(ticket.created_at, now);
        assert_eq!(tx.tickets[0], ticket);
    }
}
