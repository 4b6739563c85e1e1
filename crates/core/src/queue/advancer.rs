//! Operator-side queue movement: advancing the now-serving pointer and the
//! administrative reset.

use chrono::NaiveDate;
use tracing::warn;

use super::{AdvanceOutcome, QueueDayState, QueueError, QueueTransaction, ResetOutcome};

/// Advance the now-serving pointer by exactly one.
///
/// Never performs the day rollover itself: if no ticket was issued today the
/// queue is not started and this fails with `FailedPrecondition`. With
/// `mark_completed` the outgoing ticket is finalized as done; otherwise it
/// stays uncompleted and derives as missed once the pointer passes it.
pub fn advance(
    tx: &mut dyn QueueTransaction,
    today: NaiveDate,
    mark_completed: bool,
) -> Result<AdvanceOutcome, QueueError> {
    let mut state = QueueDayState::started(tx.load_state()?, today).ok_or_else(|| {
        QueueError::FailedPrecondition("queue not started today".to_string())
    })?;

    let outgoing = state.current_number;
    let mut completed_ticket_id = None;

    if mark_completed && outgoing > 0 {
        match tx.find_ticket(today, outgoing)? {
            Some(ticket) => {
                tx.mark_completed(&ticket.id)?;
                completed_ticket_id = Some(ticket.id);
            }
            None => {
                warn!(
                    number = outgoing,
                    service_date = %today,
                    "No ticket found for outgoing number, advancing without finalizing"
                );
            }
        }
    }

    let new_current_number = state.call_next();
    tx.save_state(&state)?;

    Ok(AdvanceOutcome {
        service_date: today,
        previous_number: outgoing,
        new_current_number,
        completed_ticket_id,
    })
}

/// Overwrite the state with today's reset shape.
///
/// Destructive: tickets already issued today are kept and get reinterpreted
/// against the new counters, and numbering restarts at 1 so those numbers
/// will be handed out again.
pub fn reset(tx: &mut dyn QueueTransaction, today: NaiveDate) -> Result<ResetOutcome, QueueError> {
    let replaced = tx.load_state()?;
    let state = QueueDayState::fresh(today);
    tx.save_state(&state)?;

    Ok(ResetOutcome { state, replaced })
}
