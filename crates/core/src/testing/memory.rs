use chrono::NaiveDate;

use crate::queue::{QueueDayState, QueueError, QueueTransaction, Ticket};

/// Plain in-memory records behind the [`QueueTransaction`] interface.
///
/// Writes apply immediately; there is no rollback. Useful for exercising
/// the issuer and advancer algorithms without a database.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransaction {
    pub state: Option<QueueDayState>,
    pub tickets: Vec<Ticket>,
}

impl MemoryTransaction {
    pub fn with_state(state: QueueDayState) -> Self {
        Self {
            state: Some(state),
            tickets: Vec::new(),
        }
    }
}

impl QueueTransaction for MemoryTransaction {
    fn load_state(&mut self) -> Result<Option<QueueDayState>, QueueError> {
        Ok(self.state)
    }

    fn save_state(&mut self, state: &QueueDayState) -> Result<(), QueueError> {
        self.state = Some(*state);
        Ok(())
    }

    fn insert_ticket(&mut self, ticket: &Ticket) -> Result<(), QueueError> {
        self.tickets.push(ticket.clone());
        Ok(())
    }

    fn find_ticket(
        &mut self,
        service_date: NaiveDate,
        number: u32,
    ) -> Result<Option<Ticket>, QueueError> {
        Ok(self
            .tickets
            .iter()
            .rev()
            .find(|t| t.service_date == service_date && t.number == number)
            .cloned())
    }

    fn mark_completed(&mut self, ticket_id: &str) -> Result<(), QueueError> {
        match self.tickets.iter_mut().find(|t| t.id == ticket_id) {
            Some(ticket) => {
                ticket.completed = true;
                Ok(())
            }
            None => Err(QueueError::TicketNotFound(ticket_id.to_string())),
        }
    }
}
