//! Async façade over a [`QueueStore`].
//!
//! Owns the clock, enforces the operator capability, and records metrics and
//! audit events. Store calls are blocking and run on the blocking pool.

use std::sync::Arc;

use tokio::task;
use tracing::{info, warn};

use super::{
    AdvanceOutcome, QueueError, QueueSnapshot, QueueStore, ResetOutcome, Ticket, TicketView,
};
use crate::audit::{AuditEvent, AuditHandle};
use crate::auth::Identity;
use crate::clock::Clock;
use crate::metrics::{QUEUE_ADVANCES, QUEUE_RESETS, TICKETS_ISSUED};

#[derive(Clone)]
pub struct QueueService {
    store: Arc<dyn QueueStore>,
    clock: Arc<dyn Clock>,
    audit: Option<AuditHandle>,
}

impl QueueService {
    pub fn new(store: Arc<dyn QueueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            audit: None,
        }
    }

    /// Record mutations in the audit trail.
    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Take the next number for today. Open to every caller.
    pub async fn issue_ticket(&self, caller: &Identity) -> Result<Ticket, QueueError> {
        let today = self.clock.today();
        let now = self.clock.now();
        let ticket = self.blocking(move |store| store.issue(today, now)).await?;

        TICKETS_ISSUED.inc();
        info!(
            ticket_id = %ticket.id,
            number = ticket.number,
            service_date = %ticket.service_date,
            user_id = %caller.user_id,
            "Ticket issued"
        );
        self.emit(AuditEvent::TicketIssued {
            ticket_id: ticket.id.clone(),
            number: ticket.number,
            service_date: ticket.service_date,
            user_id: caller.user_id.clone(),
        })
        .await;

        Ok(ticket)
    }

    /// Move the now-serving pointer forward by one.
    pub async fn advance(
        &self,
        caller: &Identity,
        mark_completed: bool,
    ) -> Result<AdvanceOutcome, QueueError> {
        require_operator(caller, "advance the queue")?;

        let today = self.clock.today();
        let result = self
            .blocking(move |store| store.advance(today, mark_completed))
            .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e @ QueueError::FailedPrecondition(_)) => {
                QUEUE_ADVANCES.with_label_values(&["not_started"]).inc();
                warn!(user_id = %caller.user_id, service_date = %today, "Advance rejected: {}", e);
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let label = match (&outcome.completed_ticket_id, mark_completed) {
            (Some(_), _) => "completed",
            (None, true) if outcome.previous_number > 0 => "not_found",
            _ => "skipped",
        };
        QUEUE_ADVANCES.with_label_values(&[label]).inc();

        info!(
            previous_number = outcome.previous_number,
            new_current_number = outcome.new_current_number,
            mark_completed,
            user_id = %caller.user_id,
            "Queue advanced"
        );
        self.emit(AuditEvent::QueueAdvanced {
            service_date: outcome.service_date,
            previous_number: outcome.previous_number,
            new_current_number: outcome.new_current_number,
            mark_completed,
            completed_ticket_id: outcome.completed_ticket_id.clone(),
            user_id: caller.user_id.clone(),
        })
        .await;

        Ok(outcome)
    }

    /// Overwrite today's counters with the fresh shape. Tickets are kept.
    pub async fn reset(&self, caller: &Identity) -> Result<ResetOutcome, QueueError> {
        require_operator(caller, "reset the queue")?;

        let today = self.clock.today();
        let outcome = self.blocking(move |store| store.reset(today)).await?;

        QUEUE_RESETS.inc();
        warn!(
            service_date = %today,
            replaced_next_number = outcome.replaced.map(|s| s.next_number),
            replaced_current_number = outcome.replaced.map(|s| s.current_number),
            user_id = %caller.user_id,
            "Queue reset"
        );
        self.emit(AuditEvent::QueueReset {
            service_date: today,
            replaced_service_date: outcome.replaced.map(|s| s.service_date),
            replaced_next_number: outcome.replaced.map(|s| s.next_number),
            replaced_current_number: outcome.replaced.map(|s| s.current_number),
            user_id: caller.user_id.clone(),
        })
        .await;

        Ok(outcome)
    }

    /// Counters and status tallies for today, without writing anything.
    pub async fn snapshot(&self) -> Result<QueueSnapshot, QueueError> {
        let today = self.clock.today();
        self.blocking(move |store| {
            let state = store.day_state()?;
            let tickets = store.tickets_for_date(today)?;
            Ok(QueueSnapshot::new(state, &tickets, today))
        })
        .await
    }

    /// Look a ticket up by id, with its status derived now.
    pub async fn ticket(&self, id: &str) -> Result<Option<TicketView>, QueueError> {
        let today = self.clock.today();
        let id = id.to_string();
        self.blocking(move |store| {
            let Some(ticket) = store.get_ticket(&id)? else {
                return Ok(None);
            };
            let state = store.day_state()?;
            Ok(Some(TicketView::new(ticket, state, today)))
        })
        .await
    }

    /// Today's tickets in number order, each with its derived status.
    pub async fn tickets_today(&self) -> Result<Vec<TicketView>, QueueError> {
        let today = self.clock.today();
        self.blocking(move |store| {
            let state = store.day_state()?;
            let tickets = store.tickets_for_date(today)?;
            Ok(tickets
                .into_iter()
                .map(|ticket| TicketView::new(ticket, state, today))
                .collect())
        })
        .await
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, QueueError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn QueueStore) -> Result<T, QueueError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| QueueError::Internal(format!("store task failed: {}", e)))?
    }

    async fn emit(&self, event: AuditEvent) {
        if let Some(audit) = &self.audit {
            audit.emit(event).await;
        }
    }
}

fn require_operator(caller: &Identity, action: &str) -> Result<(), QueueError> {
    if caller.is_operator() {
        return Ok(());
    }
    warn!(user_id = %caller.user_id, "Caller without operator capability tried to {}", action);
    Err(QueueError::PermissionDenied(format!(
        "operator capability required to {}",
        action
    )))
}
