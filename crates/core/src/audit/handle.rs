use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::AuditEvent;

/// An event stamped with the moment it was emitted.
#[derive(Debug, Clone)]
pub struct AuditEventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
}

impl AuditEventEnvelope {
    fn now(event: AuditEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Cloneable sender side of the audit trail.
///
/// Emitting never fails the caller: a closed channel is logged and the event
/// dropped.
#[derive(Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditEventEnvelope>,
}

impl AuditHandle {
    pub fn new(tx: mpsc::Sender<AuditEventEnvelope>) -> Self {
        Self { tx }
    }

    /// Queue an event, waiting for buffer space if the writer is behind.
    pub async fn emit(&self, event: AuditEvent) {
        let event_type = event.event_type();
        if self.tx.send(AuditEventEnvelope::now(event)).await.is_err() {
            tracing::error!(event_type, "Audit writer is gone, event dropped");
        }
    }
}
