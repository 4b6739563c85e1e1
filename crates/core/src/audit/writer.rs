use std::sync::Arc;

use tokio::sync::mpsc;

use super::{AuditEventEnvelope, AuditHandle, AuditRecord, AuditStore};

/// Drains the audit channel into an [`AuditStore`].
pub struct AuditWriter {
    rx: mpsc::Receiver<AuditEventEnvelope>,
    store: Arc<dyn AuditStore>,
}

impl AuditWriter {
    pub fn new(rx: mpsc::Receiver<AuditEventEnvelope>, store: Arc<dyn AuditStore>) -> Self {
        Self { rx, store }
    }

    /// Write events until every [`AuditHandle`] has been dropped.
    ///
    /// A failed insert is logged and skipped; the writer keeps going.
    pub async fn run(mut self) {
        tracing::info!("Audit writer started");

        while let Some(AuditEventEnvelope { timestamp, event }) = self.rx.recv().await {
            let record = AuditRecord {
                id: 0,
                timestamp,
                event_type: event.event_type().to_string(),
                ticket_id: event.ticket_id().map(String::from),
                user_id: event.user_id().map(String::from),
                data: event,
            };

            let store = Arc::clone(&self.store);
            let result = tokio::task::spawn_blocking(move || store.insert(&record)).await;
            match result {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::error!("Failed to write audit event: {}", e),
                Err(e) => tracing::error!("Audit insert task failed: {}", e),
            }
        }

        tracing::info!("Audit writer stopped");
    }
}

/// Build a connected handle/writer pair.
///
/// Spawn the writer with `tokio::spawn(writer.run())` and clone the handle
/// wherever events are produced.
pub fn create_audit_system(
    store: Arc<dyn AuditStore>,
    buffer_size: usize,
) -> (AuditHandle, AuditWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (AuditHandle::new(tx), AuditWriter::new(rx, store))
}
