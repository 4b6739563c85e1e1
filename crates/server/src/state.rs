use std::sync::Arc;

use queueline_core::{AuditStore, Authenticator, Config, QueueService, SanitizedConfig};

use crate::api::WsBroadcaster;

/// Shared application state.
///
/// Audit events flow through the [`QueueService`]; the state only keeps the
/// store for reads.
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    queue: QueueService,
    audit_store: Arc<dyn AuditStore>,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        queue: QueueService,
        audit_store: Arc<dyn AuditStore>,
        ws_broadcaster: WsBroadcaster,
    ) -> Self {
        Self {
            config,
            authenticator,
            queue,
            audit_store,
            ws_broadcaster,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn queue(&self) -> &QueueService {
        &self.queue
    }

    pub fn audit_store(&self) -> &Arc<dyn AuditStore> {
        &self.audit_store
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }
}
