use chrono::{DateTime, Utc};
use thiserror::Error;

use super::AuditRecord;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Which audit records to return, newest first.
#[derive(Debug, Clone)]
pub struct AuditFilter {
    pub ticket_id: Option<String>,
    pub event_type: Option<String>,
    pub user_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self {
            ticket_id: None,
            event_type: None,
            user_id: None,
            from: None,
            to: None,
            limit: 100,
            offset: 0,
        }
    }
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ticket_id(self, ticket_id: impl Into<String>) -> Self {
        Self {
            ticket_id: Some(ticket_id.into()),
            ..self
        }
    }

    pub fn with_event_type(self, event_type: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            ..self
        }
    }

    pub fn with_user_id(self, user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..self
        }
    }

    /// Inclusive bounds; `None` leaves that side open.
    pub fn with_time_range(self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to, ..self }
    }

    pub fn with_limit(self, limit: i64) -> Self {
        Self { limit, ..self }
    }

    pub fn with_offset(self, offset: i64) -> Self {
        Self { offset, ..self }
    }
}

/// Persistence for audit records.
pub trait AuditStore: Send + Sync {
    /// Store a record and return its assigned id.
    fn insert(&self, record: &AuditRecord) -> Result<i64, AuditError>;

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError>;

    /// Matching records, ignoring `limit` and `offset`.
    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError>;
}
