use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use queueline_core::{AuditFilter, AuditRecord, QueueError};

use super::error::ApiError;
use super::middleware::Caller;
use crate::state::AppState;

const MAX_LIMIT: i64 = 1000;
const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct AuditQueryParams {
    pub ticket_id: Option<String>,
    pub event_type: Option<String>,
    pub user_id: Option<String>,
    /// RFC 3339, inclusive.
    pub from: Option<DateTime<Utc>>,
    /// RFC 3339, inclusive.
    pub to: Option<DateTime<Utc>>,
    /// Default 100, capped at 1000.
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AuditQueryParams {
    fn filter(&self) -> AuditFilter {
        let mut filter = AuditFilter::new().with_time_range(self.from, self.to);
        if let Some(ticket_id) = &self.ticket_id {
            filter = filter.with_ticket_id(ticket_id);
        }
        if let Some(event_type) = &self.event_type {
            filter = filter.with_event_type(event_type);
        }
        if let Some(user_id) = &self.user_id {
            filter = filter.with_user_id(user_id);
        }
        filter
            .with_limit(self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT))
            .with_offset(self.offset.unwrap_or(0).max(0))
    }
}

#[derive(Debug, Serialize)]
pub struct AuditQueryResponse {
    pub events: Vec<AuditRecord>,
    /// Matching events ignoring paging.
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Query the audit trail. Operator only.
pub async fn query_audit(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditQueryResponse>, ApiError> {
    if !caller.is_operator() {
        return Err(QueueError::PermissionDenied(
            "operator capability required to read the audit trail".to_string(),
        )
        .into());
    }

    let filter = params.filter();
    let store = Arc::clone(state.audit_store());
    let query = filter.clone();
    let (events, total) = tokio::task::spawn_blocking(move || {
        Ok::<_, queueline_core::AuditError>((store.query(&query)?, store.count(&query)?))
    })
    .await
    .map_err(|e| QueueError::Internal(format!("audit query task failed: {}", e)))??;

    Ok(Json(AuditQueryResponse {
        events,
        total,
        limit: filter.limit,
        offset: filter.offset,
    }))
}
