//! The mutating queue operations and the snapshot read.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use queueline_core::QueueSnapshot;

use super::error::ApiError;
use super::middleware::Caller;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct IssueTicketResponse {
    pub ticket_id: String,
    pub number: u32,
    pub service_date: NaiveDate,
}

/// Body of `POST /queue/advance`. Every part of it is optional.
#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    #[serde(default = "default_mark_completed", alias = "markCompleted")]
    pub mark_completed: bool,
}

impl Default for AdvanceRequest {
    fn default() -> Self {
        Self {
            mark_completed: default_mark_completed(),
        }
    }
}

fn default_mark_completed() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    pub success: bool,
    pub new_current_number: u32,
    pub completed_ticket_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub success: bool,
}

/// Take a number. Open to anyone.
pub async fn issue_ticket(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
) -> Result<(StatusCode, Json<IssueTicketResponse>), ApiError> {
    let ticket = state.queue().issue_ticket(&caller).await?;

    state
        .ws_broadcaster()
        .ticket_issued(&ticket.id, ticket.number);
    publish_counters(&state).await;

    Ok((
        StatusCode::CREATED,
        Json(IssueTicketResponse {
            ticket_id: ticket.id,
            number: ticket.number,
            service_date: ticket.service_date,
        }),
    ))
}

/// Call the next number. Operator only.
pub async fn advance(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    body: Bytes,
) -> Result<Json<AdvanceResponse>, ApiError> {
    let request = parse_advance(&body)?;

    let outcome = state
        .queue()
        .advance(&caller, request.mark_completed)
        .await?;
    publish_counters(&state).await;

    Ok(Json(AdvanceResponse {
        success: true,
        new_current_number: outcome.new_current_number,
        completed_ticket_id: outcome.completed_ticket_id,
    }))
}

/// Restart today's numbering. Operator only, and destructive.
pub async fn reset(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
) -> Result<Json<ResetResponse>, ApiError> {
    let outcome = state.queue().reset(&caller).await?;

    state
        .ws_broadcaster()
        .queue_reset(outcome.state.service_date);
    publish_counters(&state).await;

    Ok(Json(ResetResponse { success: true }))
}

pub async fn snapshot(State(state): State<Arc<AppState>>) -> Result<Json<QueueSnapshot>, ApiError> {
    Ok(Json(state.queue().snapshot().await?))
}

/// An empty body means all defaults.
fn parse_advance(body: &[u8]) -> Result<AdvanceRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(AdvanceRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid advance request: {}", e)))
}

/// Push fresh counters to live viewers.
async fn publish_counters(state: &AppState) {
    state
        .ws_broadcaster()
        .publish_counters(state.queue())
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_advance_defaults_to_completion() {
        assert!(parse_advance(b"").unwrap().mark_completed);
        assert!(parse_advance(b"  \n").unwrap().mark_completed);
        assert!(parse_advance(b"{}").unwrap().mark_completed);
    }

    #[test]
    fn test_parse_advance_accepts_both_spellings() {
        assert!(!parse_advance(br#"{"mark_completed": false}"#).unwrap().mark_completed);
        assert!(!parse_advance(br#"{"markCompleted": false}"#).unwrap().mark_completed);
    }

    #[test]
    fn test_parse_advance_rejects_garbage() {
        assert!(matches!(
            parse_advance(b"{not json"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            parse_advance(br#"{"mark_completed": "yes"}"#),
            Err(ApiError::BadRequest(_))
        ));
    }
}
