//! Ticket lookups. Status is derived at read time, never stored.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use queueline_core::TicketView;

use super::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TicketListResponse {
    pub tickets: Vec<TicketView>,
    pub total: usize,
}

/// Today's tickets, by number then creation.
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TicketListResponse>, ApiError> {
    let tickets = state.queue().tickets_today().await?;
    Ok(Json(TicketListResponse {
        total: tickets.len(),
        tickets,
    }))
}

/// What a customer polls with the id they were handed.
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TicketView>, ApiError> {
    state
        .queue()
        .ticket(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Ticket not found: {}", id)))
}
