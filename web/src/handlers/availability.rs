//! Ticket class availability endpoint.

use axum::{
    Json,
    extract::{Path, State},
};
use boxoffice_core::{Availability, TicketClassId};

use crate::error::AppError;
use crate::state::AppState;

/// Current stock of a ticket class: `{totalCapacity, remaining}`.
///
/// # Endpoint
///
/// ```text
/// GET /api/ticket-classes/:id/availability
/// ```
///
/// # Errors
///
/// Returns 404 for an unknown class and 503 when storage is unavailable.
pub async fn ticket_class_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Availability>, AppError> {
    let availability = state.ledger.availability(&TicketClassId::new(id)).await?;
    Ok(Json(availability))
}
