//! Ticket submission endpoint.

use axum::Extension;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use tracing::info;

use voltdesk_core::error::Error;
use voltdesk_core::ticket::{Ticket, TicketRequest};
use voltdesk_core::user::User;

use crate::SharedState;
use crate::error::ApiError;

/// Create a ticket and assign it to the least-loaded technician.
pub async fn create_ticket_handler(
    State(state): State<SharedState>,
    Extension(user): Extension<User>,
    Json(req): Json<TicketRequest>,
) -> Result<(StatusCode, Json<Ticket>), ApiError> {
    if req.title.trim().is_empty() {
        return Err(Error::Validation("title must not be empty".into()).into());
    }

    let ticket = state.dispatch.create_and_assign(req).await?;
    info!(
        ticket_id = ticket.id,
        assigned_to = ?ticket.assigned_to,
        submitted_by = %user.username,
        "Ticket created"
    );
    Ok((StatusCode::CREATED, Json(ticket)))
}
