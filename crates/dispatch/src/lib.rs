//! Ticket creation and least-loaded technician assignment.
//!
//! The engine materializes a ticket from a request, enumerates all
//! technicians, counts each one's open tickets, and assigns the new ticket
//! to the least-loaded technician. Ties go to the lowest user id — the
//! directory enumerates id-ascending, so assignment is reproducible.
//!
//! The load read and the ticket write are not atomic: two concurrent
//! submissions can both observe the same minimum and pick the same
//! technician. That is a transient imbalance, not a correctness violation;
//! the next assignment sees the updated counts.

use std::sync::Arc;
use tracing::{debug, info};

use voltdesk_core::error::Result;
use voltdesk_core::repo::{TicketRepository, UserDirectory};
use voltdesk_core::ticket::{NewTicket, Ticket, TicketRequest};
use voltdesk_core::user::Role;

/// Creates tickets and picks their assignee.
pub struct DispatchEngine {
    directory: Arc<dyn UserDirectory>,
    tickets: Arc<dyn TicketRepository>,
}

impl DispatchEngine {
    pub fn new(directory: Arc<dyn UserDirectory>, tickets: Arc<dyn TicketRepository>) -> Self {
        Self { directory, tickets }
    }

    /// Create a ticket from `req`, assign it to the technician with the
    /// fewest open tickets, and persist it.
    ///
    /// With zero technicians registered the ticket is stored unassigned —
    /// a missing workshop roster never fails a support request.
    pub async fn create_and_assign(&self, req: TicketRequest) -> Result<Ticket> {
        let mut ticket = NewTicket::from_request(req);

        let technicians = self.directory.list_by_role(Role::Technician).await?;
        let mut best: Option<(i64, i64)> = None; // (open count, technician id)
        for tech in &technicians {
            let load = self.tickets.count_open_by_assignee(tech.id).await?;
            debug!(technician = %tech.username, load, "Technician load");
            // Strict < keeps the first (lowest-id) technician on ties.
            if best.is_none_or(|(min, _)| load < min) {
                best = Some((load, tech.id));
            }
        }

        ticket.assigned_to = best.map(|(_, id)| id);
        let stored = self.tickets.insert(ticket).await?;

        match stored.assigned_to {
            Some(id) => info!(ticket = stored.id, assignee = id, "Ticket created and assigned"),
            None => info!(ticket = stored.id, "Ticket created unassigned — no technicians"),
        }
        Ok(stored)
    }
}
