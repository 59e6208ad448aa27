//! Ticket domain types.
//!
//! A ticket is created from a support request, optionally carrying a
//! telemetry snapshot, and is assigned to the least-loaded technician at
//! creation time. Later status transitions only flip `status`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ticket lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    #[default]
    Open,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Closed => "closed",
        }
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "closed" => Ok(TicketStatus::Closed),
            other => Err(crate::error::Error::Validation(format!(
                "Unknown ticket status: '{other}'"
            ))),
        }
    }
}

/// A persisted support ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Free-form priority label, `"normal"` by default
    pub priority: String,

    pub status: TicketStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,

    /// Opaque telemetry snapshot captured at submission time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry_snapshot: Option<serde_json::Value>,

    /// If set, references a user with role = technician
    pub assigned_to: Option<i64>,

    pub created_at: DateTime<Utc>,
}

/// An inbound ticket submission, prior to assignment.
#[derive(Debug, Clone, Deserialize)]
pub struct TicketRequest {
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "default_priority")]
    pub priority: String,

    #[serde(default)]
    pub vehicle_id: Option<String>,

    #[serde(default)]
    pub telemetry_snapshot: Option<serde_json::Value>,
}

fn default_priority() -> String {
    "normal".into()
}

/// A fully materialized ticket ready for insertion — the dispatch engine has
/// already chosen the assignee (or left it empty).
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
    pub status: TicketStatus,
    pub vehicle_id: Option<String>,
    pub telemetry_snapshot: Option<serde_json::Value>,
    pub assigned_to: Option<i64>,
}

impl NewTicket {
    /// Materialize an unassigned ticket from a request.
    pub fn from_request(req: TicketRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            priority: req.priority,
            status: TicketStatus::Open,
            vehicle_id: req.vehicle_id,
            telemetry_snapshot: req.telemetry_snapshot,
            assigned_to: None,
        }
    }
}
