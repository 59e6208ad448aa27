//! # VoltDesk Core
//!
//! Domain types, traits, and error definitions for the VoltDesk fleet-support
//! backend. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator the core logic talks to — the user directory, the
//! ticket repository, notification senders — is defined as a trait here.
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with in-memory fakes
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod notify;
pub mod repo;
pub mod telemetry;
pub mod ticket;
pub mod user;

// Re-export key types at crate root for ergonomics
pub use error::{AuthError, Error, NotifyError, Result, StorageError};
pub use notify::Notifier;
pub use repo::{TicketRepository, UserDirectory};
pub use telemetry::TelemetryReading;
pub use ticket::{NewTicket, Ticket, TicketRequest, TicketStatus};
pub use user::{NewUser, Role, User};
