//! Repository traits — the persistence seams of the system.
//!
//! The directory and ticket repository are the only collaborators with
//! mutable shared state. Implementations: SQLite (production), in-memory
//! fakes (dispatch engine tests).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::ticket::{NewTicket, Ticket};
use crate::user::{NewUser, Role, User};

/// CRUD over user records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Create a user. Fails with `Error::Conflict` when the username (or
    /// email) is already taken.
    async fn create(&self, user: NewUser) -> Result<User>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;

    /// All users with the given role, ordered by id ascending. The ordering
    /// is what makes tie-breaks in ticket assignment deterministic.
    async fn list_by_role(&self, role: Role) -> Result<Vec<User>>;

    /// Store a reset-token hash and its expiry on the user record.
    async fn set_reset_token(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Users whose reset-token expiry is still in the future. Candidates for
    /// reset-token verification — the plaintext cannot be looked up directly
    /// because only a salted hash is stored.
    async fn list_with_active_reset_tokens(&self, now: DateTime<Utc>) -> Result<Vec<User>>;

    /// Set a new password hash and clear the reset token and its expiry in
    /// one write. A redeemed token must never be redeemable twice.
    async fn complete_password_reset(&self, user_id: i64, password_hash: &str) -> Result<()>;
}

/// Persistence for support tickets.
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Insert a ticket and return the stored row including the generated id
    /// and timestamp. The insert runs in a single transaction.
    async fn insert(&self, ticket: NewTicket) -> Result<Ticket>;

    /// Number of open tickets currently assigned to the given user.
    async fn count_open_by_assignee(&self, user_id: i64) -> Result<i64>;
}
