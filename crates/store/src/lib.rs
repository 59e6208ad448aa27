//! SQLite persistence for VoltDesk.
//!
//! One database file, two tables:
//! - `users`   — accounts, credentials, outstanding reset tokens
//! - `tickets` — support tickets with their assignment
//!
//! Implements the [`UserDirectory`] and [`TicketRepository`] traits from
//! `voltdesk-core`. Timestamps are stored as RFC 3339 text in UTC.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;

use voltdesk_core::error::{Error, Result, StorageError};
use voltdesk_core::repo::{TicketRepository, UserDirectory};
use voltdesk_core::ticket::{NewTicket, Ticket, TicketStatus};
use voltdesk_core::user::{NewUser, Role, User};

/// SQLite-backed store for users and tickets.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// Pass `":memory:"` for an in-process ephemeral database (tests).
    pub async fn new(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StorageError::Connection(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // An in-memory database exists per connection; keep the pool at one
        // so every query sees the same schema.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Run schema migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id                     INTEGER PRIMARY KEY AUTOINCREMENT,
                username               TEXT UNIQUE NOT NULL,
                email                  TEXT UNIQUE,
                phone                  TEXT,
                password_hash          TEXT NOT NULL,
                role                   TEXT NOT NULL DEFAULT 'driver',
                reset_token_hash       TEXT,
                reset_token_expires_at TEXT,
                created_at             TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Migration(format!("users table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                title              TEXT NOT NULL,
                description        TEXT,
                priority           TEXT NOT NULL DEFAULT 'normal',
                status             TEXT NOT NULL DEFAULT 'open',
                vehicle_id         TEXT,
                telemetry_snapshot TEXT,
                assigned_to        INTEGER REFERENCES users(id),
                created_at         TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Migration(format!("tickets table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tickets_assignee_status
             ON tickets (assigned_to, status)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Migration(format!("tickets index: {e}")))?;

        Ok(())
    }

    fn map_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
        let role: String = row
            .try_get("role")
            .map_err(|e| StorageError::Query(format!("users.role: {e}")))?;
        Ok(User {
            id: row
                .try_get("id")
                .map_err(|e| StorageError::Query(format!("users.id: {e}")))?,
            username: row
                .try_get("username")
                .map_err(|e| StorageError::Query(format!("users.username: {e}")))?,
            email: row
                .try_get("email")
                .map_err(|e| StorageError::Query(format!("users.email: {e}")))?,
            phone: row
                .try_get("phone")
                .map_err(|e| StorageError::Query(format!("users.phone: {e}")))?,
            password_hash: row
                .try_get("password_hash")
                .map_err(|e| StorageError::Query(format!("users.password_hash: {e}")))?,
            role: role.parse()?,
            reset_token_hash: row
                .try_get("reset_token_hash")
                .map_err(|e| StorageError::Query(format!("users.reset_token_hash: {e}")))?,
            reset_token_expires_at: parse_opt_timestamp(
                row.try_get("reset_token_expires_at")
                    .map_err(|e| StorageError::Query(format!("users.reset_token_expires_at: {e}")))?,
            )?,
            created_at: parse_timestamp(
                &row.try_get::<String, _>("created_at")
                    .map_err(|e| StorageError::Query(format!("users.created_at: {e}")))?,
            )?,
        })
    }

    fn map_ticket(row: &sqlx::sqlite::SqliteRow) -> Result<Ticket> {
        let status: String = row
            .try_get("status")
            .map_err(|e| StorageError::Query(format!("tickets.status: {e}")))?;
        let snapshot: Option<String> = row
            .try_get("telemetry_snapshot")
            .map_err(|e| StorageError::Query(format!("tickets.telemetry_snapshot: {e}")))?;
        Ok(Ticket {
            id: row
                .try_get("id")
                .map_err(|e| StorageError::Query(format!("tickets.id: {e}")))?,
            title: row
                .try_get("title")
                .map_err(|e| StorageError::Query(format!("tickets.title: {e}")))?,
            description: row
                .try_get("description")
                .map_err(|e| StorageError::Query(format!("tickets.description: {e}")))?,
            priority: row
                .try_get("priority")
                .map_err(|e| StorageError::Query(format!("tickets.priority: {e}")))?,
            status: status.parse::<TicketStatus>()?,
            vehicle_id: row
                .try_get("vehicle_id")
                .map_err(|e| StorageError::Query(format!("tickets.vehicle_id: {e}")))?,
            telemetry_snapshot: snapshot
                .map(|s| serde_json::from_str(&s))
                .transpose()?,
            assigned_to: row
                .try_get("assigned_to")
                .map_err(|e| StorageError::Query(format!("tickets.assigned_to: {e}")))?,
            created_at: parse_timestamp(
                &row.try_get::<String, _>("created_at")
                    .map_err(|e| StorageError::Query(format!("tickets.created_at: {e}")))?,
            )?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Query(format!("bad timestamp '{s}': {e}")).into())
}

fn parse_opt_timestamp(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_timestamp).transpose()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl UserDirectory for SqliteStore {
    async fn create(&self, user: NewUser) -> Result<User> {
        let created_at = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, phone, password_hash, role, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&created_at)
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(r) => r,
            Err(e) if is_unique_violation(&e) => {
                return Err(Error::Conflict("Username already exists".into()));
            }
            Err(e) => return Err(StorageError::Query(format!("users insert: {e}")).into()),
        };

        let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Query(format!("users select after insert: {e}")))?;
        Self::map_user(&row)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query(format!("users by username: {e}")))?;
        row.as_ref().map(Self::map_user).transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query(format!("users by id: {e}")))?;
        row.as_ref().map(Self::map_user).transpose()
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT * FROM users WHERE role = ?1 ORDER BY id ASC")
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Query(format!("users by role: {e}")))?;
        rows.iter().map(Self::map_user).collect()
    }

    async fn set_reset_token(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET reset_token_hash = ?1, reset_token_expires_at = ?2 WHERE id = ?3",
        )
        .bind(token_hash)
        .bind(expires_at.to_rfc3339())
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(format!("set reset token: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    async fn list_with_active_reset_tokens(&self, now: DateTime<Utc>) -> Result<Vec<User>> {
        // RFC 3339 UTC strings compare lexicographically.
        let rows = sqlx::query(
            "SELECT * FROM users
             WHERE reset_token_hash IS NOT NULL AND reset_token_expires_at > ?1
             ORDER BY id ASC",
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Query(format!("active reset tokens: {e}")))?;
        rows.iter().map(Self::map_user).collect()
    }

    async fn complete_password_reset(&self, user_id: i64, password_hash: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users
             SET password_hash = ?1, reset_token_hash = NULL, reset_token_expires_at = NULL
             WHERE id = ?2",
        )
        .bind(password_hash)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(format!("complete password reset: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl TicketRepository for SqliteStore {
    async fn insert(&self, ticket: NewTicket) -> Result<Ticket> {
        let snapshot = ticket
            .telemetry_snapshot
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let created_at = Utc::now().to_rfc3339();

        // Insert and read-back in one transaction so a returned ticket is
        // always the committed row.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Query(format!("begin ticket insert: {e}")))?;

        let result = sqlx::query(
            r#"
            INSERT INTO tickets
                (title, description, priority, status, vehicle_id,
                 telemetry_snapshot, assigned_to, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&ticket.title)
        .bind(&ticket.description)
        .bind(&ticket.priority)
        .bind(ticket.status.as_str())
        .bind(&ticket.vehicle_id)
        .bind(&snapshot)
        .bind(ticket.assigned_to)
        .bind(&created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Query(format!("tickets insert: {e}")))?;

        let row = sqlx::query("SELECT * FROM tickets WHERE id = ?1")
            .bind(result.last_insert_rowid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StorageError::Query(format!("tickets select after insert: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Query(format!("commit ticket insert: {e}")))?;

        Self::map_ticket(&row)
    }

    async fn count_open_by_assignee(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tickets WHERE assigned_to = ?1 AND status = 'open'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Query(format!("open ticket count: {e}")))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn store() -> SqliteStore {
        SqliteStore::new(":memory:").await.unwrap()
    }

    fn new_user(username: &str, role: Role) -> NewUser {
        NewUser {
            username: username.into(),
            password_hash: "hash".into(),
            role,
            email: None,
            phone: None,
        }
    }

    #[tokio::test]
    async fn create_and_find_user() {
        let store = store().await;
        let created = store.create(new_user("alice", Role::Driver)).await.unwrap();
        assert!(created.id > 0);
        assert_eq!(created.role, Role::Driver);

        let found = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(store.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_conflict() {
        let store = store().await;
        store.create(new_user("alice", Role::Driver)).await.unwrap();
        let err = store
            .create(new_user("alice", Role::Technician))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn list_by_role_orders_by_id() {
        let store = store().await;
        store.create(new_user("t2", Role::Technician)).await.unwrap();
        store.create(new_user("d1", Role::Driver)).await.unwrap();
        store.create(new_user("t1", Role::Technician)).await.unwrap();

        let techs = store.list_by_role(Role::Technician).await.unwrap();
        assert_eq!(techs.len(), 2);
        assert!(techs[0].id < techs[1].id);
        assert_eq!(techs[0].username, "t2");
    }

    #[tokio::test]
    async fn reset_token_lifecycle() {
        let store = store().await;
        let user = store.create(new_user("alice", Role::Driver)).await.unwrap();

        let expires = Utc::now() + Duration::hours(1);
        store
            .set_reset_token(user.id, "token-hash", expires)
            .await
            .unwrap();

        let active = store
            .list_with_active_reset_tokens(Utc::now())
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].reset_token_hash.as_deref(), Some("token-hash"));

        // Expired tokens drop out of the candidate list.
        let later = Utc::now() + Duration::hours(2);
        assert!(store
            .list_with_active_reset_tokens(later)
            .await
            .unwrap()
            .is_empty());

        store
            .complete_password_reset(user.id, "new-hash")
            .await
            .unwrap();
        let user = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.password_hash, "new-hash");
        assert!(user.reset_token_hash.is_none());
        assert!(user.reset_token_expires_at.is_none());
    }

    #[tokio::test]
    async fn reset_token_for_missing_user_is_not_found() {
        let store = store().await;
        let err = store
            .set_reset_token(404, "h", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn ticket_insert_roundtrip() {
        let store = store().await;
        let tech = store.create(new_user("tech", Role::Technician)).await.unwrap();

        let ticket = store
            .insert(NewTicket {
                title: "Coolant leak".into(),
                description: Some("Puddle under vehicle".into()),
                priority: "high".into(),
                status: TicketStatus::Open,
                vehicle_id: Some("EV-007".into()),
                telemetry_snapshot: Some(serde_json::json!({"coolant_temp": 88.5})),
                assigned_to: Some(tech.id),
            })
            .await
            .unwrap();

        assert!(ticket.id > 0);
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.assigned_to, Some(tech.id));
        assert_eq!(
            ticket.telemetry_snapshot.unwrap()["coolant_temp"]
                .as_f64()
                .unwrap(),
            88.5
        );
    }

    #[tokio::test]
    async fn open_ticket_counts_ignore_closed() {
        let store = store().await;
        let tech = store.create(new_user("tech", Role::Technician)).await.unwrap();

        for status in [TicketStatus::Open, TicketStatus::Open, TicketStatus::Closed] {
            store
                .insert(NewTicket {
                    title: "t".into(),
                    description: None,
                    priority: "normal".into(),
                    status,
                    vehicle_id: None,
                    telemetry_snapshot: None,
                    assigned_to: Some(tech.id),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.count_open_by_assignee(tech.id).await.unwrap(), 2);
        assert_eq!(store.count_open_by_assignee(9999).await.unwrap(), 0);
    }
}
