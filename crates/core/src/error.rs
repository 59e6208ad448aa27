//! Error types for the VoltDesk domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant; the HTTP boundary maps
//! these onto status codes in one place.

use thiserror::Error;

/// The top-level error type for all VoltDesk operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Authentication errors ---
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    // --- Persistence errors ---
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // --- Notification errors ---
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    // --- Request validation ---
    #[error("Validation error: {0}")]
    Validation(String),

    // --- Uniqueness violations (duplicate username/email) ---
    #[error("Conflict: {0}")]
    Conflict(String),

    // --- Missing records ---
    #[error("Not found: {0}")]
    NotFound(String),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Credential and token failures.
///
/// Deliberately coarse: callers only learn that a token or credential was
/// rejected, never which check failed, so the API cannot be used as an oracle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidOrExpired,

    #[error("Missing bearer token")]
    MissingToken,

    #[error("Password hashing failed: {0}")]
    HashingFailed(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Sender not configured: {0}")]
    NotConfigured(String),

    #[error("Delivery failed to {recipient}: {reason}")]
    DeliveryFailed { recipient: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_displays_correctly() {
        let err = Error::Auth(AuthError::InvalidOrExpired);
        assert!(err.to_string().contains("Invalid or expired"));
    }

    #[test]
    fn storage_error_wraps_into_top_level() {
        let err: Error = StorageError::Query("tickets insert: disk full".into()).into();
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn auth_error_hides_failure_detail() {
        // Both a bad signature and an expired exp surface identically.
        assert_eq!(AuthError::InvalidOrExpired, AuthError::InvalidOrExpired);
        assert_ne!(AuthError::InvalidOrExpired, AuthError::InvalidCredentials);
    }
}
