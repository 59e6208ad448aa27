//! User domain types.
//!
//! A user is a driver, technician, or admin. Technicians are the assignment
//! targets for support tickets; admins can trigger privileged operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role a user holds in the fleet organisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Fleet driver — submits telemetry and tickets
    #[default]
    Driver,
    /// Workshop technician — receives assigned tickets
    Technician,
    /// Administrator
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Driver => "driver",
            Role::Technician => "technician",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "driver" => Ok(Role::Driver),
            "technician" => Ok(Role::Technician),
            "admin" => Ok(Role::Admin),
            other => Err(crate::error::Error::Validation(format!(
                "Unknown role: '{other}'"
            ))),
        }
    }
}

/// A persisted user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Database-generated ID
    pub id: i64,

    /// Unique login name
    pub username: String,

    /// Optional, unique when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Argon2id hash of the password — never the plaintext
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub role: Role,

    /// Argon2id hash of the outstanding reset token, if any.
    /// Cleared together with the expiry on redemption.
    #[serde(skip_serializing)]
    pub reset_token_hash: Option<String>,

    #[serde(skip_serializing)]
    pub reset_token_expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_technician(&self) -> bool {
        self.role == Role::Technician
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this user holds a reset token that has not yet expired.
    pub fn has_active_reset_token(&self, now: DateTime<Utc>) -> bool {
        self.reset_token_hash.is_some()
            && self.reset_token_expires_at.is_some_and(|exp| exp > now)
    }
}

/// Input for creating a user. The password is already hashed by the time it
/// reaches the directory.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub email: Option<String>,
    pub phone: Option<String>,
}
