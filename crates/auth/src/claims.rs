//! JWT claims embedded in VoltDesk tokens.

use serde::{Deserialize, Serialize};
use voltdesk_core::user::Role;

/// Claims carried by both access and refresh tokens.
///
/// `token_type` makes the two kinds explicitly non-interchangeable on top of
/// the disjoint key material: a refresh token presented on the access path
/// fails even if the key lists were ever misconfigured to overlap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username).
    pub sub: String,
    /// The user's role at issuance time.
    pub role: Role,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
    /// Token type: "access" or "refresh".
    pub token_type: String,
}

impl Claims {
    pub fn is_access(&self) -> bool {
        self.token_type == "access"
    }

    pub fn is_refresh(&self) -> bool {
        self.token_type == "refresh"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_serialize_role_lowercase() {
        let claims = Claims {
            sub: "alice".into(),
            role: Role::Technician,
            iat: 0,
            exp: 100,
            token_type: "access".into(),
        };
        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains("\"technician\""));
        assert!(claims.is_access());
        assert!(!claims.is_refresh());
    }
}
