//! JWT token issuance and rotation-aware verification.
//!
//! Access and refresh tokens are signed with disjoint key lists. Within each
//! list the first key is the sole signer; every key is tried in order during
//! verification, which is what makes key rollover seamless — add the new key
//! at the front, keep the old one until everything signed with it has
//! expired, then drop it.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};

use voltdesk_core::error::{AuthError, Error, Result};
use voltdesk_core::user::Role;

use crate::claims::Claims;

const TOKEN_TYPE_ACCESS: &str = "access";
const TOKEN_TYPE_REFRESH: &str = "refresh";

/// An ordered key set: one signer, many verifiers.
struct KeySet {
    signing: EncodingKey,
    verification: Vec<DecodingKey>,
}

impl KeySet {
    fn new(keys: &[String]) -> Result<Self> {
        let primary = keys.first().ok_or_else(|| {
            Error::Validation("token key list must contain at least one key".into())
        })?;
        Ok(Self {
            signing: EncodingKey::from_secret(primary.as_bytes()),
            verification: keys
                .iter()
                .map(|k| DecodingKey::from_secret(k.as_bytes()))
                .collect(),
        })
    }
}

/// Issues and verifies access/refresh tokens.
pub struct TokenService {
    access: KeySet,
    refresh: KeySet,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    /// Build a token service from ordered key lists. TTLs are not range
    /// checked here; config validation owns that.
    pub fn new(
        access_keys: &[String],
        refresh_keys: &[String],
        access_ttl_minutes: i64,
        refresh_ttl_days: i64,
    ) -> Result<Self> {
        Ok(Self {
            access: KeySet::new(access_keys)?,
            refresh: KeySet::new(refresh_keys)?,
            access_ttl: Duration::minutes(access_ttl_minutes),
            refresh_ttl: Duration::days(refresh_ttl_days),
        })
    }

    /// Issue a short-lived access token for the given subject.
    pub fn issue_access_token(&self, subject: &str, role: Role) -> Result<String> {
        self.issue(subject, role, TOKEN_TYPE_ACCESS, self.access_ttl, &self.access)
    }

    /// Issue a long-lived refresh token, signed with the refresh-only key.
    pub fn issue_refresh_token(&self, subject: &str, role: Role) -> Result<String> {
        self.issue(
            subject,
            role,
            TOKEN_TYPE_REFRESH,
            self.refresh_ttl,
            &self.refresh,
        )
    }

    fn issue(
        &self,
        subject: &str,
        role: Role,
        token_type: &str,
        ttl: Duration,
        keys: &KeySet,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            token_type: token_type.to_string(),
        };
        jsonwebtoken::encode(&Header::default(), &claims, &keys.signing)
            .map_err(|e| Error::Internal(format!("token signing failed: {e}")))
    }

    /// Verify an access token. Refresh tokens are rejected here even though
    /// they decode structurally the same.
    pub fn verify_access(&self, token: &str) -> std::result::Result<Claims, AuthError> {
        let claims = Self::verify_with(&self.access, token)?;
        if !claims.is_access() {
            return Err(AuthError::InvalidOrExpired);
        }
        Ok(claims)
    }

    /// Verify a refresh token; access tokens are rejected.
    pub fn verify_refresh(&self, token: &str) -> std::result::Result<Claims, AuthError> {
        let claims = Self::verify_with(&self.refresh, token)?;
        if !claims.is_refresh() {
            return Err(AuthError::InvalidOrExpired);
        }
        Ok(claims)
    }

    /// Subject and role extraction for WebSocket-style contexts where only
    /// the identity is needed. Same multi-key fallback as `verify_access`.
    pub fn decode_subject(&self, token: &str) -> std::result::Result<(String, Role), AuthError> {
        let claims = self.verify_access(token)?;
        Ok((claims.sub, claims.role))
    }

    /// Try each key in order; first successful decode wins. Any malformed
    /// signature, wrong key, or expired `exp` collapses into one error.
    fn verify_with(keys: &KeySet, token: &str) -> std::result::Result<Claims, AuthError> {
        let validation = Validation::default();
        for key in &keys.verification {
            if let Ok(data) = jsonwebtoken::decode::<Claims>(token, key, &validation) {
                return Ok(data.claims);
            }
        }
        Err(AuthError::InvalidOrExpired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(k: &[&str]) -> Vec<String> {
        k.iter().map(|s| s.to_string()).collect()
    }

    fn service() -> TokenService {
        TokenService::new(
            &keys(&["access-primary"]),
            &keys(&["refresh-primary"]),
            30,
            7,
        )
        .unwrap()
    }

    #[test]
    fn access_token_roundtrips_subject_and_role() {
        let svc = service();
        let token = svc.issue_access_token("alice", Role::Technician).unwrap();
        let claims = svc.verify_access(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.role, Role::Technician);
        assert!(claims.is_access());
    }

    #[test]
    fn refresh_token_rejected_on_access_path() {
        let svc = service();
        let refresh = svc.issue_refresh_token("alice", Role::Driver).unwrap();
        assert_eq!(
            svc.verify_access(&refresh).unwrap_err(),
            AuthError::InvalidOrExpired
        );
        // and the other direction
        let access = svc.issue_access_token("alice", Role::Driver).unwrap();
        assert_eq!(
            svc.verify_refresh(&access).unwrap_err(),
            AuthError::InvalidOrExpired
        );
    }

    #[test]
    fn expired_token_fails_verification() {
        // Negative TTL well past the default decoder leeway.
        let svc = TokenService::new(
            &keys(&["access-primary"]),
            &keys(&["refresh-primary"]),
            -5,
            7,
        )
        .unwrap();
        let token = svc.issue_access_token("alice", Role::Driver).unwrap();
        assert_eq!(
            svc.verify_access(&token).unwrap_err(),
            AuthError::InvalidOrExpired
        );
    }

    #[test]
    fn rotated_key_still_verifies_old_tokens() {
        let old = TokenService::new(
            &keys(&["old-key"]),
            &keys(&["refresh-primary"]),
            30,
            7,
        )
        .unwrap();
        let token = old.issue_access_token("bob", Role::Driver).unwrap();

        // After rotation the new primary signs, the old key stays verifiable.
        let rotated = TokenService::new(
            &keys(&["new-key", "old-key"]),
            &keys(&["refresh-primary"]),
            30,
            7,
        )
        .unwrap();
        let claims = rotated.verify_access(&token).unwrap();
        assert_eq!(claims.sub, "bob");
    }

    #[test]
    fn unknown_key_fails_verification() {
        let svc = service();
        let stranger = TokenService::new(
            &keys(&["some-other-key"]),
            &keys(&["refresh-primary-2"]),
            30,
            7,
        )
        .unwrap();
        let token = stranger.issue_access_token("mallory", Role::Admin).unwrap();
        assert!(svc.verify_access(&token).is_err());
    }

    #[test]
    fn garbage_token_fails_verification() {
        let svc = service();
        assert!(svc.verify_access("not-a-jwt").is_err());
        assert!(svc.decode_subject("").is_err());
    }

    #[test]
    fn decode_subject_returns_identity() {
        let svc = service();
        let token = svc.issue_access_token("carol", Role::Admin).unwrap();
        let (sub, role) = svc.decode_subject(&token).unwrap();
        assert_eq!(sub, "carol");
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn empty_key_list_rejected() {
        assert!(TokenService::new(&[], &keys(&["r"]), 30, 7).is_err());
    }
}
