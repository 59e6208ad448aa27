//! Single-use password-reset tokens.
//!
//! The plaintext token is high-entropy (32 random bytes, base64url) and is
//! only ever held in memory long enough to hand to a notification sender.
//! The user record stores an argon2id hash plus an expiry. Redemption scans
//! all users with a non-expired token and verifies the plaintext against
//! each stored hash — a salted hash cannot be index-looked-up directly, and
//! concurrent resets are rare enough that the linear scan is fine at this
//! scale.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use rand::RngCore;
use tracing::{debug, info};

use voltdesk_core::error::Result;
use voltdesk_core::repo::UserDirectory;
use voltdesk_core::user::User;

use crate::password::{hash_password_async, verify_password_async};

/// Generate a fresh reset-token plaintext.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Issue a reset token for `user`: store its hash and expiry on the record,
/// return the plaintext for out-of-band delivery.
pub async fn begin_reset(
    directory: &dyn UserDirectory,
    user: &User,
    ttl_minutes: i64,
) -> Result<String> {
    let plaintext = generate_token();
    let token_hash = hash_password_async(plaintext.clone()).await?;
    let expires_at = Utc::now() + Duration::minutes(ttl_minutes);
    directory
        .set_reset_token(user.id, &token_hash, expires_at)
        .await?;
    info!(user = %user.username, "Password reset token issued");
    Ok(plaintext)
}

/// Redeem a reset token: on the first user whose stored hash matches, set
/// the new password and clear the token. Returns whether anything matched —
/// never which username was attempted.
pub async fn redeem_reset_token(
    directory: &dyn UserDirectory,
    token: &str,
    new_password: &str,
) -> Result<bool> {
    let candidates = directory.list_with_active_reset_tokens(Utc::now()).await?;
    debug!(candidates = candidates.len(), "Scanning active reset tokens");

    for user in candidates {
        let Some(hash) = user.reset_token_hash.clone() else {
            continue;
        };
        if verify_password_async(token.to_string(), hash).await {
            let password_hash = hash_password_async(new_password.to_string()).await?;
            directory
                .complete_password_reset(user.id, &password_hash)
                .await?;
            info!(user = %user.username, "Password reset completed");
            return Ok(true);
        }
    }
    Ok(false)
}
