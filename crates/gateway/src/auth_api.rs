//! Account and credential endpoints.
//!
//! Registration, the OAuth2-style password login form, refresh-token
//! exchange, and the password-reset pair (`/auth/forgot`, `/auth/reset`).
//! The forgot endpoint always answers 202 with the same body so it cannot be
//! used to probe which usernames exist.

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::Extension;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use voltdesk_auth::reset;
use voltdesk_auth::password::{hash_password_async, verify_password_async};
use voltdesk_core::error::{AuthError, Error};
use voltdesk_core::user::{NewUser, Role, User};

use crate::error::ApiError;
use crate::SharedState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

pub async fn register_handler(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    if req.username.trim().is_empty() {
        return Err(Error::Validation("username must not be empty".into()).into());
    }
    if req.password.is_empty() {
        return Err(Error::Validation("password must not be empty".into()).into());
    }

    let password_hash = hash_password_async(req.password).await?;
    let user = state
        .directory
        .create(NewUser {
            username: req.username,
            password_hash,
            role: req.role,
            email: req.email,
            phone: req.phone,
        })
        .await?;

    info!(username = %user.username, role = %user.role, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user.id,
            username: user.username,
            role: user.role,
        }),
    ))
}

/// `application/x-www-form-urlencoded` login body.
#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

pub async fn token_handler(
    State(state): State<SharedState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let user = state
        .directory
        .find_by_username(&form.username)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password_async(form.password, user.password_hash.clone()).await {
        warn!(username = %form.username, "Failed login attempt");
        return Err(AuthError::InvalidCredentials.into());
    }

    let access_token = state.tokens.issue_access_token(&user.username, user.role)?;
    let refresh_token = state.tokens.issue_refresh_token(&user.username, user.role)?;

    info!(username = %user.username, "Login succeeded");
    Ok(Json(TokenPairResponse {
        access_token,
        refresh_token,
        token_type: "bearer",
    }))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

/// Exchange a refresh token for a fresh access token. An access token posted
/// here is rejected outright.
pub async fn refresh_handler(
    State(state): State<SharedState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<AccessTokenResponse>, ApiError> {
    let claims = state.tokens.verify_refresh(&req.refresh_token)?;

    // The account may have been removed since the refresh token was issued.
    let user = state
        .directory
        .find_by_username(&claims.sub)
        .await?
        .ok_or(AuthError::InvalidOrExpired)?;

    let access_token = state.tokens.issue_access_token(&user.username, user.role)?;
    Ok(Json(AccessTokenResponse {
        access_token,
        token_type: "bearer",
    }))
}

#[derive(Deserialize)]
pub struct ForgotRequest {
    pub username: String,
}

#[derive(Serialize)]
pub struct DetailResponse {
    pub detail: String,
}

/// Begin a password reset. The response is identical whether or not the
/// account exists; token generation and delivery happen after the response
/// is sent.
pub async fn forgot_handler(
    State(state): State<SharedState>,
    Json(req): Json<ForgotRequest>,
) -> Result<(StatusCode, Json<DetailResponse>), ApiError> {
    if let Some(user) = state.directory.find_by_username(&req.username).await? {
        let state = state.clone();
        tokio::spawn(async move {
            let ttl = state.config.auth.reset_ttl_minutes;
            match reset::begin_reset(state.directory.as_ref(), &user, ttl).await {
                Ok(token) => deliver_reset_token(&state, &user, &token).await,
                Err(e) => error!(error = %e, "Failed to issue reset token"),
            }
        });
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(DetailResponse {
            detail: "If the account exists, a reset token has been sent.".into(),
        }),
    ))
}

/// Hand the plaintext token to every configured sender that has an address
/// for this user. Failures are logged, never surfaced.
async fn deliver_reset_token(state: &SharedState, user: &User, token: &str) {
    let subject = format!("{} password reset", state.config.app_name);
    let body = format!(
        "Your {} password reset token: {token}\nIt expires in {} minutes.",
        state.config.app_name, state.config.auth.reset_ttl_minutes
    );

    for notifier in &state.notifiers {
        let recipient = match notifier.name() {
            "email" => user.email.as_deref(),
            "sms" => user.phone.as_deref(),
            _ => None,
        };
        let Some(recipient) = recipient else {
            continue;
        };
        if let Err(e) = notifier.send(recipient, &subject, &body).await {
            warn!(sender = notifier.name(), error = %e, "Reset token delivery failed");
        }
    }
}

#[derive(Deserialize)]
pub struct ResetRequest {
    pub token: String,
    pub new_password: String,
}

pub async fn reset_handler(
    State(state): State<SharedState>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<DetailResponse>, ApiError> {
    if req.new_password.is_empty() {
        return Err(Error::Validation("new_password must not be empty".into()).into());
    }

    let redeemed =
        reset::redeem_reset_token(state.directory.as_ref(), &req.token, &req.new_password).await?;
    if !redeemed {
        return Err(AuthError::InvalidOrExpired.into());
    }

    Ok(Json(DetailResponse {
        detail: "Password updated".into(),
    }))
}

/// The authenticated caller's own profile. Secret columns never serialize.
pub async fn me_handler(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}
