//! Mapping from domain errors onto HTTP responses.
//!
//! Handlers return `Result<_, ApiError>` and bubble domain errors up with
//! `?`; the conversion below is the single place that decides status codes.
//! Internal failures never leak detail to the client — the real error is
//! logged and the body carries a generic message.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use voltdesk_core::error::{AuthError, Error};

/// An error ready to be rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

/// JSON error body: `{"detail": "..."}`.
#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(msg) => Self::new(StatusCode::UNPROCESSABLE_ENTITY, msg),
            // A hashing failure is an internal fault, not a credential problem.
            Error::Auth(AuthError::HashingFailed(reason)) => {
                tracing::error!(reason = %reason, "Password hashing failed");
                Self::internal()
            }
            Error::Auth(e) => Self::new(StatusCode::UNAUTHORIZED, e.to_string()),
            Error::Conflict(msg) => Self::new(StatusCode::BAD_REQUEST, msg),
            Error::NotFound(msg) => Self::new(StatusCode::NOT_FOUND, msg),
            other => {
                tracing::error!(error = %other, "Unhandled error at the HTTP boundary");
                Self::internal()
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Error::Auth(err).into()
    }
}

impl ApiError {
    fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "An internal error occurred. Please try again later.",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        let mut response = (status, Json(ErrorBody { detail: self.detail })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
