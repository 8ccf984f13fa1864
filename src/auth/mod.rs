//! Operator authentication.
//!
//! HTTP Basic credentials are checked against the configured identity, and
//! every attempt goes through the attempt ledger so repeated failures from
//! one source lock that source out for a sliding window.

mod clock;
mod guard;
mod middleware;

pub use clock::*;
pub use guard::*;
pub use middleware::*;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::DbError;

/// Authentication error types.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("too many failed attempts")]
    LockedOut,
    #[error("attempt ledger unavailable: {0}")]
    Ledger(#[from] DbError),
    #[error("authentication task failed: {0}")]
    Task(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            // Fail closed: no lockout check means no access
            AuthError::Ledger(_) | AuthError::Task(_) => {
                tracing::error!("{}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Internal error" })),
                )
                    .into_response()
            }
            // Identical response for every rejection
            _ => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"orion\"")],
                Json(json!({ "detail": "Unauthorized" })),
            )
                .into_response(),
        }
    }
}
