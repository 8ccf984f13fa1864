//! Mapping of component errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::audit::AuditError;
use crate::db::QueryError;
use crate::dispatch::DispatchError;
use crate::probe::ProbeError;
use crate::webdav::WebdavError;

/// Error returned by handlers behind the auth gate.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Timeout(String),
    Internal(String),
    /// Probe failures keep the `{"error": ...}` shape the dashboard expects.
    Probe(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "detail": msg })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "detail": msg })),
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, json!({ "detail": msg })),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "detail": msg })),
            ApiError::Probe(msg) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg })),
        };
        (status, Json(body)).into_response()
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::InvalidInput(msg) => ApiError::BadRequest(msg),
            DispatchError::LaunchFailed { .. } => {
                tracing::error!("{}", e);
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<AuditError> for ApiError {
    fn from(e: AuditError) -> Self {
        match e {
            AuditError::NotFound(_) => ApiError::NotFound("Admin log file not found".to_string()),
            AuditError::Io(_) => {
                tracing::error!("{}", e);
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        tracing::error!("{}", e);
        match e {
            QueryError::Timeout(_) => ApiError::Timeout(e.to_string()),
            QueryError::Unavailable(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<ProbeError> for ApiError {
    fn from(e: ProbeError) -> Self {
        tracing::error!("Storage probe failed: {}", e);
        ApiError::Probe(e.to_string())
    }
}

impl From<WebdavError> for ApiError {
    fn from(e: WebdavError) -> Self {
        match e {
            WebdavError::NotFound(_) => ApiError::NotFound("WebDAV credential file not found".to_string()),
            WebdavError::Io(_) => {
                tracing::error!("{}", e);
                ApiError::Internal(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn body_of(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_query_timeout_is_gateway_timeout() {
        let resp = ApiError::from(QueryError::Timeout(Duration::from_secs(5))).into_response();
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);

        let resp = ApiError::from(QueryError::Unavailable("gone".to_string())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_probe_errors_keep_error_field() {
        let resp = ApiError::from(ProbeError::Timeout(Duration::from_secs(5))).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(resp).await["error"], "probe timed out after 5s");
    }
}
