//! Request gate applied to every protected route.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{authorization::Basic, Authorization, HeaderMapExt};
use std::net::SocketAddr;

use super::{AuthError, Credentials};
use crate::web::AppState;

/// Authenticate the request and attach the [`super::Operator`] extension.
pub async fn require_operator(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut req: Request,
    next: Next,
) -> Response {
    let credentials = match req.headers().typed_get::<Authorization<Basic>>() {
        Some(Authorization(basic)) => Credentials {
            username: basic.username().to_string(),
            password: basic.password().to_string(),
        },
        None => return AuthError::MissingCredentials.into_response(),
    };

    let source = source_address(req.headers(), peer, state.config.trust_forwarded_for);

    // The ledger transaction may wait on the SQLite busy timeout
    let guard = state.guard.clone();
    let verdict = tokio::task::spawn_blocking(move || guard.authenticate(&source, &credentials))
        .await
        .unwrap_or_else(|e| Err(AuthError::Task(e.to_string())));

    match verdict {
        Ok(operator) => {
            req.extensions_mut().insert(operator);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

/// Client address used for lockout accounting.
fn source_address(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(addr) = forwarded {
            return addr.to_string();
        }
    }
    peer.ip().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_address() {
        let peer = SocketAddr::from(([192, 168, 50, 10], 51000));
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());

        assert_eq!(source_address(&headers, peer, false), "192.168.50.10");
        assert_eq!(source_address(&headers, peer, true), "203.0.113.7");
        assert_eq!(source_address(&HeaderMap::new(), peer, true), "192.168.50.10");
    }
}
