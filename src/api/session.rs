//! Session cookie middleware
//!
//! Resolves the caller's [`SessionId`] from the `companion_session` cookie,
//! minting a new one on first contact, and exposes it to handlers as a
//! request extension.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};

use super::ApiState;
use crate::session::SessionId;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "companion_session";

/// Attach a session to every request passing through
pub async fn session_middleware(
    State(state): State<Arc<ApiState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let sessions = state.pipeline.sessions();
    let (id, fresh) = match session_from_headers(req.headers()) {
        Some(id) => (id, false),
        None => {
            sessions.purge_idle(state.session_ttl).await;
            (SessionId::new(), true)
        }
    };

    sessions.touch(id).await;
    req.extensions_mut().insert(id);

    let mut response = next.run(req).await;

    if fresh {
        let cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(error = %e, "failed to encode session cookie"),
        }
        tracing::debug!(session = %id, "new session");
    }

    response
}

/// Session token carried in the request cookies, if any
#[must_use]
pub fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, token)| token.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_from_cookie_header() {
        let id = SessionId::new();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {SESSION_COOKIE}={id}")).unwrap(),
        );

        assert_eq!(session_from_headers(&headers), Some(id));
    }

    #[test]
    fn test_missing_or_malformed_cookie() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_from_headers(&headers), None);

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("companion_session=garbage"),
        );
        assert_eq!(session_from_headers(&headers), None);
    }
}
