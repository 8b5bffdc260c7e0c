//! HTTP API server for the companion

pub mod characters;
pub mod health;
pub mod rate_limit;
pub mod session;
pub mod voice;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::pipeline::TurnPipeline;
use crate::voice::VoiceCatalog;
use crate::{Error, Result};

/// Largest accepted request body (recorded audio)
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<TurnPipeline>,
    /// Voice listing, present when a synthesis provider is configured
    pub voices: Option<Arc<dyn VoiceCatalog>>,
    /// Deadline for a voice catalogue query
    pub catalog_timeout: std::time::Duration,
    /// Voice name shown on the talk screen
    pub voice_name: String,
    /// Idle sessions older than this are dropped when new sessions arrive
    pub session_ttl: std::time::Duration,
    pub rate_limiter: Option<rate_limit::TurnLimiter>,
}

/// Build the full application router
pub fn app(state: Arc<ApiState>) -> Router {
    app_with_static(state, None)
}

/// Application router that also serves a frontend from `static_dir`
pub fn app_with_static(state: Arc<ApiState>, static_dir: Option<&Path>) -> Router {
    let session_routes = Router::new()
        .merge(voice::router(state.clone()))
        .merge(characters::router(state.clone()))
        .layer(axum::middleware::from_fn_with_state(
            state,
            session::session_middleware,
        ));

    // CORS layer for cross-origin requests from frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .merge(session_routes)
        .merge(health::router());

    if let Some(static_dir) = static_dir {
        let index_file = static_dir.join("index.html");
        let serve_dir = ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file));
        router = router.fallback_service(serve_dir);
        tracing::info!(path = %static_dir.display(), "serving static files");
    }

    router
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Create a server for `state` on `port`
    #[must_use]
    pub const fn new(state: Arc<ApiState>, port: u16) -> Self {
        Self {
            state,
            port,
            static_dir: None,
        }
    }

    /// Serve the frontend from `dir` for any path no route claims
    #[must_use]
    pub fn with_static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, app_with_static(self.state, self.static_dir.as_deref()))
            .await
            .map_err(|e| Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }
}

/// API errors
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// Turn budget exhausted; carries the wait until the next admission
    RateLimited(std::time::Duration),
    Turn(Error),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::Turn(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let retry_after = match &self {
            Self::RateLimited(wait) => Some(retry_after_secs(*wait)),
            _ => None,
        };

        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::RateLimited(wait) => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                format!("too many turns, retry in {}s", retry_after_secs(wait)),
            ),
            Self::Turn(e) => {
                let message = e.to_string();
                match e {
                    Error::Transcription(_) => {
                        (StatusCode::BAD_GATEWAY, "transcription_failed", message)
                    }
                    Error::Generation(_) => (StatusCode::BAD_GATEWAY, "generation_failed", message),
                    Error::Synthesis(_) => (StatusCode::BAD_GATEWAY, "synthesis_failed", message),
                    Error::FileIo { .. } | Error::Io(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "file_io_failed", message)
                    }
                    Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "bad_request", message),
                    Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", message),
                    Error::Config(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "not_configured", message)
                    }
                    Error::Serialization(_) | Error::Toml(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
                    }
                }
            }
        };

        let mut response =
            (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Whole seconds to wait, rounded up and never zero
fn retry_after_secs(wait: std::time::Duration) -> u64 {
    (wait.as_secs() + u64::from(wait.subsec_nanos() > 0)).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn error_code(e: Error) -> (StatusCode, String) {
        let response = ApiError::from(e).into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        (status, json["error"]["code"].as_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_stage_errors_have_distinct_codes() {
        let transcription = error_code(Error::Transcription("a".into())).await;
        let generation = error_code(Error::Generation("b".into())).await;
        let synthesis = error_code(Error::Synthesis("c".into())).await;

        assert_eq!(transcription, (StatusCode::BAD_GATEWAY, "transcription_failed".to_string()));
        assert_eq!(generation, (StatusCode::BAD_GATEWAY, "generation_failed".to_string()));
        assert_eq!(synthesis, (StatusCode::BAD_GATEWAY, "synthesis_failed".to_string()));
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response =
            ApiError::RateLimited(std::time::Duration::from_millis(1500)).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = ApiError::from(Error::NotFound("x.mp3".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
