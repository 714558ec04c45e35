//! Application router builder.
//!
//! Used by the binary and by the handler tests so both exercise the same
//! middleware stack.

use std::path::PathBuf;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::handlers::{auth, diagnostics, health, reports};
use crate::state::AppState;

/// Room for the form's text fields on top of two maximum-size attachments.
const FORM_OVERHEAD_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub cors_origins: Vec<String>,
    pub request_timeout: Duration,
    /// Directory served under `/media` when the local media backend is active.
    pub media_dir: Option<PathBuf>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            request_timeout: Duration::from_secs(30),
            media_dir: None,
        }
    }
}

fn api_routes(body_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/auth/anonymous", post(auth::sign_in_anonymously))
        .route(
            "/reports",
            get(reports::list).post(reports::submit).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/reports/stream", get(reports::stream))
        .route("/reports/{id}", axum::routing::patch(reports::edit).delete(reports::delete))
        .route("/reports/{id}/status", post(reports::toggle_status))
        .route("/diagnostics/stream", get(diagnostics::stream))
}

/// Builds the full [`Router`] with all middleware layers, applied bottom-up:
/// CORS, request id, tracing, request-id propagation, timeout, panic recovery.
pub fn build_router(state: AppState, config: &HttpConfig) -> Router {
    let max_file = state.reports.validator().policy().max_file_bytes;
    let body_limit = usize::try_from(max_file.saturating_mul(2).saturating_add(FORM_OVERHEAD_BYTES)).unwrap_or(usize::MAX);
    let request_id_header = HeaderName::from_static("x-request-id");

    let mut router = Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        .nest("/api/v1", api_routes(body_limit));
    if let Some(dir) = &config.media_dir {
        router = router.nest_service("/media", ServeDir::new(dir));
    }

    router
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, config.request_timeout))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(build_cors_layer(&config.cors_origins))
        .with_state(state)
}

/// Origins that fail to parse are logged and skipped.
pub fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(origin = %o, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(3600))
}
