use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use rtcgate_protocol::ServerInfo;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowHeaders, AllowMethods, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use crate::handlers;
use crate::plugin::PluginRegistry;
use crate::session::SessionRegistry;

/// Long-poll tuning.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    /// How long a GET waits for an event before answering with a keepalive.
    pub timeout: Duration,
    /// Upper bound for `maxev`.
    pub max_events: usize,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_events: 10,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionRegistry,
    pub plugins: PluginRegistry,
    pub poll: PollSettings,
    pub info: Arc<ServerInfo>,
    /// Cancelled when the process starts shutting down.
    pub shutdown: CancellationToken,
}

/// Build the router. The long-poll transport is mounted under `base_path`,
/// health probes at the root.
pub fn build_app(state: AppState, base_path: &str, request_timeout_secs: u64) -> Router {
    let transport = Router::new()
        .route("/", post(handlers::create_session))
        .route("/info", get(handlers::server_info))
        .route(
            "/{session_id}",
            get(handlers::long_poll).post(handlers::session_request),
        )
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .with_state(state.clone());

    let router = Router::new()
        .route("/livez", get(handlers::livez))
        .route("/readyz", get(handlers::readyz))
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .with_state(state);

    let base_path = base_path.trim_end_matches('/');
    let router = if base_path.is_empty() {
        router.merge(transport)
    } else {
        router.nest(base_path, transport)
    };

    // Browsers call the gateway cross-origin. Every OPTIONS request is
    // answered here, mirroring what the preflight asked for.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(AllowHeaders::mirror_request())
        .allow_methods(AllowMethods::mirror_request());

    router
        .fallback(handlers::not_found)
        .layer(cors)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(request_timeout_secs),
        ))
}
