//! HTTP request handlers.

mod health;
mod info;
mod poll;
mod sessions;

pub use health::{livez, readyz};
pub use info::server_info;
pub use poll::long_poll;
pub use sessions::{create_session, session_request};

use axum::http::StatusCode;
use axum::response::Response;
use rtcgate_protocol::{GatewayMessage, error_codes};

use crate::error::GatewayError;
use crate::response;

/// Fallback for paths no route matches.
pub async fn not_found() -> Response {
    response::message(
        StatusCode::NOT_FOUND,
        &GatewayMessage::error(None, None, error_codes::INVALID_REQUEST_PATH, ""),
    )
}

/// Fallback for known paths hit with an unsupported method.
pub async fn method_not_allowed() -> Response {
    response::message(
        StatusCode::METHOD_NOT_ALLOWED,
        &GatewayMessage::error(None, None, error_codes::INVALID_REQUEST_PATH, ""),
    )
}

/// Parse the session id path segment.
fn parse_session_id(raw: &str) -> Result<u64, GatewayError> {
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id != 0 && *id <= i64::MAX as u64)
        .ok_or_else(|| GatewayError::InvalidPath(format!("invalid session id '{raw}'")))
}
