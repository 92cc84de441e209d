//! Gateway error taxonomy.
//!
//! Every error raised while serving a request ends up here and is turned into
//! a structured JSON reply at the transport boundary.

use axum::http::StatusCode;
use rtcgate_protocol::{ProtocolError, error_codes};
use thiserror::Error;

/// Coarse classification of [`GatewayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedRequest,
    UnknownCommand,
    SessionNotFound,
    HandleNotFound,
    PluginNotFound,
    ConcurrentPollConflict,
    PluginRejected,
    InternalFailure,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The command is not valid at the path it was sent to.
    #[error("{0}")]
    InvalidPath(String),

    #[error("no such session {0}")]
    SessionNotFound(u64),

    #[error("no such handle {handle_id} in session {session_id}")]
    HandleNotFound { session_id: u64, handle_id: u64 },

    #[error("no such plugin '{0}'")]
    PluginNotFound(String),

    #[error("session {0} already has a long poll in progress")]
    ConcurrentPoll(u64),

    /// The plugin refused the request. `code` is one of the plugin error codes.
    #[error("{reason}")]
    PluginRejected { code: i32, reason: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Protocol(ProtocolError::UnknownRequest(_)) => ErrorKind::UnknownCommand,
            GatewayError::Protocol(_) | GatewayError::InvalidPath(_) => ErrorKind::MalformedRequest,
            GatewayError::SessionNotFound(_) => ErrorKind::SessionNotFound,
            GatewayError::HandleNotFound { .. } => ErrorKind::HandleNotFound,
            GatewayError::PluginNotFound(_) => ErrorKind::PluginNotFound,
            GatewayError::ConcurrentPoll(_) => ErrorKind::ConcurrentPollConflict,
            GatewayError::PluginRejected { .. } => ErrorKind::PluginRejected,
            GatewayError::Internal(_) => ErrorKind::InternalFailure,
        }
    }

    /// Stable numeric code reported in the error body.
    pub fn code(&self) -> i32 {
        match self {
            GatewayError::Protocol(e) => e.code(),
            GatewayError::InvalidPath(_) => error_codes::INVALID_REQUEST_PATH,
            GatewayError::SessionNotFound(_) => error_codes::SESSION_NOT_FOUND,
            GatewayError::HandleNotFound { .. } => error_codes::HANDLE_NOT_FOUND,
            GatewayError::PluginNotFound(_) => error_codes::PLUGIN_NOT_FOUND,
            GatewayError::ConcurrentPoll(_) => error_codes::SESSION_CONFLICT,
            GatewayError::PluginRejected { code, .. } => *code,
            GatewayError::Internal(_) => error_codes::UNKNOWN,
        }
    }

    /// HTTP status used when this error terminates a request.
    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::MalformedRequest | ErrorKind::UnknownCommand => StatusCode::BAD_REQUEST,
            ErrorKind::SessionNotFound | ErrorKind::HandleNotFound | ErrorKind::PluginNotFound => {
                StatusCode::NOT_FOUND
            }
            ErrorKind::ConcurrentPollConflict => StatusCode::CONFLICT,
            ErrorKind::PluginRejected => StatusCode::BAD_REQUEST,
            ErrorKind::InternalFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
