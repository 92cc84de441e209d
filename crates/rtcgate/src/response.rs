//! JSON reply helpers shared by the handlers.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rtcgate_protocol::GatewayMessage;
use serde_json::Value;
use tracing::error;

use crate::error::GatewayError;
use crate::session::Event;

/// Serialize a protocol message with the given status.
pub fn message(status: StatusCode, message: &GatewayMessage) -> Response {
    (status, Json(message)).into_response()
}

pub fn ok(reply: &GatewayMessage) -> Response {
    message(StatusCode::OK, reply)
}

/// Structured error reply echoing the request's transaction.
pub fn error(
    transaction: Option<String>,
    session_id: Option<u64>,
    err: &GatewayError,
) -> Response {
    message(
        err.status(),
        &GatewayMessage::error(transaction, session_id, err.code(), err.to_string()),
    )
}

/// Write a dequeued event. The event, and its payload if allocated, is
/// released once the body has been built.
pub fn event(event: Event) -> Response {
    let status = StatusCode::from_u16(event.status).unwrap_or(StatusCode::OK);
    match payload(event) {
        Ok(value) => (status, Json(value)).into_response(),
        Err(e) => error(None, None, &e),
    }
}

/// Write several events as one JSON array.
pub fn events(events: Vec<Event>) -> Response {
    match events.into_iter().map(payload).collect::<Result<Vec<_>, _>>() {
        Ok(batch) => (StatusCode::OK, Json(batch)).into_response(),
        Err(e) => error(None, None, &e),
    }
}

fn payload(event: Event) -> Result<Value, GatewayError> {
    serde_json::from_str(&event.payload).map_err(|e| {
        error!(error = %e, "Queued event is not valid JSON");
        GatewayError::Internal(e.to_string())
    })
}
