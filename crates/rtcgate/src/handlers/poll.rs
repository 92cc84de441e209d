//! Long-poll endpoint.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use rtcgate_protocol::{GatewayMessage, ProtocolError, error_codes};
use serde::Deserialize;
use tracing::{debug, warn};

use super::parse_session_id;
use crate::error::GatewayError;
use crate::response;
use crate::server::AppState;
use crate::session::{Event, PollOutcome};

#[derive(Debug, Default, Deserialize)]
pub struct PollQuery {
    /// Return up to this many events as a JSON array.
    maxev: Option<usize>,
}

/// GET {base}/{session_id}
///
/// Blocks until an event is queued for the session, the session is destroyed,
/// or the poll timeout elapses (answered with a keepalive). Only one poll per
/// session may be outstanding; a second one is rejected with 409.
pub async fn long_poll(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    query: Result<Query<PollQuery>, QueryRejection>,
) -> Response {
    let session_id = match parse_session_id(&session_id) {
        Ok(id) => id,
        Err(e) => return response::error(None, None, &e),
    };
    let Ok(Query(query)) = query else {
        return response::error(
            None,
            Some(session_id),
            &GatewayError::from(ProtocolError::InvalidElementType("maxev")),
        );
    };
    let Some(session) = state.sessions.find(session_id) else {
        return response::error(
            None,
            Some(session_id),
            &GatewayError::SessionNotFound(session_id),
        );
    };
    session.touch();

    let batch = query
        .maxev
        .map(|n| n.clamp(1, state.poll.max_events.max(1)));

    let reply = {
        let Some(guard) = session.events().register_poller() else {
            warn!(session_id, "Rejecting concurrent long poll");
            return response::error(
                None,
                Some(session_id),
                &GatewayError::ConcurrentPoll(session_id),
            );
        };

        match guard.pop_or_wait(state.poll.timeout, &state.shutdown).await {
            PollOutcome::Event(first) => match batch {
                None => response::event(first),
                Some(max) => {
                    let mut events = vec![first];
                    events.extend(guard.drain(max - 1));
                    debug!(session_id, count = events.len(), "Delivering event batch");
                    response::events(events)
                }
            },
            PollOutcome::Keepalive | PollOutcome::ShuttingDown => match batch {
                None => response::event(Event::keepalive()),
                Some(_) => response::events(vec![Event::keepalive()]),
            },
            PollOutcome::Destroyed => {
                debug!(session_id, "Long poll ended by session destruction");
                response::message(
                    StatusCode::GONE,
                    &GatewayMessage::error(
                        None,
                        Some(session_id),
                        error_codes::SESSION_NOT_FOUND,
                        "Session destroyed",
                    ),
                )
            }
        }
    };

    // The registration is gone now; a destroyed session can leave the registry.
    if session.is_destroying() {
        state.sessions.release(session_id);
    } else {
        session.touch();
    }
    reply
}
