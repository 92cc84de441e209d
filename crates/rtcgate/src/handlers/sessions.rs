//! Command dispatch for POST requests.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::Response;
use rtcgate_protocol::{Command, GatewayMessage, PluginData, Request, error_codes};
use tracing::debug;

use super::parse_session_id;
use crate::error::GatewayError;
use crate::plugin::{HandleRef, PluginMessage, PluginResult};
use crate::response;
use crate::server::AppState;
use crate::session::Session;

/// POST {base}
pub async fn create_session(State(state): State<AppState>, body: Bytes) -> Response {
    let (transaction, command) = match decode(&body) {
        Ok(decoded) => decoded,
        Err((transaction, e)) => return response::error(transaction, None, &e),
    };
    if command.targets_session() {
        return response::error(transaction, None, &wrong_path(&command));
    }

    let session = state.sessions.create();
    response::ok(&GatewayMessage::session_created(transaction, session.id()))
}

/// POST {base}/{session_id}
pub async fn session_request(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Response {
    let session_id = match parse_session_id(&session_id) {
        Ok(id) => id,
        Err(e) => return response::error(None, None, &e),
    };
    let (transaction, command) = match decode(&body) {
        Ok(decoded) => decoded,
        Err((transaction, e)) => return response::error(transaction, Some(session_id), &e),
    };
    let Some(session) = state.sessions.find(session_id) else {
        return response::error(
            transaction,
            Some(session_id),
            &GatewayError::SessionNotFound(session_id),
        );
    };
    session.touch();

    let verb = command.verb();
    match dispatch(&state, &session, transaction.clone(), command).await {
        Ok(reply) => response::ok(&reply),
        Err(e) => {
            debug!(session_id, request = verb, error = %e, "Request failed");
            response::error(transaction, Some(session_id), &e)
        }
    }
}

/// Parse the body, keeping the transaction around for error replies.
fn decode(body: &[u8]) -> Result<(Option<String>, Command), (Option<String>, GatewayError)> {
    let request = Request::from_slice(body).map_err(|e| (None, GatewayError::from(e)))?;
    let transaction = request.transaction().map(str::to_string);
    match request.command() {
        Ok(command) => Ok((transaction, command)),
        Err(e) => Err((transaction, GatewayError::from(e))),
    }
}

fn wrong_path(command: &Command) -> GatewayError {
    GatewayError::InvalidPath(format!(
        "Unhandled request '{}' at this path",
        command.verb()
    ))
}

async fn dispatch(
    state: &AppState,
    session: &Session,
    transaction: Option<String>,
    command: Command,
) -> Result<GatewayMessage, GatewayError> {
    let session_id = session.id();
    match command {
        Command::Create => Err(wrong_path(&Command::Create)),
        Command::Attach { plugin } => {
            let handle_id = session.attach(&state.plugins, &plugin).await?;
            Ok(GatewayMessage::handle_attached(
                transaction,
                session_id,
                handle_id,
            ))
        }
        Command::Message {
            handle_id,
            body,
            jsep,
        } => {
            let handle = session.handle(handle_id)?;
            let message = PluginMessage {
                transaction: transaction.clone(),
                body,
                jsep,
            };
            let result = handle
                .plugin
                .handle_message(HandleRef::new(session_id, handle_id), message)
                .await
                .map_err(|e| GatewayError::PluginRejected {
                    code: error_codes::PLUGIN_MESSAGE,
                    reason: e.to_string(),
                })?;
            Ok(match result {
                PluginResult::Ok(data) => GatewayMessage::plugin_success(
                    transaction,
                    session_id,
                    handle_id,
                    PluginData {
                        plugin: handle.package().to_string(),
                        data,
                    },
                ),
                PluginResult::OkWait(hint) => GatewayMessage::ack(transaction, session_id, hint),
            })
        }
        Command::Detach { handle_id } => {
            session.detach(handle_id)?;
            Ok(GatewayMessage::success(transaction, session_id))
        }
        Command::Destroy => {
            state.sessions.destroy(session_id)?;
            Ok(GatewayMessage::success(transaction, session_id))
        }
        Command::Keepalive => Ok(GatewayMessage::ack(transaction, session_id, None)),
    }
}
