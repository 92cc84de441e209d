use axum::extract::State;
use axum::response::Response;
use rtcgate_protocol::GatewayMessage;

use crate::response;
use crate::server::AppState;

/// GET {base}/info
pub async fn server_info(State(state): State<AppState>) -> Response {
    response::ok(&GatewayMessage::ServerInfo(state.info.as_ref().clone()))
}
