//! WebSocket handler
//!
//! Admits an authenticated request, registers its session with the hub and then
//! starts the session loops.

use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    response::Response,
};
use futures_util::StreamExt;
use relay_core::UserId;

use super::auth::WsAuth;
use super::GatewayState;
use crate::connection::Session;

/// WebSocket upgrade handler
///
/// Authentication runs first, so a bad or missing token is answered with 401
/// whether or not the request is a valid upgrade.
pub async fn ws_handler(
    State(state): State<GatewayState>,
    WsAuth { user_id }: WsAuth,
    ws: WebSocketUpgrade,
) -> Response {
    let max_message_size = state.session_config().max_message_size;

    ws.max_message_size(max_message_size)
        .on_failed_upgrade(move |e| {
            tracing::warn!(user_id = %user_id, error = %e, "WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| handle_socket(state, user_id, socket))
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(state: GatewayState, user_id: UserId, socket: WebSocket) {
    let (session, sender) = Session::open(user_id, state.outbound_buffer());

    tracing::info!(
        session_id = %session.id(),
        user_id = %user_id,
        "WebSocket connection established"
    );

    // Registered before the loops start so nothing sent in between is lost
    state.hub().register(user_id, session.id(), sender).await;

    let (sink, stream) = socket.split();
    session
        .run(state.hub().clone(), sink, stream, state.session_config())
        .await;
}
