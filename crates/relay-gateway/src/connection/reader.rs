//! Read loop

use std::fmt;

use axum::extract::ws::Message;
use futures::{Stream, StreamExt};
use relay_core::UserId;
use tokio::time::timeout;

use super::{SessionConfig, SessionId};
use crate::hub::Hub;
use crate::protocol::ClientFrame;

/// Why a read loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    /// The peer closed the connection or the stream ended
    Closed,
    /// No frame arrived within the pong timeout
    TimedOut,
    /// A frame exceeded the maximum message size
    Oversized,
    /// Transport error
    Error,
}

/// Read frames until the connection ends
///
/// Every frame, pongs included, resets the inactivity deadline and counts as
/// user activity. Typing frames are forwarded to the hub; everything else is
/// dropped.
pub(crate) async fn read_loop<R, E>(
    mut stream: R,
    hub: Hub,
    user_id: UserId,
    session_id: SessionId,
    config: SessionConfig,
) -> ReadEnd
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    loop {
        let message = match timeout(config.pong_timeout, stream.next()).await {
            Err(_) => {
                tracing::info!(session_id = %session_id, "Read deadline passed, closing session");
                return ReadEnd::TimedOut;
            }
            Ok(None) => return ReadEnd::Closed,
            Ok(Some(Err(e))) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket read error");
                return ReadEnd::Error;
            }
            Ok(Some(Ok(message))) => message,
        };

        hub.record_activity(user_id);

        match message {
            Message::Text(text) => {
                if text.len() > config.max_message_size {
                    tracing::warn!(session_id = %session_id, size = text.len(), "Inbound message too large");
                    return ReadEnd::Oversized;
                }
                handle_text(&hub, user_id, session_id, &text).await;
            }
            Message::Binary(data) => {
                if data.len() > config.max_message_size {
                    tracing::warn!(session_id = %session_id, size = data.len(), "Inbound message too large");
                    return ReadEnd::Oversized;
                }
                tracing::trace!(session_id = %session_id, "Binary frame ignored");
            }
            Message::Ping(_) | Message::Pong(_) => {
                // Axum answers pings itself
            }
            Message::Close(_) => {
                tracing::debug!(session_id = %session_id, "Client closed connection");
                return ReadEnd::Closed;
            }
        }
    }
}

async fn handle_text(hub: &Hub, user_id: UserId, session_id: SessionId, text: &str) {
    let frame = ClientFrame::decode(text);
    match frame.typing() {
        Some((conversation_id, kind)) => {
            hub.broadcast_typing(conversation_id, user_id, kind).await;
        }
        None => {
            tracing::trace!(session_id = %session_id, "Unrecognized client frame dropped");
        }
    }
}
