//! Write loop

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message};
use futures::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};

use super::{SessionConfig, SessionId};
use crate::protocol::Frame;

/// Why a write loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteEnd {
    /// The hub closed the queue; a close frame was sent
    QueueClosed,
    /// A write did not complete within the write deadline
    TimedOut,
    /// The transport rejected a write
    Failed,
}

/// Drain the outbound queue onto the socket, pinging on every keepalive tick
pub(crate) async fn write_loop<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<Frame>,
    session_id: SessionId,
    config: SessionConfig,
) -> WriteEnd
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    let mut keepalive = interval_at(Instant::now() + config.ping_interval, config.ping_interval);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let result = tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => write(&mut sink, Message::Text(frame.to_string()), config.write_timeout).await,
                None => {
                    let close = Message::Close(Some(CloseFrame {
                        code: close_code::NORMAL,
                        reason: Cow::Borrowed(""),
                    }));
                    if write(&mut sink, close, config.write_timeout).await.is_ok() {
                        let _ = timeout(config.write_timeout, sink.close()).await;
                    }
                    tracing::debug!(session_id = %session_id, "Outbound queue closed");
                    return WriteEnd::QueueClosed;
                }
            },
            _ = keepalive.tick() => write(&mut sink, Message::Ping(Vec::new()), config.write_timeout).await,
        };

        if let Err(end) = result {
            tracing::debug!(session_id = %session_id, reason = ?end, "WebSocket write failed");
            return end;
        }
    }
}

async fn write<S>(sink: &mut S, message: Message, deadline: Duration) -> Result<(), WriteEnd>
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    match timeout(deadline, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            tracing::trace!(error = %e, "Sink rejected frame");
            Err(WriteEnd::Failed)
        }
        Err(_) => Err(WriteEnd::TimedOut),
    }
}
