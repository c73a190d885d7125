//! Session lifecycle

use std::fmt;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, Stream};
use relay_common::HubConfig;
use relay_core::UserId;
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

use super::reader::{read_loop, ReadEnd};
use super::writer::write_loop;
use crate::hub::Hub;
use crate::protocol::Frame;

/// Unique id of one live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-connection limits and timers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Largest inbound message, in bytes
    pub max_message_size: usize,
    /// The read side gives up after this long without any frame
    pub pong_timeout: Duration,
    /// Keepalive ping period
    pub ping_interval: Duration,
    /// Deadline for each write
    pub write_timeout: Duration,
}

impl From<&HubConfig> for SessionConfig {
    fn from(config: &HubConfig) -> Self {
        Self {
            max_message_size: config.max_message_size,
            pong_timeout: config.pong_timeout(),
            ping_interval: config.ping_interval(),
            write_timeout: config.write_timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&HubConfig::default())
    }
}

/// One admitted connection, before its loops are started
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    user_id: UserId,
    outbound: mpsc::Receiver<Frame>,
}

impl Session {
    /// Create a session and the sending half of its outbound queue
    ///
    /// The sender goes to the hub registry; the session keeps the receiver.
    pub fn open(user_id: UserId, capacity: usize) -> (Self, mpsc::Sender<Frame>) {
        let (sender, outbound) = mpsc::channel(capacity.max(1));
        let session = Self {
            id: SessionId::generate(),
            user_id,
            outbound,
        };
        (session, sender)
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Drive the connection until either direction ends, then unregister
    ///
    /// When the read side ends first, the write side is given one write deadline
    /// to flush and send its close frame once the hub drops the queue.
    pub async fn run<S, R, E>(self, hub: Hub, sink: S, stream: R, config: SessionConfig)
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: fmt::Display + Send,
        R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let Session {
            id,
            user_id,
            outbound,
        } = self;

        tracing::info!(session_id = %id, user_id = %user_id, "Session started");

        let mut reader = tokio::spawn(read_loop(stream, hub.clone(), user_id, id, config));
        let mut writer = tokio::spawn(write_loop(sink, outbound, id, config));

        tokio::select! {
            result = &mut reader => {
                let end = result.unwrap_or(ReadEnd::Error);
                tracing::debug!(session_id = %id, reason = ?end, "Read loop ended");

                hub.unregister(user_id, id).await;
                if timeout(config.write_timeout, &mut writer).await.is_err() {
                    writer.abort();
                }
            }
            result = &mut writer => {
                if let Ok(end) = result {
                    tracing::debug!(session_id = %id, reason = ?end, "Write loop ended");
                }
                reader.abort();
                hub.unregister(user_id, id).await;
            }
        }

        tracing::info!(session_id = %id, user_id = %user_id, "Session closed");
    }
}
