//! Registry and broadcast hub
//!
//! `Hub` is a cheap, cloneable handle. Store lookups for a broadcast run on the
//! caller's task; the resulting frame is handed to the coordinator, which alone
//! touches the registry. All broadcasts are fire-and-forget: failures are logged
//! and never reach the caller.

mod coordinator;
mod registry;

pub use registry::{DeliveryReport, HubStats, Registry, Removal};

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use relay_common::HubConfig;
use relay_core::{ConversationId, HubStore, MessageId, UserId};
use tokio::sync::{mpsc, oneshot};

use self::coordinator::{Coordinator, HubCommand};
use crate::connection::SessionId;
use crate::protocol::{
    ConversationChange, Frame, MessagePayload, PresencePayload, PresenceStatus,
    ReadReceiptPayload, TypingKind, TypingPayload, WireMessage,
};

/// Username used when the sender's profile cannot be loaded
const UNKNOWN_USERNAME: &str = "unknown";

/// Username shown on system announcements
const SYSTEM_USERNAME: &str = "system";

/// Handle to the broadcast hub
#[derive(Clone)]
pub struct Hub {
    commands: mpsc::Sender<HubCommand>,
    store: Arc<dyn HubStore>,
    echo_to_sender: bool,
}

impl Hub {
    /// Spawn the coordinator task and return a handle to it
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(store: Arc<dyn HubStore>, config: &HubConfig) -> Self {
        let (commands, receiver) = mpsc::channel(config.command_buffer.max(1));
        let coordinator = Coordinator::new(
            receiver,
            commands.downgrade(),
            Arc::clone(&store),
            config.echo_to_sender,
        );
        tokio::spawn(coordinator.run());

        Self {
            commands,
            store,
            echo_to_sender: config.echo_to_sender,
        }
    }

    /// The store the hub consults
    pub fn store(&self) -> &Arc<dyn HubStore> {
        &self.store
    }

    /// Queue a command for the coordinator
    ///
    /// This is where the hub applies backpressure: once `command_buffer` commands are
    /// waiting, callers suspend here until the coordinator catches up. Commands are only
    /// dropped after the hub has stopped.
    async fn send(&self, command: HubCommand) -> bool {
        if self.commands.send(command).await.is_err() {
            tracing::debug!("Hub is stopped, command dropped");
            return false;
        }
        true
    }

    // === Registry ===

    /// Add a session's outbound queue to the registry
    ///
    /// The hub keeps the only sender; the queue closes when the session is
    /// unregistered, dropped for backpressure, or the hub shuts down.
    pub async fn register(&self, user_id: UserId, session_id: SessionId, sender: mpsc::Sender<Frame>) {
        self.send(HubCommand::Register {
            user_id,
            session_id,
            sender,
        })
        .await;
    }

    /// Remove a session. Unknown sessions are ignored.
    pub async fn unregister(&self, user_id: UserId, session_id: SessionId) {
        self.send(HubCommand::Unregister {
            user_id,
            session_id,
        })
        .await;
    }

    /// Registry counts, or `None` if the hub has stopped
    pub async fn stats(&self) -> Option<HubStats> {
        let (reply, rx) = oneshot::channel();
        if !self.send(HubCommand::Stats { reply }).await {
            return None;
        }
        rx.await.ok()
    }

    /// Number of live sessions for a user
    pub async fn session_count(&self, user_id: UserId) -> usize {
        let (reply, rx) = oneshot::channel();
        if !self.send(HubCommand::SessionCount { user_id, reply }).await {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    pub async fn is_online(&self, user_id: UserId) -> bool {
        self.session_count(user_id).await > 0
    }

    /// Close every session queue and stop the coordinator
    ///
    /// Returns the number of sessions that were closed.
    pub async fn shutdown(&self) -> usize {
        let (done, rx) = oneshot::channel();
        if !self.send(HubCommand::Shutdown { done }).await {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Record that a user is active without waiting for the store
    pub fn record_activity(&self, user_id: UserId) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.touch_last_active(user_id).await {
                tracing::debug!(user_id = %user_id, error = %e, "Failed to update last active time");
            }
        });
    }

    async fn deliver(&self, recipients: Vec<UserId>, message: &WireMessage) {
        if recipients.is_empty() {
            return;
        }
        let Some(frame) = encode(message) else {
            return;
        };

        tracing::trace!(kind = message.kind(), recipients = recipients.len(), "Fanning out");
        self.send(HubCommand::Deliver { recipients, frame }).await;
    }

    async fn participants(&self, conversation_id: ConversationId) -> Option<Vec<UserId>> {
        match self.store.participants(conversation_id).await {
            Ok(participants) => Some(participants),
            Err(e) => {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "Failed to load participants, broadcast abandoned"
                );
                None
            }
        }
    }

    async fn username(&self, user_id: UserId) -> Option<String> {
        match self.store.profile(user_id).await {
            Ok(profile) => profile.map(|p| p.username),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to load profile");
                None
            }
        }
    }

    // === Broadcasts ===

    /// Fan out a newly persisted message to the conversation
    ///
    /// Every participant other than the sender gets a `delivered` status record,
    /// whether or not they are online.
    pub async fn broadcast_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        message_id: MessageId,
        content: impl Into<String>,
    ) {
        let Some(participants) = self.participants(conversation_id).await else {
            return;
        };

        let sender_username = self
            .username(sender_id)
            .await
            .unwrap_or_else(|| UNKNOWN_USERNAME.to_string());

        let sent_at = match self.store.message_info(message_id).await {
            Ok(Some(info)) => info.sent_at,
            Ok(None) => {
                tracing::warn!(message_id = %message_id, "Message not found, using current time");
                Utc::now()
            }
            Err(e) => {
                tracing::warn!(message_id = %message_id, error = %e, "Failed to load message, using current time");
                Utc::now()
            }
        };

        let message = WireMessage::Message(MessagePayload {
            conversation_id,
            message_id: Some(message_id),
            sender_id: Some(sender_id),
            sender_username,
            content: content.into(),
            sent_at,
            system: false,
        });

        let others: Vec<UserId> = participants
            .into_iter()
            .filter(|&user_id| user_id != sender_id)
            .collect();

        let mut recipients = others.clone();
        if self.echo_to_sender {
            recipients.push(sender_id);
        }
        self.deliver(recipients, &message).await;

        let marks = others
            .iter()
            .map(|&user_id| self.store.mark_delivered(message_id, user_id));
        for (user_id, result) in others.iter().zip(join_all(marks).await) {
            if let Err(e) = result {
                tracing::warn!(
                    message_id = %message_id,
                    user_id = %user_id,
                    error = %e,
                    "Failed to record delivery"
                );
            }
        }
    }

    /// Tell the other participants that `reader_id` has read a message
    pub async fn broadcast_read_receipt(&self, message_id: MessageId, reader_id: UserId) {
        let conversation_id = match self.store.message_info(message_id).await {
            Ok(Some(info)) => info.conversation_id,
            Ok(None) => {
                tracing::warn!(message_id = %message_id, "Read receipt for unknown message ignored");
                return;
            }
            Err(e) => {
                tracing::warn!(message_id = %message_id, error = %e, "Failed to resolve message for read receipt");
                return;
            }
        };

        let Some(participants) = self.participants(conversation_id).await else {
            return;
        };

        let message = WireMessage::ReadReceipt(ReadReceiptPayload {
            conversation_id,
            message_id,
            reader_id,
        });
        let recipients = participants
            .into_iter()
            .filter(|&user_id| user_id != reader_id)
            .collect();
        self.deliver(recipients, &message).await;
    }

    /// Relay a typing indicator to the other participants, never to the typist
    pub async fn broadcast_typing(&self, conversation_id: ConversationId, user_id: UserId, kind: TypingKind) {
        let Some(participants) = self.participants(conversation_id).await else {
            return;
        };
        let username = self.username(user_id).await.unwrap_or_default();

        let message = WireMessage::typing(
            kind,
            TypingPayload {
                conversation_id,
                user_id,
                username,
            },
        );
        let recipients = participants
            .into_iter()
            .filter(|&other| other != user_id)
            .collect();
        self.deliver(recipients, &message).await;
    }

    /// Announce a status change to everyone sharing a conversation with `user_id`
    ///
    /// The coordinator drops the announcement if `status` no longer matches whether
    /// the user has a live session by the time it arrives.
    pub async fn broadcast_presence(&self, user_id: UserId, status: PresenceStatus) {
        let peers = match self.store.peers(user_id).await {
            Ok(peers) => peers,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to load peers, presence not announced");
                return;
            }
        };
        if peers.is_empty() {
            return;
        }

        let (username, last_active) = match self.store.profile(user_id).await {
            Ok(Some(profile)) => (profile.username, profile.last_active),
            Ok(None) => (String::new(), None),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to load profile");
                (String::new(), None)
            }
        };

        let message = WireMessage::Presence(PresencePayload {
            user_id,
            username,
            status,
            last_active,
        });
        let Some(frame) = encode(&message) else {
            return;
        };
        self.send(HubCommand::DeliverPresence {
            user_id,
            status,
            recipients: peers,
            frame,
        })
        .await;
    }

    /// Notify a conversation about a membership change
    ///
    /// The affected participant is notified even when they are no longer a member.
    pub async fn broadcast_conversation_update(&self, conversation_id: ConversationId, change: ConversationChange) {
        let Some(mut recipients) = self.participants(conversation_id).await else {
            return;
        };
        if let Some(affected) = change.affected_user() {
            if !recipients.contains(&affected) {
                recipients.push(affected);
            }
        }

        let message = WireMessage::ConversationUpdate(change.payload(conversation_id));
        self.deliver(recipients, &message).await;
    }

    /// Post a system announcement to every participant
    pub async fn broadcast_system_message(&self, conversation_id: ConversationId, content: impl Into<String>) {
        let Some(participants) = self.participants(conversation_id).await else {
            return;
        };

        let message = WireMessage::Message(MessagePayload {
            conversation_id,
            message_id: None,
            sender_id: None,
            sender_username: SYSTEM_USERNAME.to_string(),
            content: content.into(),
            sent_at: Utc::now(),
            system: true,
        });
        self.deliver(participants, &message).await;
    }
}

fn encode(message: &WireMessage) -> Option<Frame> {
    match message.to_frame() {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::error!(kind = message.kind(), error = %e, "Failed to encode wire message");
            None
        }
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("echo_to_sender", &self.echo_to_sender)
            .field("stopped", &self.commands.is_closed())
            .finish_non_exhaustive()
    }
}
