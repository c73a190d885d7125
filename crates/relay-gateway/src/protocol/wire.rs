//! Outbound wire messages
//!
//! Every payload is a JSON object tagged by a snake_case `"type"` field. Optional
//! fields are omitted when absent and default to absent when decoding, so the
//! format only ever grows by adding fields or variants.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use relay_core::{ConversationId, MessageId, UserId};
use serde::{Deserialize, Serialize};

/// A serialized wire message, encoded once and shared by every recipient queue
pub type Frame = Arc<str>;

/// Messages pushed from the hub to connected clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    Message(MessagePayload),
    ReadReceipt(ReadReceiptPayload),
    TypingStart(TypingPayload),
    TypingStop(TypingPayload),
    Presence(PresencePayload),
    ConversationUpdate(ConversationUpdatePayload),
}

impl WireMessage {
    /// Build the typing variant matching `kind`
    #[must_use]
    pub fn typing(kind: TypingKind, payload: TypingPayload) -> Self {
        match kind {
            TypingKind::Start => Self::TypingStart(payload),
            TypingKind::Stop => Self::TypingStop(payload),
        }
    }

    /// The `"type"` tag of this message
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::ReadReceipt(_) => "read_receipt",
            Self::TypingStart(_) => "typing_start",
            Self::TypingStop(_) => "typing_stop",
            Self::Presence(_) => "presence",
            Self::ConversationUpdate(_) => "conversation_update",
        }
    }

    /// Serialize into a shareable frame
    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        serde_json::to_string(self).map(Frame::from)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A chat message, or a system announcement when `system` is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub conversation_id: ConversationId,
    /// Absent for system announcements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    /// Absent for system announcements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserId>,
    pub sender_username: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub system: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceiptPayload {
    pub conversation_id: ConversationId,
    pub message_id: MessageId,
    pub reader_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingPayload {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub username: String,
}

/// Whether a user started or stopped typing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypingKind {
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresencePayload {
    pub user_id: UserId,
    pub username: String,
    pub status: PresenceStatus,
    /// Absent if the user has never been active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
}

/// Online status of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl PresenceStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationUpdatePayload {
    pub conversation_id: ConversationId,
    pub change: ChangeKind,
    /// The participant that was added or removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

/// Wire name of a conversation change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    NewConversation,
    AddedToConversation,
    RemovedFromConversation,
}

/// A change to a conversation's membership, as reported by the conversation service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationChange {
    Created,
    ParticipantAdded(UserId),
    /// Reported after the participant row is gone
    ParticipantRemoved(UserId),
}

impl ConversationChange {
    #[must_use]
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Created => ChangeKind::NewConversation,
            Self::ParticipantAdded(_) => ChangeKind::AddedToConversation,
            Self::ParticipantRemoved(_) => ChangeKind::RemovedFromConversation,
        }
    }

    /// The user whose membership changed, if any
    #[must_use]
    pub fn affected_user(&self) -> Option<UserId> {
        match self {
            Self::Created => None,
            Self::ParticipantAdded(user_id) | Self::ParticipantRemoved(user_id) => Some(*user_id),
        }
    }

    #[must_use]
    pub fn payload(&self, conversation_id: ConversationId) -> ConversationUpdatePayload {
        ConversationUpdatePayload {
            conversation_id,
            change: self.kind(),
            user_id: self.affected_user(),
        }
    }
}
