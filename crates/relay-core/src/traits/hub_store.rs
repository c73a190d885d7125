//! Store contract consulted by the broadcast hub
//!
//! The hub never owns users, conversations or messages. It reads participant
//! membership and display data from the relational store, and writes back two
//! best-effort audit records: delivery status and last-active time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::value_objects::{ConversationId, MessageId, UserId};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Display data for a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub username: String,
    /// None if the user has never connected
    pub last_active: Option<DateTime<Utc>>,
}

/// Where and when a persisted message lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageInfo {
    pub conversation_id: ConversationId,
    pub sent_at: DateTime<Utc>,
}

#[async_trait]
pub trait HubStore: Send + Sync {
    /// All participants of a conversation
    async fn participants(&self, conversation_id: ConversationId) -> StoreResult<Vec<UserId>>;

    /// Every distinct user sharing at least one conversation with `user_id`, excluding the user
    async fn peers(&self, user_id: UserId) -> StoreResult<Vec<UserId>>;

    /// Username and last-active time of a user
    async fn profile(&self, user_id: UserId) -> StoreResult<Option<UserProfile>>;

    /// Conversation and persisted timestamp of a message
    async fn message_info(&self, message_id: MessageId) -> StoreResult<Option<MessageInfo>>;

    /// Record that a message reached a recipient (idempotent)
    async fn mark_delivered(&self, message_id: MessageId, user_id: UserId) -> StoreResult<()>;

    /// Set the user's last-active time to now
    async fn touch_last_active(&self, user_id: UserId) -> StoreResult<()>;
}
