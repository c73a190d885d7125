//! Test fixtures
//!
//! `MemoryStore` stands in for PostgreSQL so hub behaviour can be tested without
//! a database.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use relay_core::{
    ConversationId, HubStore, MessageId, MessageInfo, StoreError, StoreResult, UserId,
    UserProfile,
};

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, UserProfile>,
    conversations: HashMap<ConversationId, Vec<UserId>>,
    messages: HashMap<MessageId, MessageInfo>,
    delivered: HashSet<(MessageId, UserId)>,
    touches: HashMap<UserId, usize>,
    profile_delays: HashMap<UserId, Duration>,
    offline: bool,
}

/// In-memory `HubStore`
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Add users named `user<id>`
    pub fn add_users(&self, ids: &[i64]) {
        let mut inner = self.lock();
        for &id in ids {
            inner.users.insert(
                UserId::new(id),
                UserProfile {
                    username: format!("user{id}"),
                    last_active: None,
                },
            );
        }
    }

    pub fn add_conversation(&self, id: i64, members: &[i64]) {
        self.add_users(members);
        self.lock().conversations.insert(
            ConversationId::new(id),
            members.iter().copied().map(UserId::new).collect(),
        );
    }

    pub fn remove_participant(&self, conversation: i64, user: i64) {
        if let Some(members) = self.lock().conversations.get_mut(&ConversationId::new(conversation)) {
            members.retain(|member| *member != UserId::new(user));
        }
    }

    pub fn add_message(&self, id: i64, conversation: i64) {
        self.lock().messages.insert(
            MessageId::new(id),
            MessageInfo {
                conversation_id: ConversationId::new(conversation),
                sent_at: Utc::now(),
            },
        );
    }

    /// Make the next `profile` lookup for `user` take `delay`
    pub fn delay_next_profile(&self, user: i64, delay: Duration) {
        self.lock().profile_delays.insert(UserId::new(user), delay);
    }

    /// Make every query fail
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Users with a delivered record for `message`, sorted
    pub fn delivered_to(&self, message: i64) -> Vec<UserId> {
        let mut users: Vec<UserId> = self
            .lock()
            .delivered
            .iter()
            .filter(|(id, _)| *id == MessageId::new(message))
            .map(|(_, user)| *user)
            .collect();
        users.sort();
        users
    }

    pub fn touches(&self, user: i64) -> usize {
        self.lock().touches.get(&UserId::new(user)).copied().unwrap_or(0)
    }

    fn check(&self) -> StoreResult<()> {
        if self.lock().offline {
            return Err(StoreError::DatabaseError("store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl HubStore for MemoryStore {
    async fn participants(&self, conversation_id: ConversationId) -> StoreResult<Vec<UserId>> {
        self.check()?;
        Ok(self
            .lock()
            .conversations
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn peers(&self, user_id: UserId) -> StoreResult<Vec<UserId>> {
        self.check()?;
        let peers: HashSet<UserId> = self
            .lock()
            .conversations
            .values()
            .filter(|members| members.contains(&user_id))
            .flatten()
            .copied()
            .filter(|&other| other != user_id)
            .collect();
        Ok(peers.into_iter().collect())
    }

    async fn profile(&self, user_id: UserId) -> StoreResult<Option<UserProfile>> {
        self.check()?;
        let delay = self.lock().profile_delays.remove(&user_id);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.lock().users.get(&user_id).cloned())
    }

    async fn message_info(&self, message_id: MessageId) -> StoreResult<Option<MessageInfo>> {
        self.check()?;
        Ok(self.lock().messages.get(&message_id).copied())
    }

    async fn mark_delivered(&self, message_id: MessageId, user_id: UserId) -> StoreResult<()> {
        self.check()?;
        self.lock().delivered.insert((message_id, user_id));
        Ok(())
    }

    async fn touch_last_active(&self, user_id: UserId) -> StoreResult<()> {
        self.check()?;
        let mut inner = self.lock();
        *inner.touches.entry(user_id).or_default() += 1;
        if let Some(profile) = inner.users.get_mut(&user_id) {
            profile.last_active = Some(Utc::now());
        }
        Ok(())
    }
}
