//! Row model to domain type mappers

use relay_core::{ConversationId, MessageInfo, UserId, UserProfile};

use crate::models::{MessageInfoModel, ProfileModel};

impl From<ProfileModel> for UserProfile {
    fn from(model: ProfileModel) -> Self {
        UserProfile {
            username: model.username,
            last_active: model.last_active,
        }
    }
}

impl From<MessageInfoModel> for MessageInfo {
    fn from(model: MessageInfoModel) -> Self {
        MessageInfo {
            conversation_id: ConversationId::new(model.conversation_id),
            sent_at: model.sent_at,
        }
    }
}

/// Convert a column of raw ids into user ids
pub fn user_ids(raw: Vec<i64>) -> Vec<UserId> {
    raw.into_iter().map(UserId::new).collect()
}
