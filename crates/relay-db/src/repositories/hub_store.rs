//! PostgreSQL implementation of HubStore

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use relay_core::{
    ConversationId, HubStore, MessageId, MessageInfo, StoreResult, UserId, UserProfile,
};

use crate::mappers::user_ids;
use crate::models::{MessageInfoModel, ProfileModel};

use super::error::map_db_error;

/// PostgreSQL implementation of HubStore
#[derive(Clone)]
pub struct PgHubStore {
    pool: PgPool,
}

impl PgHubStore {
    /// Create a new PgHubStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HubStore for PgHubStore {
    #[instrument(skip(self))]
    async fn participants(&self, conversation_id: ConversationId) -> StoreResult<Vec<UserId>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT user_id FROM participants WHERE conversation_id = $1
            "#,
        )
        .bind(conversation_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(user_ids(ids))
    }

    #[instrument(skip(self))]
    async fn peers(&self, user_id: UserId) -> StoreResult<Vec<UserId>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT p2.user_id
            FROM participants p1
            JOIN participants p2 ON p1.conversation_id = p2.conversation_id
            WHERE p1.user_id = $1 AND p2.user_id <> $1
            "#,
        )
        .bind(user_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(user_ids(ids))
    }

    #[instrument(skip(self))]
    async fn profile(&self, user_id: UserId) -> StoreResult<Option<UserProfile>> {
        let result = sqlx::query_as::<_, ProfileModel>(
            r#"
            SELECT username, last_active FROM users WHERE id = $1
            "#,
        )
        .bind(user_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn message_info(&self, message_id: MessageId) -> StoreResult<Option<MessageInfo>> {
        let result = sqlx::query_as::<_, MessageInfoModel>(
            r#"
            SELECT conversation_id, sent_at FROM messages WHERE id = $1
            "#,
        )
        .bind(message_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn mark_delivered(&self, message_id: MessageId, user_id: UserId) -> StoreResult<()> {
        // A status that is already 'read' must not regress
        sqlx::query(
            r#"
            INSERT INTO message_status (message_id, user_id, status)
            VALUES ($1, $2, 'delivered')
            ON CONFLICT (message_id, user_id) DO NOTHING
            "#,
        )
        .bind(message_id.into_inner())
        .bind(user_id.into_inner())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn touch_last_active(&self, user_id: UserId) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET last_active = NOW() WHERE id = $1
            "#,
        )
        .bind(user_id.into_inner())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }
}
