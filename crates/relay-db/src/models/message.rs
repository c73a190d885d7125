//! Message database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Placement columns of the messages table
#[derive(Debug, Clone, FromRow)]
pub struct MessageInfoModel {
    pub conversation_id: i64,
    pub sent_at: DateTime<Utc>,
}
