//! User database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Display columns of the users table
#[derive(Debug, Clone, FromRow)]
pub struct ProfileModel {
    pub username: String,
    pub last_active: Option<DateTime<Utc>>,
}
