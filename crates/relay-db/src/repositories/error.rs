//! Error handling utilities for repositories

use relay_core::StoreError;
use sqlx::Error as SqlxError;

/// Convert SQLx error to StoreError
pub fn map_db_error(e: SqlxError) -> StoreError {
    StoreError::DatabaseError(e.to_string())
}
