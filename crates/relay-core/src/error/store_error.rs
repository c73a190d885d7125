//! Store errors - failures reported by the persistence collaborator

use thiserror::Error;

/// Errors returned by [`HubStore`](crate::traits::HubStore) implementations
///
/// Missing rows are not errors; lookups return `Option` instead.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}
