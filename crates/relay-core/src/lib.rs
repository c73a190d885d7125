//! # relay-core
//!
//! Domain layer for the fan-out hub: identifiers, the store contract the hub consults,
//! and domain errors. This crate has no dependency on infrastructure (database, web framework).

pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use error::StoreError;
pub use traits::{HubStore, MessageInfo, StoreResult, UserProfile};
pub use value_objects::{ConversationId, IdParseError, MessageId, UserId};
