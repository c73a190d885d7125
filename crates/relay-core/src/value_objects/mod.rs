//! Value objects - immutable domain primitives

mod ids;

pub use ids::{ConversationId, IdParseError, MessageId, UserId};
