//! Inbound client frames

use relay_core::ConversationId;
use serde::Deserialize;

use super::TypingKind;

/// Frames a client may send over its connection
///
/// Anything that does not decode into a known frame, malformed JSON included,
/// becomes `Unrecognized` and is dropped by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    TypingStart { conversation_id: ConversationId },
    TypingStop { conversation_id: ConversationId },
    #[serde(other)]
    Unrecognized,
}

impl ClientFrame {
    #[must_use]
    pub fn decode(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or(Self::Unrecognized)
    }

    /// The conversation and direction of a typing frame
    #[must_use]
    pub fn typing(&self) -> Option<(ConversationId, TypingKind)> {
        match *self {
            Self::TypingStart { conversation_id } => Some((conversation_id, TypingKind::Start)),
            Self::TypingStop { conversation_id } => Some((conversation_id, TypingKind::Stop)),
            Self::Unrecognized => None,
        }
    }
}
