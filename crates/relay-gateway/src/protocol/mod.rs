//! Wire protocol
//!
//! Outbound payloads pushed by the hub and the inbound frames clients may send.

mod inbound;
mod wire;

pub use inbound::ClientFrame;
pub use wire::{
    ChangeKind, ConversationChange, ConversationUpdatePayload, Frame, MessagePayload,
    PresencePayload, PresenceStatus, ReadReceiptPayload, TypingKind, TypingPayload, WireMessage,
};
