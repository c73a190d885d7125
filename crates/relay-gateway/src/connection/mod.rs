//! Connection sessions
//!
//! One session per live WebSocket: a read loop, a write loop, and the bounded
//! outbound queue between the hub and the write loop.

mod reader;
mod session;
mod writer;

pub use reader::ReadEnd;
pub use session::{Session, SessionConfig, SessionId};
pub use writer::WriteEnd;
