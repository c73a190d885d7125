//! # relay-gateway
//!
//! WebSocket fan-out hub: tracks which users are connected and pushes messages,
//! read receipts, typing indicators, presence and conversation updates to them.

pub mod connection;
pub mod hub;
pub mod protocol;
pub mod server;

pub use hub::{Hub, HubStats};
pub use server::{create_app, create_gateway_state, run, serve, GatewayState};
