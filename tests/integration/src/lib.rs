//! Integration test utilities for the relay gateway
//!
//! Provides an in-memory store, a test server bound to an ephemeral port, and a
//! small WebSocket client for end-to-end tests.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
