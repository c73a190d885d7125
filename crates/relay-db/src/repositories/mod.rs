//! Repository implementations
//!
//! PostgreSQL implementations of the store traits defined in relay-core.

mod error;
mod hub_store;

pub use hub_store::PgHubStore;
