//! # relay-db
//!
//! PostgreSQL implementation of the `HubStore` contract defined in `relay-core`.
//!
//! ## Overview
//!
//! - Connection pool management
//! - Row models with SQLx `FromRow` derives and their mappers
//! - `PgHubStore`, the store the gateway hub consults
//! - Schema migrations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_db::{create_pool, PgHubStore};
//! use relay_core::HubStore;
//!
//! async fn example(config: &relay_common::DatabaseConfig) -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool(config).await?;
//!     let store = PgHubStore::new(pool);
//!     let members = store.participants(42.into()).await?;
//!     Ok(())
//! }
//! ```

pub mod mappers;
pub mod models;
pub mod pool;
pub mod repositories;

// Re-export commonly used types
pub use pool::{create_pool, run_migrations, PgPool};
pub use repositories::PgHubStore;
