//! Traits (ports) - the interfaces the hub consumes

mod hub_store;

pub use hub_store::{HubStore, MessageInfo, StoreResult, UserProfile};
