//! Database models - SQLx-compatible row structs

mod message;
mod user;

pub use message::MessageInfoModel;
pub use user::ProfileModel;
