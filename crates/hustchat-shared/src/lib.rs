//! # hustchat-shared
//!
//! Identifiers, constants and small pure helpers shared by the store and
//! the client crates.

pub mod constants;
pub mod error;
pub mod time;
pub mod types;

pub use error::SharedError;
pub use types::{ConversationId, MessageId, RequestId, UserId};
