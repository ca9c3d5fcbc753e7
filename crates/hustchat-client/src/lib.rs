//! # hustchat-client
//!
//! The chat core consumed by a UI layer: a signed-in [`Client`] exposes live
//! conversation and message subscriptions, the conversation list and message
//! thread view models, and the atomic mutators (accept friend request,
//! create group, send message).

pub mod auth;
pub mod backend;
pub mod cache;
pub mod chat_items;
pub mod client;
pub mod commands;
pub mod config;
pub mod conversation_list;
pub mod error;
pub mod session;
pub mod subscription;

use tracing_subscriber::{fmt, EnvFilter};

pub use auth::{AuthFlow, AuthState, IdentityProvider};
pub use backend::Backend;
pub use cache::ProfileCache;
pub use chat_items::{
    compose_chat_items, compose_chat_items_local, is_system_sender, ChatItem, ChatThread,
};
pub use client::Client;
pub use commands::friends::IncomingRequest;
pub use config::ClientConfig;
pub use conversation_list::{
    filter_conversations, ConversationList, Counterpart, EnrichedConversation, ListEvent,
    ProfileLookup,
};
pub use error::{ClientError, Result};
pub use session::Session;
pub use subscription::{Subscription, SubscriptionHandle};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set. Calling this more than once is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hustchat_client=debug,hustchat_store=info,warn"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
