use std::time::Duration;

use hustchat_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Live query closed")]
    SubscriptionClosed,

    #[error("Identity provider error: {0}")]
    Identity(#[from] anyhow::Error),
}

impl ClientError {
    /// Text suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(reason) => reason.clone(),
            ClientError::NotFound(what) => format!("Not found: {what}"),
            ClientError::Store(StoreError::NotFound(what)) => format!("Not found: {what}"),
            ClientError::Timeout(_) => "The server took too long to respond.".to_string(),
            ClientError::SubscriptionClosed => "Live updates were interrupted.".to_string(),
            ClientError::Identity(e) => e.to_string(),
            ClientError::Store(_) | ClientError::Task(_) => format!("Error: {self}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
