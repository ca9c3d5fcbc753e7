//! # hustchat-store
//!
//! The document store behind the chat core, backed by SQLite.
//!
//! Reads are plain typed queries on [`Database`]. Every write goes through a
//! [`WriteBatch`] that is applied inside a single transaction, so a batch is
//! either fully visible or not at all. [`Store`] wraps a database for shared
//! use and publishes a [`Change`] for every committed batch, which is what
//! live queries re-run on.

pub mod batch;
pub mod changes;
pub mod conversations;
pub mod database;
pub mod friends;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod store;
pub mod users;

mod error;

pub use batch::{WriteBatch, WriteOp};
pub use changes::{Change, ChangeFeed};
pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use store::Store;
