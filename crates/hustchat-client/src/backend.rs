//! Async access to the store.
//!
//! SQLite calls are blocking, so each one runs on the blocking pool and is
//! bounded by the configured operation timeout.

use std::time::Duration;

use hustchat_store::{Change, Database, Store, WriteBatch};
use tokio::sync::broadcast;

use crate::error::{ClientError, Result};

#[derive(Clone)]
pub struct Backend {
    store: Store,
    timeout: Duration,
}

impl Backend {
    pub fn new(store: Store, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run a query against the database.
    pub async fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> hustchat_store::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        self.run(move || store.read(f)).await
    }

    /// Commit a batch atomically.
    ///
    /// A timeout only abandons the wait: the batch may still commit, and if
    /// it does, subscribers see it.
    pub async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let store = self.store.clone();
        self.run(move || store.commit(&batch)).await
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<Change> {
        self.store.subscribe_changes()
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> hustchat_store::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let task = tokio::task::spawn_blocking(f);
        match tokio::time::timeout(self.timeout, task).await {
            Ok(joined) => Ok(joined??),
            Err(_) => Err(ClientError::Timeout(self.timeout)),
        }
    }
}
