//! Shared handle to a [`Database`] plus its [`ChangeFeed`].

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::batch::WriteBatch;
use crate::changes::{Change, ChangeFeed};
use crate::database::Database;
use crate::error::{Result, StoreError};

/// Cloneable store handle.
///
/// All clones share one connection. Committing a batch publishes its changes
/// on the feed only after the transaction succeeded, so subscribers never
/// react to rolled-back writes.
#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Database>>,
    feed: ChangeFeed,
}

impl Store {
    pub fn new(db: Database, feed_capacity: usize) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            feed: ChangeFeed::new(feed_capacity),
        }
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(
            Database::open_in_memory()?,
            crate::changes::DEFAULT_FEED_CAPACITY,
        ))
    }

    /// Run a read-only closure against the database.
    pub fn read<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let guard = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        f(&guard)
    }

    /// Apply `batch` atomically and notify subscribers.
    pub fn commit(&self, batch: &WriteBatch) -> Result<()> {
        let changes = {
            let mut guard = self.db.lock().map_err(|_| StoreError::Poisoned)?;
            guard.apply_batch(batch)?
        };
        self.feed.publish(changes);
        Ok(())
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<Change> {
        self.feed.subscribe()
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::WriteOp;
    use crate::models::{Presence, User};

    #[test]
    fn commit_publishes_only_on_success() {
        let store = Store::in_memory().unwrap();
        let mut rx = store.subscribe_changes();

        let missing = WriteBatch::from(vec![WriteOp::UpdateUsername {
            user_id: "ghost".into(),
            username: "Boo".into(),
        }]);
        assert!(store.commit(&missing).is_err());
        assert!(rx.try_recv().is_err());

        let user = User {
            id: "a".into(),
            username: "Alice".into(),
            email: "a@example.com".into(),
            phone_number: "123".into(),
            avatar_url: None,
            status: Presence::Online,
            last_seen: 5,
        };
        store
            .commit(&WriteBatch::from(vec![WriteOp::PutUser(user.clone())]))
            .unwrap();
        assert_eq!(rx.try_recv().unwrap(), Change::User("a".into()));

        let stored = store.read(|db| db.get_user(&"a".into())).unwrap();
        assert_eq!(stored, Some(user));
    }
}
