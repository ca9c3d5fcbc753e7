//! Live queries.
//!
//! A live query is a spawned task that runs its query once up front and
//! again after every committed change that may affect the result. Each run
//! is delivered as a full snapshot; consumers replace their state with it.
//!
//! The consumer side holds a [`Subscription`]. Once it is unsubscribed
//! (explicitly, through a [`SubscriptionHandle`], or by dropping it) it
//! yields nothing more, even if the producer already queued a snapshot.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use hustchat_store::{Change, Database};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backend::Backend;
use crate::error::{ClientError, Result};

/// Consumer end of a live query.
pub struct Subscription<T> {
    rx: mpsc::Receiver<Result<Vec<T>>>,
    cancel: CancellationToken,
}

/// Cloneable remote control for unsubscribing from another task.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    cancel: CancellationToken,
}

impl SubscriptionHandle {
    /// Idempotent.
    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }

    pub fn is_unsubscribed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl<T> Subscription<T> {
    /// A subscription that yields `snapshot` once and then ends.
    pub(crate) fn once(snapshot: Vec<T>) -> Self {
        let (tx, rx) = mpsc::channel(1);
        // Capacity is one and the channel is fresh, so this cannot fail.
        let _ = tx.try_send(Ok(snapshot));
        Self {
            rx,
            cancel: CancellationToken::new(),
        }
    }

    /// Next snapshot, or `None` once unsubscribed or after the stream ended.
    ///
    /// An `Err` item is always the last one.
    pub async fn next(&mut self) -> Option<Result<Vec<T>>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            item = self.rx.recv() => {
                if self.cancel.is_cancelled() { None } else { item }
            }
        }
    }

    /// Release the underlying watch. Safe to call repeatedly and after the
    /// stream has ended or failed.
    pub fn unsubscribe(&mut self) {
        self.cancel.cancel();
        self.rx.close();
    }

    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            cancel: self.cancel.clone(),
        }
    }

    pub fn is_unsubscribed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<Vec<T>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

/// Spawn a live query.
///
/// `query` runs once immediately and again whenever `is_relevant` accepts a
/// committed change. If the feed lagged, the query re-runs unconditionally
/// since some relevant change may have been skipped.
pub(crate) fn spawn_live_query<T, Q, P>(
    backend: Backend,
    buffer: usize,
    label: &'static str,
    is_relevant: P,
    query: Q,
) -> Subscription<T>
where
    T: Send + 'static,
    Q: Fn(&Database) -> hustchat_store::Result<Vec<T>> + Clone + Send + 'static,
    P: Fn(&Change) -> bool + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    // Subscribe before the first query so no commit falls in between.
    let mut changes = backend.subscribe_changes();

    tokio::spawn(async move {
        debug!(query = label, "live query started");

        loop {
            let result = backend.read(query.clone()).await;
            let failed = result.is_err();

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                sent = tx.send(result) => {
                    if sent.is_err() || failed {
                        break;
                    }
                }
            }

            if !wait_for_relevant_change(&mut changes, &token, &tx, label, &is_relevant).await {
                break;
            }
        }

        debug!(query = label, "live query stopped");
    });

    Subscription { rx, cancel }
}

/// Block until the query has to run again.
///
/// Returns `false` once the subscription is cancelled or the feed closed.
async fn wait_for_relevant_change<T, P>(
    changes: &mut broadcast::Receiver<Change>,
    token: &CancellationToken,
    tx: &mpsc::Sender<Result<Vec<T>>>,
    label: &'static str,
    is_relevant: &P,
) -> bool
where
    P: Fn(&Change) -> bool,
{
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return false,
            change = changes.recv() => match change {
                Ok(change) if is_relevant(&change) => return true,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!(query = label, skipped, "change feed lagged, re-running query");
                    return true;
                }
                Err(RecvError::Closed) => {
                    let _ = tx.send(Err(ClientError::SubscriptionClosed)).await;
                    return false;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures::StreamExt;
    use hustchat_store::{Presence, Store, StoreError, User, WriteBatch, WriteOp};

    fn user(id: &str, name: &str) -> User {
        User {
            id: id.into(),
            username: name.into(),
            email: format!("{id}@example.com"),
            phone_number: String::new(),
            avatar_url: None,
            status: Presence::Offline,
            last_seen: 0,
        }
    }

    fn users_named(backend: &Backend) -> Subscription<String> {
        spawn_live_query(
            backend.clone(),
            8,
            "usernames",
            |change| matches!(change, Change::User(_)),
            |db: &Database| {
                let mut names = Vec::new();
                for id in ["a", "b"] {
                    if let Some(u) = db.get_user(&id.into())? {
                        names.push(u.username);
                    }
                }
                Ok(names)
            },
        )
    }

    async fn put(backend: &Backend, u: User) {
        backend
            .commit(WriteBatch::from(vec![WriteOp::PutUser(u)]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn emits_initial_then_full_snapshots() {
        let backend = Backend::new(Store::in_memory().unwrap(), Duration::from_secs(5));
        let mut sub = users_named(&backend);

        assert_eq!(sub.next().await.unwrap().unwrap(), Vec::<String>::new());

        put(&backend, user("a", "Alice")).await;
        assert_eq!(sub.next().await.unwrap().unwrap(), vec!["Alice"]);

        put(&backend, user("b", "Bob")).await;
        assert_eq!(sub.next().await.unwrap().unwrap(), vec!["Alice", "Bob"]);
    }

    #[tokio::test]
    async fn nothing_after_unsubscribe() {
        let backend = Backend::new(Store::in_memory().unwrap(), Duration::from_secs(5));
        let mut sub = users_named(&backend);
        sub.next().await.unwrap().unwrap();

        // A snapshot is queued by the producer but never observed.
        put(&backend, user("a", "Alice")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(sub.next().await.is_none());
        assert!(sub.is_unsubscribed());
    }

    #[tokio::test]
    async fn handle_unsubscribes_from_elsewhere() {
        let backend = Backend::new(Store::in_memory().unwrap(), Duration::from_secs(5));
        let mut sub = users_named(&backend);
        let handle = sub.handle();

        let waiter = tokio::spawn(async move {
            sub.next().await.unwrap().unwrap();
            sub.next().await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.unsubscribe();
        assert!(waiter.await.unwrap().is_none());
        assert!(handle.is_unsubscribed());
    }

    #[tokio::test]
    async fn query_failure_ends_stream_with_error() {
        let backend = Backend::new(Store::in_memory().unwrap(), Duration::from_secs(5));
        let mut sub: Subscription<String> = spawn_live_query(
            backend.clone(),
            4,
            "failing",
            |_| true,
            |_: &Database| Err(StoreError::InvalidValue("broken".into())),
        );

        assert!(matches!(
            sub.next().await,
            Some(Err(ClientError::Store(StoreError::InvalidValue(_))))
        ));
        assert!(sub.next().await.is_none());

        // Unsubscribing after the failure is still fine.
        sub.unsubscribe();
    }

    #[tokio::test]
    async fn irrelevant_changes_do_not_emit() {
        let backend = Backend::new(Store::in_memory().unwrap(), Duration::from_secs(5));
        let mut sub = users_named(&backend);
        sub.next().await.unwrap().unwrap();

        backend
            .commit(WriteBatch::from(vec![WriteOp::PutFriendEdge(
                hustchat_store::FriendEdge {
                    owner_id: "a".into(),
                    friend: user("b", "Bob").profile(),
                },
            )]))
            .await
            .unwrap();

        let next = tokio::time::timeout(Duration::from_millis(100), sub.next()).await;
        assert!(next.is_err(), "no snapshot expected");

        // The watch keeps going after skipping a change.
        put(&backend, user("a", "Alice")).await;
        assert_eq!(sub.next().await.unwrap().unwrap(), vec!["Alice"]);
    }

    async fn wait_for_receivers(store: &Store, expected: usize) {
        let settled = tokio::time::timeout(Duration::from_secs(2), async {
            while store.feed().receiver_count() != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(
            settled.is_ok(),
            "expected {expected} feed receivers, found {}",
            store.feed().receiver_count()
        );
    }

    #[tokio::test]
    async fn unsubscribe_and_drop_release_the_feed() {
        let store = Store::in_memory().unwrap();
        let backend = Backend::new(store.clone(), Duration::from_secs(5));
        assert_eq!(store.feed().receiver_count(), 0);

        let mut sub = users_named(&backend);
        sub.next().await.unwrap().unwrap();
        assert_eq!(store.feed().receiver_count(), 1);
        sub.unsubscribe();
        wait_for_receivers(&store, 0).await;

        let mut dropped = users_named(&backend);
        dropped.next().await.unwrap().unwrap();
        assert_eq!(store.feed().receiver_count(), 1);
        drop(dropped);
        wait_for_receivers(&store, 0).await;
    }

    #[tokio::test]
    async fn once_yields_single_snapshot_as_stream() {
        let sub = Subscription::once(vec![1, 2, 3]);
        let items: Vec<_> = sub.collect().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap(), &vec![1, 2, 3]);
    }
}
