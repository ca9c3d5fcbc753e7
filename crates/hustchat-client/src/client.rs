//! The signed-in chat core handed to the UI layer.

use std::sync::Arc;

use chrono::TimeZone;
use hustchat_shared::{ConversationId, UserId};
use hustchat_store::{Change, Conversation, Database, Message, Store, User};
use tracing::{debug, info};

use crate::backend::Backend;
use crate::cache::ProfileCache;
use crate::chat_items::ChatThread;
use crate::config::ClientConfig;
use crate::conversation_list::ConversationList;
use crate::error::Result;
use crate::session::Session;
use crate::subscription::{spawn_live_query, Subscription};

/// Cheap to clone; clones share the store, the change feed and the profile
/// cache.
#[derive(Clone)]
pub struct Client {
    session: Session,
    backend: Backend,
    cache: ProfileCache,
    config: ClientConfig,
}

impl Client {
    pub fn new(session: Session, store: Store, config: ClientConfig) -> Self {
        let backend = Backend::new(store, config.operation_timeout);
        Self {
            session,
            backend,
            cache: ProfileCache::new(),
            config,
        }
    }

    /// Open the on-disk store named by `config` and build a client on it.
    pub fn open(session: Session, config: ClientConfig) -> Result<Self> {
        let db = match &config.db_path {
            Some(path) => Database::open_at(path)?,
            None => Database::new()?,
        };
        info!(
            user = ?session.user_id().map(UserId::as_str),
            path = ?db.path(),
            "client opened"
        );
        let store = Store::new(db, config.change_feed_capacity);
        Ok(Self::new(session, store, config))
    }

    /// The same store and cache seen by another session, e.g. after login.
    pub fn with_session(&self, session: Session) -> Self {
        Self {
            session,
            backend: self.backend.clone(),
            cache: self.cache.clone(),
            config: self.config.clone(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn profile_cache(&self) -> &ProfileCache {
        &self.cache
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn current_user(&self) -> Option<&UserId> {
        self.session.user_id()
    }

    // -----------------------------------------------------------------------
    // Live queries
    // -----------------------------------------------------------------------

    /// Conversations the current user participates in, most recent first.
    ///
    /// Without a signed-in user this yields one empty snapshot and ends.
    pub fn subscribe_conversations(&self) -> Subscription<Conversation> {
        let Some(user_id) = self.current_user().cloned() else {
            debug!("conversation subscription without a session");
            return Subscription::once(Vec::new());
        };

        let relevant_to = user_id.clone();
        spawn_live_query(
            self.backend.clone(),
            self.config.subscription_buffer,
            "conversations",
            move |change: &Change| change.affects_conversations_of(&relevant_to),
            move |db: &Database| db.list_conversations_for_user(&user_id),
        )
    }

    /// Messages of one conversation in display order.
    pub fn subscribe_messages(&self, conversation_id: &ConversationId) -> Subscription<Message> {
        let relevant_to = conversation_id.clone();
        let conversation_id = conversation_id.clone();
        spawn_live_query(
            self.backend.clone(),
            self.config.subscription_buffer,
            "messages",
            move |change: &Change| change.affects_messages_of(&relevant_to),
            move |db: &Database| db.list_messages(&conversation_id),
        )
    }

    /// A single user record, e.g. a chat partner's presence.
    ///
    /// Emits an empty snapshot while the user does not exist.
    pub fn subscribe_user(&self, user_id: &UserId) -> Subscription<User> {
        let relevant_to = user_id.clone();
        let user_id = user_id.clone();
        spawn_live_query(
            self.backend.clone(),
            self.config.subscription_buffer,
            "user",
            move |change: &Change| matches!(change, Change::User(id) if *id == relevant_to),
            move |db: &Database| Ok(db.get_user(&user_id)?.into_iter().collect()),
        )
    }

    /// Live conversation list with partner profiles resolved.
    ///
    /// `None` without a signed-in user.
    pub fn conversation_list(&self) -> Option<ConversationList> {
        let user_id = self.current_user()?.clone();
        Some(ConversationList::new(
            user_id,
            Arc::new(self.backend.clone()),
            self.cache.clone(),
            self.subscribe_conversations(),
        ))
    }

    /// Live message thread with date headers computed in `tz`.
    pub fn chat_thread<Tz: TimeZone>(
        &self,
        conversation_id: &ConversationId,
        tz: Tz,
    ) -> ChatThread<Tz> {
        ChatThread::new(self.subscribe_messages(conversation_id), tz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hustchat_store::{Presence, WriteBatch, WriteOp};
    use std::time::Duration;

    use crate::chat_items::ChatItem;
    use crate::conversation_list::{Counterpart, ListEvent};

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

    fn direct(a: &str, b: &str, ts: i64) -> Conversation {
        Conversation {
            id: ConversationId::direct(&a.into(), &b.into()),
            participant_ids: vec![a.into(), b.into()],
            kind: Default::default(),
            group_name: String::new(),
            last_message: "hi".into(),
            timestamp: ts,
        }
    }

    fn client_for(store: &Store, id: &str) -> Client {
        Client::new(
            Session::signed_in(id.into()),
            store.clone(),
            ClientConfig::default(),
        )
    }

    #[tokio::test]
    async fn anonymous_subscription_yields_one_empty_snapshot() {
        let client = Client::new(
            Session::anonymous(),
            Store::in_memory().unwrap(),
            ClientConfig::default(),
        );
        let mut sub = client.subscribe_conversations();
        assert!(sub.next().await.unwrap().unwrap().is_empty());
        assert!(sub.next().await.is_none());
        assert!(client.conversation_list().is_none());
    }

    #[tokio::test]
    async fn open_persists_to_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            db_path: Some(dir.path().join("nested").join("chat.db")),
            ..ClientConfig::default()
        };

        let client = Client::open(Session::signed_in("me".into()), config.clone()).unwrap();
        client
            .backend()
            .commit(WriteBatch::from(vec![WriteOp::PutUser(user("me", "Me"))]))
            .await
            .unwrap();
        drop(client);

        let reopened = Client::open(Session::signed_in("me".into()), config).unwrap();
        let stored = reopened.get_user(&"me".into()).await.unwrap().unwrap();
        assert_eq!(stored.username, "Me");
    }

    #[tokio::test]
    async fn conversations_sorted_most_recent_first() {
        let store = Store::in_memory().unwrap();
        let client = client_for(&store, "me");
        let mut sub = client.subscribe_conversations();
        assert!(sub.next().await.unwrap().unwrap().is_empty());

        client
            .backend()
            .commit(WriteBatch::from(vec![
                WriteOp::PutConversation(direct("me", "bob", 10)),
                WriteOp::PutConversation(direct("me", "carol", 20)),
                WriteOp::PutConversation(direct("dave", "erin", 30)),
            ]))
            .await
            .unwrap();

        let snapshot = sub.next().await.unwrap().unwrap();
        let ids: Vec<_> = snapshot.iter().map(|c| c.id.to_string()).collect();
        assert_eq!(ids, vec!["carol_me", "bob_me"]);
    }

    #[tokio::test]
    async fn pending_row_resolves_without_reordering() {
        let store = Store::in_memory().unwrap();
        let client = client_for(&store, "me");
        client
            .backend()
            .commit(WriteBatch::from(vec![
                WriteOp::PutUser(user("bob", "Bob")),
                WriteOp::PutUser(user("carol", "Carol")),
                WriteOp::PutConversation(direct("me", "bob", 10)),
                WriteOp::PutConversation(direct("me", "carol", 20)),
            ]))
            .await
            .unwrap();
        client
            .profile_cache()
            .insert(user("carol", "Carol").profile());

        let mut list = client.conversation_list().unwrap();

        let ListEvent::Snapshot(rows) = list.next().await.unwrap().unwrap() else {
            panic!("expected a snapshot first");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title(), "Carol");
        assert_eq!(rows[1].counterpart, Counterpart::Pending("bob".into()));

        match list.next().await.unwrap().unwrap() {
            ListEvent::RowResolved { index, row } => {
                assert_eq!(index, 1);
                assert_eq!(row.title(), "Bob");
                assert_eq!(row.conversation, rows[1].conversation);
            }
            ListEvent::Snapshot(_) => panic!("only the resolved row should be re-emitted"),
        }

        assert_eq!(list.rows()[0], rows[0]);
        assert_eq!(list.rows()[1].title(), "Bob");
        assert!(client.profile_cache().contains(&"bob".into()));

        list.unsubscribe();
        assert!(list.next().await.is_none());
    }

    #[tokio::test]
    async fn unknown_partner_resolves_to_not_found() {
        let store = Store::in_memory().unwrap();
        let client = client_for(&store, "me");
        client
            .backend()
            .commit(WriteBatch::from(vec![WriteOp::PutConversation(direct(
                "me", "ghost", 10,
            ))]))
            .await
            .unwrap();

        let mut list = client.conversation_list().unwrap();
        list.next().await.unwrap().unwrap();
        let event = tokio::time::timeout(Duration::from_secs(2), list.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            ListEvent::RowResolved {
                index: 0,
                row: crate::conversation_list::EnrichedConversation {
                    conversation: direct("me", "ghost", 10),
                    counterpart: Counterpart::NotFound("ghost".into()),
                },
            }
        );

        client
            .backend()
            .commit(WriteBatch::from(vec![WriteOp::PutConversation(direct(
                "me", "ghost", 20,
            ))]))
            .await
            .unwrap();
        let ListEvent::Snapshot(rows) = list.next().await.unwrap().unwrap() else {
            panic!("expected a snapshot");
        };
        assert_eq!(rows[0].counterpart, Counterpart::NotFound("ghost".into()));
        assert!(
            tokio::time::timeout(Duration::from_millis(100), list.next())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn chat_thread_emits_headers() {
        let store = Store::in_memory().unwrap();
        let client = client_for(&store, "me");
        let conversation = direct("me", "bob", 0);
        let id = conversation.id.clone();
        client
            .backend()
            .commit(WriteBatch::from(vec![
                WriteOp::PutConversation(conversation),
                WriteOp::InsertMessage(Message::new(id.clone(), "me".into(), "one", 1_000)),
            ]))
            .await
            .unwrap();

        let mut thread = client.chat_thread(&id, Utc);
        let items = thread.next().await.unwrap().unwrap();
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], ChatItem::DateHeader { timestamp: 1_000 }));
        thread.unsubscribe();
    }

    #[tokio::test]
    async fn user_subscription_tracks_presence() {
        let store = Store::in_memory().unwrap();
        let client = client_for(&store, "me");
        let mut sub = client.subscribe_user(&"bob".into());
        assert!(sub.next().await.unwrap().unwrap().is_empty());

        client
            .backend()
            .commit(WriteBatch::from(vec![WriteOp::PutUser(user("bob", "Bob"))]))
            .await
            .unwrap();
        let snapshot = sub.next().await.unwrap().unwrap();
        assert_eq!(snapshot[0].status, Presence::Offline);

        client
            .backend()
            .commit(WriteBatch::from(vec![WriteOp::SetPresence {
                user_id: "bob".into(),
                status: Presence::Online,
                last_seen: 99,
            }]))
            .await
            .unwrap();
        let snapshot = sub.next().await.unwrap().unwrap();
        assert_eq!(snapshot[0].status, Presence::Online);
        assert_eq!(snapshot[0].last_seen, 99);
    }
}
