use hustchat_shared::time::now_millis;
use hustchat_shared::{ConversationId, MessageId, UserId};
use hustchat_store::{Conversation, Message, WriteBatch, WriteOp};
use tracing::info;

use crate::client::Client;
use crate::error::{ClientError, Result};

impl Client {
    pub async fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        let id = id.clone();
        self.backend().read(move |db| db.get_conversation(&id)).await
    }

    /// Id of the direct conversation with `partner`, whether or not it exists
    /// yet.
    pub fn open_direct_conversation(&self, partner: &UserId) -> Option<ConversationId> {
        self.current_user()
            .map(|me| ConversationId::direct(me, partner))
    }

    /// Append a message and bump the conversation preview in one batch.
    ///
    /// Content is trimmed; blank content sends nothing and returns `Ok(None)`.
    pub async fn send_message(
        &self,
        conversation_id: &ConversationId,
        content: &str,
    ) -> Result<Option<MessageId>> {
        let Some(sender) = self.current_user().cloned() else {
            return Ok(None);
        };
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        let conversation = self
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("conversation {conversation_id}")))?;
        if !conversation.has_participant(&sender) {
            return Err(ClientError::Validation(
                "You are not a member of this conversation".into(),
            ));
        }

        let message = Message::new(conversation_id.clone(), sender, content, now_millis());
        let id = message.id;
        let timestamp = message.timestamp;

        let batch = WriteBatch::from(vec![
            WriteOp::InsertMessage(message),
            WriteOp::UpdateConversationPreview {
                id: conversation_id.clone(),
                last_message: content.to_string(),
                timestamp,
            },
        ]);
        self.backend().commit(batch).await?;

        info!(conversation = %conversation_id, message = %id, "message sent");
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use hustchat_store::{StoreError, WriteBatch, WriteOp};

    use super::*;
    use crate::commands::test_support::{client, clear_failure, inject_failure, seeded, user};
    use crate::config::ClientConfig;
    use crate::session::Session;

    async fn with_conversation() -> (Client, ConversationId) {
        let store = seeded(&[user("a", "Alice", "1"), user("b", "Bob", "2")]);
        let alice = client(&store, "a");
        let id = ConversationId::direct(&"a".into(), &"b".into());
        alice
            .backend()
            .commit(WriteBatch::from(vec![WriteOp::PutConversation(
                Conversation {
                    id: id.clone(),
                    participant_ids: vec!["a".into(), "b".into()],
                    kind: Default::default(),
                    group_name: String::new(),
                    last_message: "before".into(),
                    timestamp: 1,
                },
            )]))
            .await
            .unwrap();
        (alice, id)
    }

    #[tokio::test]
    async fn send_updates_preview_and_appends() {
        let (alice, id) = with_conversation().await;

        let sent = alice.send_message(&id, "  hello  ").await.unwrap().unwrap();

        let conversation = alice.get_conversation(&id).await.unwrap().unwrap();
        assert_eq!(conversation.last_message, "hello");
        assert!(conversation.timestamp > 1);

        let messages = alice
            .backend()
            .read({
                let id = id.clone();
                move |db| db.list_messages(&id)
            })
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, sent);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[0].sender_id, UserId::from("a"));
    }

    #[tokio::test]
    async fn blank_content_is_a_noop() {
        let (alice, id) = with_conversation().await;
        assert!(alice.send_message(&id, "   \n").await.unwrap().is_none());
        let count = alice
            .backend()
            .read(move |db| db.count_messages(&id))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn missing_conversation_writes_nothing() {
        let (alice, _) = with_conversation().await;
        let err = alice
            .send_message(&"nowhere".into(), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_preview_update_rolls_back_message() {
        let (alice, id) = with_conversation().await;
        inject_failure(alice.backend().store(), "UPDATE ON conversations");

        let err = alice.send_message(&id, "lost").await.unwrap_err();
        assert!(matches!(err, ClientError::Store(StoreError::Sqlite(_))));

        let conversation = alice.get_conversation(&id).await.unwrap().unwrap();
        assert_eq!(conversation.last_message, "before");
        assert_eq!(conversation.timestamp, 1);
        let count = alice
            .backend()
            .read({
                let id = id.clone();
                move |db| db.count_messages(&id)
            })
            .await
            .unwrap();
        assert_eq!(count, 0);

        clear_failure(alice.backend().store());
        assert!(alice.send_message(&id, "found").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn outsiders_and_anonymous_cannot_send() {
        let (alice, id) = with_conversation().await;

        let carol = alice.with_session(Session::signed_in("c".into()));
        assert!(matches!(
            carol.send_message(&id, "hi").await,
            Err(ClientError::Validation(_))
        ));

        let nobody = Client::new(
            Session::anonymous(),
            alice.backend().store().clone(),
            ClientConfig::default(),
        );
        assert!(nobody.send_message(&id, "hi").await.unwrap().is_none());
        assert!(nobody.open_direct_conversation(&"b".into()).is_none());
    }

    #[test]
    fn direct_conversation_id_is_order_independent() {
        let store = seeded(&[]);
        let a = client(&store, "a").open_direct_conversation(&"b".into());
        let b = client(&store, "b").open_direct_conversation(&"a".into());
        assert_eq!(a, b);
        assert_eq!(a.unwrap().as_str(), "a_b");
    }
}
