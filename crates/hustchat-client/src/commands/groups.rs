use hustchat_shared::constants::{group_created_announcement, MIN_GROUP_MEMBERS};
use hustchat_shared::time::now_millis;
use hustchat_shared::{ConversationId, UserId};
use hustchat_store::{Conversation, ConversationKind, Message, WriteBatch, WriteOp};
use tracing::info;

use crate::client::Client;
use crate::error::{ClientError, Result};

impl Client {
    /// Create a group with the chosen members plus the current user.
    ///
    /// Members are deduplicated in order; the creator is appended last.
    pub async fn create_group(
        &self,
        name: &str,
        member_ids: &[UserId],
    ) -> Result<Option<ConversationId>> {
        let Some(creator) = self.current_user().cloned() else {
            return Ok(None);
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::Validation("Please enter the group name".into()));
        }

        let mut participants: Vec<UserId> = Vec::with_capacity(member_ids.len() + 1);
        for member in member_ids {
            if *member != creator && !participants.contains(member) {
                participants.push(member.clone());
            }
        }
        if participants.len() < MIN_GROUP_MEMBERS {
            return Err(ClientError::Validation(format!(
                "Please select at least {MIN_GROUP_MEMBERS} members"
            )));
        }
        participants.push(creator);

        let id = ConversationId::random();
        let announcement = group_created_announcement(name);
        let now = now_millis();

        let batch = WriteBatch::from(vec![
            WriteOp::PutConversation(Conversation {
                id: id.clone(),
                participant_ids: participants,
                kind: ConversationKind::Group,
                group_name: name.to_string(),
                last_message: announcement.clone(),
                timestamp: now,
            }),
            WriteOp::InsertMessage(Message::system(id.clone(), announcement, now)),
        ]);
        self.backend().commit(batch).await?;

        info!(conversation = %id, name, "group created");
        Ok(Some(id))
    }

    /// Rename a group. Direct conversations cannot be renamed.
    pub async fn update_group_name(&self, id: &ConversationId, name: &str) -> Result<()> {
        if self.current_user().is_none() {
            return Ok(());
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::Validation("Please enter the group name".into()));
        }

        let conversation = self
            .get_conversation(id)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("conversation {id}")))?;
        if !conversation.is_group() {
            return Err(ClientError::Validation(
                "Only group conversations can be renamed".into(),
            ));
        }

        self.backend()
            .commit(WriteBatch::from(vec![WriteOp::RenameGroup {
                id: id.clone(),
                group_name: name.to_string(),
            }]))
            .await?;

        info!(conversation = %id, name, "group renamed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{client, seeded, user};

    #[tokio::test]
    async fn creates_group_with_announcement() {
        let store = seeded(&[
            user("me", "Me", "1"),
            user("x", "X", "2"),
            user("y", "Y", "3"),
        ]);
        let me = client(&store, "me");

        let members: Vec<UserId> = vec!["x".into(), "y".into(), "x".into(), "me".into()];
        let id = me.create_group(" Team A ", &members).await.unwrap().unwrap();

        let group = me.get_conversation(&id).await.unwrap().unwrap();
        assert!(group.is_group());
        assert_eq!(group.group_name, "Team A");
        assert_eq!(
            group.participant_ids,
            vec![UserId::from("x"), UserId::from("y"), UserId::from("me")]
        );
        assert_eq!(group.last_message, "Group \"Team A\" has been created.");

        let messages = me
            .backend()
            .read(move |db| db.list_messages(&id))
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_system());
        assert_eq!(messages[0].content, group.last_message);

        // Every member sees it.
        let mut listed = client(&store, "y").subscribe_conversations();
        assert_eq!(listed.next().await.unwrap().unwrap()[0].id, group.id);
    }

    #[tokio::test]
    async fn group_validation() {
        let store = seeded(&[user("me", "Me", "1")]);
        let me = client(&store, "me");

        assert!(matches!(
            me.create_group("   ", &["x".into(), "y".into()]).await,
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            me.create_group("Duo", &["x".into(), "x".into(), "me".into()]).await,
            Err(ClientError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn rename_only_groups() {
        let store = seeded(&[user("me", "Me", "1")]);
        let me = client(&store, "me");
        let id = me
            .create_group("Old", &["x".into(), "y".into()])
            .await
            .unwrap()
            .unwrap();

        me.update_group_name(&id, "New").await.unwrap();
        let group = me.get_conversation(&id).await.unwrap().unwrap();
        assert_eq!(group.group_name, "New");
        assert_eq!(group.last_message, "Group \"Old\" has been created.");

        let direct = ConversationId::direct(&"me".into(), &"x".into());
        me.backend()
            .commit(WriteBatch::from(vec![WriteOp::PutConversation(Conversation {
                id: direct.clone(),
                participant_ids: vec!["me".into(), "x".into()],
                kind: ConversationKind::Direct,
                group_name: String::new(),
                last_message: String::new(),
                timestamp: 0,
            })]))
            .await
            .unwrap();
        assert!(matches!(
            me.update_group_name(&direct, "Nope").await,
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            me.update_group_name(&"missing".into(), "Nope").await,
            Err(ClientError::NotFound(_))
        ));
    }
}
