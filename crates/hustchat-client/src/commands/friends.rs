use hustchat_shared::constants::FRIENDSHIP_GREETING;
use hustchat_shared::time::now_millis;
use hustchat_shared::{ConversationId, RequestId, UserId};
use hustchat_store::{
    Conversation, ConversationKind, FriendEdge, FriendRequest, Message, Profile, WriteBatch,
    WriteOp,
};
use serde::Serialize;
use tracing::info;

use crate::client::Client;
use crate::error::{ClientError, Result};

/// A pending request joined with its sender's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncomingRequest {
    pub request: FriendRequest,
    /// `None` if the sender no longer has a user record.
    pub sender: Option<Profile>,
}

impl Client {
    /// Users whose email or phone number equals `query`, minus the current
    /// user and existing friends.
    pub async fn search_users(&self, query: &str) -> Result<Vec<Profile>> {
        let Some(me) = self.current_user().cloned() else {
            return Ok(Vec::new());
        };
        let query = query.trim().to_string();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        self.backend()
            .read(move |db| {
                let mut found: Vec<Profile> = Vec::new();
                let candidates = db
                    .find_users_by_email(&query)?
                    .into_iter()
                    .chain(db.find_users_by_phone(&query)?);
                for user in candidates {
                    if user.id == me || found.iter().any(|p| p.id == user.id) {
                        continue;
                    }
                    if db.are_friends(&me, &user.id)? {
                        continue;
                    }
                    found.push(user.profile());
                }
                Ok(found)
            })
            .await
    }

    pub async fn send_friend_request(&self, target: &UserId) -> Result<Option<RequestId>> {
        let Some(me) = self.current_user().cloned() else {
            return Ok(None);
        };
        if *target == me {
            return Err(ClientError::Validation(
                "You cannot send a friend request to yourself".into(),
            ));
        }

        let exists = {
            let target = target.clone();
            self.backend()
                .read(move |db| Ok(db.get_user(&target)?.is_some()))
                .await?
        };
        if !exists {
            return Err(ClientError::NotFound(format!("user {target}")));
        }

        let request = FriendRequest::pending(me, target.clone(), now_millis());
        let id = request.id;
        self.backend()
            .commit(WriteBatch::from(vec![WriteOp::PutFriendRequest(request)]))
            .await?;

        info!(request = %id, to = %target, "friend request sent");
        Ok(Some(id))
    }

    /// Pending requests addressed to the current user, newest first.
    pub async fn incoming_friend_requests(&self) -> Result<Vec<IncomingRequest>> {
        let Some(me) = self.current_user().cloned() else {
            return Ok(Vec::new());
        };

        let requests = self
            .backend()
            .read(move |db| db.list_pending_requests_for(&me))
            .await?;

        let mut incoming = Vec::with_capacity(requests.len());
        for request in requests {
            let sender = self.profile(&request.sender_id).await?;
            incoming.push(IncomingRequest { request, sender });
        }
        Ok(incoming)
    }

    /// Accept a request addressed to the current user.
    ///
    /// One batch removes the request, adds both friend edges, creates or
    /// updates the direct conversation and posts the greeting. Returns the
    /// conversation id.
    pub async fn accept_friend_request(
        &self,
        request: &FriendRequest,
    ) -> Result<Option<ConversationId>> {
        let Some(me) = self.current_user().cloned() else {
            return Ok(None);
        };
        if request.receiver_id != me {
            return Err(ClientError::Validation(
                "Only the recipient can accept this friend request".into(),
            ));
        }

        let requester_id = request.sender_id.clone();
        let (accepter, requester) = {
            let (me, requester_id) = (me.clone(), requester_id.clone());
            self.backend()
                .read(move |db| Ok((db.get_profile(&me)?, db.get_profile(&requester_id)?)))
                .await?
        };
        let accepter = accepter.ok_or_else(|| ClientError::NotFound(format!("user {me}")))?;
        let requester =
            requester.ok_or_else(|| ClientError::NotFound(format!("user {requester_id}")))?;

        let conversation_id = ConversationId::direct(&me, &requester_id);
        let now = now_millis();

        let batch = WriteBatch::from(vec![
            WriteOp::DeleteFriendRequest(request.id),
            WriteOp::PutFriendEdge(FriendEdge {
                owner_id: me.clone(),
                friend: requester.clone(),
            }),
            WriteOp::PutFriendEdge(FriendEdge {
                owner_id: requester_id.clone(),
                friend: accepter.clone(),
            }),
            WriteOp::MergeConversation(Conversation {
                id: conversation_id.clone(),
                participant_ids: vec![me, requester_id],
                kind: ConversationKind::Direct,
                group_name: String::new(),
                last_message: FRIENDSHIP_GREETING.to_string(),
                timestamp: now,
            }),
            WriteOp::InsertMessage(Message::system(
                conversation_id.clone(),
                FRIENDSHIP_GREETING,
                now,
            )),
        ]);
        self.backend().commit(batch).await?;

        self.profile_cache().insert(accepter);
        self.profile_cache().insert(requester);

        info!(request = %request.id, conversation = %conversation_id, "friend request accepted");
        Ok(Some(conversation_id))
    }

    /// Delete a request addressed to the current user without befriending.
    pub async fn decline_friend_request(&self, request: &FriendRequest) -> Result<()> {
        let Some(me) = self.current_user() else {
            return Ok(());
        };
        if request.receiver_id != *me {
            return Err(ClientError::Validation(
                "Only the recipient can decline this friend request".into(),
            ));
        }

        self.backend()
            .commit(WriteBatch::from(vec![WriteOp::DeleteFriendRequest(
                request.id,
            )]))
            .await?;

        info!(request = %request.id, "friend request declined");
        Ok(())
    }

    /// The current user's friends, ordered by name.
    pub async fn friends(&self) -> Result<Vec<Profile>> {
        let Some(me) = self.current_user().cloned() else {
            return Ok(Vec::new());
        };
        let edges = self.backend().read(move |db| db.list_friends(&me)).await?;
        Ok(edges.into_iter().map(|edge| edge.friend).collect())
    }
}
