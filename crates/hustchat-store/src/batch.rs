//! Atomic multi-record writes.
//!
//! A [`WriteBatch`] is an ordered list of [`WriteOp`]s. [`Database::apply_batch`]
//! runs them inside one SQLite transaction: if any operation fails the
//! transaction is rolled back and none of the batch is visible.

use hustchat_shared::{ConversationId, RequestId, UserId};
use rusqlite::{params, Connection};

use crate::changes::Change;
use crate::conversations::load_participants;
use crate::database::{optional, Database};
use crate::error::{Result, StoreError};
use crate::models::{Conversation, FriendEdge, FriendRequest, Message, Presence, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Create or fully replace a user record.
    PutUser(User),
    UpdateUsername { user_id: UserId, username: String },
    SetPresence {
        user_id: UserId,
        status: Presence,
        last_seen: i64,
    },
    PutFriendRequest(FriendRequest),
    /// Fails with [`StoreError::NotFound`] if the request is already gone.
    DeleteFriendRequest(RequestId),
    /// Create or replace one direction of a friendship.
    PutFriendEdge(FriendEdge),
    /// Create or fully replace a conversation, participants included.
    PutConversation(Conversation),
    /// Create the conversation if absent; otherwise update the preview and
    /// add missing participants, leaving kind and group name untouched.
    MergeConversation(Conversation),
    /// Fails with [`StoreError::NotFound`] if the conversation does not exist.
    UpdateConversationPreview {
        id: ConversationId,
        last_message: String,
        timestamp: i64,
    },
    /// Fails with [`StoreError::NotFound`] if the conversation does not exist.
    RenameGroup {
        id: ConversationId,
        group_name: String,
    },
    /// Append a message. The parent conversation must exist.
    InsertMessage(Message),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl From<Vec<WriteOp>> for WriteBatch {
    fn from(ops: Vec<WriteOp>) -> Self {
        Self { ops }
    }
}

impl Database {
    /// Apply every operation of `batch` in one transaction.
    ///
    /// Returns the changes to publish once the caller knows the commit went
    /// through. On error nothing is written.
    pub fn apply_batch(&mut self, batch: &WriteBatch) -> Result<Vec<Change>> {
        let tx = self.conn_mut().transaction()?;

        let mut changes = Vec::with_capacity(batch.len());
        for op in batch.ops() {
            apply_op(&tx, op, &mut changes)?;
        }

        tx.commit()?;

        tracing::debug!(ops = batch.len(), changes = changes.len(), "batch committed");
        Ok(changes)
    }
}

fn apply_op(conn: &Connection, op: &WriteOp, changes: &mut Vec<Change>) -> Result<()> {
    match op {
        WriteOp::PutUser(user) => {
            conn.execute(
                "INSERT INTO users (id, username, email, phone_number, avatar_url, status, last_seen)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    username = excluded.username,
                    email = excluded.email,
                    phone_number = excluded.phone_number,
                    avatar_url = excluded.avatar_url,
                    status = excluded.status,
                    last_seen = excluded.last_seen",
                params![
                    user.id.as_str(),
                    user.username,
                    user.email,
                    user.phone_number,
                    user.avatar_url,
                    user.status.as_str(),
                    user.last_seen,
                ],
            )?;
            changes.push(Change::User(user.id.clone()));
        }

        WriteOp::UpdateUsername { user_id, username } => {
            let affected = conn.execute(
                "UPDATE users SET username = ?1 WHERE id = ?2",
                params![username, user_id.as_str()],
            )?;
            require_row(affected, || format!("user {user_id}"))?;
            changes.push(Change::User(user_id.clone()));
        }

        WriteOp::SetPresence {
            user_id,
            status,
            last_seen,
        } => {
            let affected = conn.execute(
                "UPDATE users SET status = ?1, last_seen = ?2 WHERE id = ?3",
                params![status.as_str(), last_seen, user_id.as_str()],
            )?;
            require_row(affected, || format!("user {user_id}"))?;
            changes.push(Change::User(user_id.clone()));
        }

        WriteOp::PutFriendRequest(request) => {
            conn.execute(
                "INSERT INTO friend_requests (id, sender_id, receiver_id, status, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    request.id.to_string(),
                    request.sender_id.as_str(),
                    request.receiver_id.as_str(),
                    request.status.as_str(),
                    request.timestamp,
                ],
            )?;
            changes.push(Change::FriendRequests {
                sender: request.sender_id.clone(),
                receiver: request.receiver_id.clone(),
            });
        }

        WriteOp::DeleteFriendRequest(id) => {
            let parties = optional(conn.query_row(
                "SELECT sender_id, receiver_id FROM friend_requests WHERE id = ?1",
                params![id.to_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            ))?;
            let (sender, receiver) =
                parties.ok_or_else(|| StoreError::NotFound(format!("friend request {id}")))?;

            conn.execute(
                "DELETE FROM friend_requests WHERE id = ?1",
                params![id.to_string()],
            )?;
            changes.push(Change::FriendRequests {
                sender: UserId(sender),
                receiver: UserId(receiver),
            });
        }

        WriteOp::PutFriendEdge(edge) => {
            conn.execute(
                "INSERT OR REPLACE INTO friends (owner_id, friend_id, username, avatar_url)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    edge.owner_id.as_str(),
                    edge.friend.id.as_str(),
                    edge.friend.username,
                    edge.friend.avatar_url,
                ],
            )?;
            changes.push(Change::Friends {
                owner: edge.owner_id.clone(),
            });
        }

        WriteOp::PutConversation(conversation) => {
            let before = load_participants(conn, &conversation.id)?;
            conn.execute(
                "INSERT INTO conversations (id, kind, group_name, last_message, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    kind = excluded.kind,
                    group_name = excluded.group_name,
                    last_message = excluded.last_message,
                    timestamp = excluded.timestamp",
                params![
                    conversation.id.as_str(),
                    conversation.kind.as_str(),
                    conversation.group_name,
                    conversation.last_message,
                    conversation.timestamp,
                ],
            )?;
            conn.execute(
                "DELETE FROM conversation_participants WHERE conversation_id = ?1",
                params![conversation.id.as_str()],
            )?;
            add_participants(conn, &conversation.id, &conversation.participant_ids)?;
            push_conversation_change(conn, &conversation.id, before, changes)?;
        }

        WriteOp::MergeConversation(conversation) => {
            let before = load_participants(conn, &conversation.id)?;
            conn.execute(
                "INSERT INTO conversations (id, kind, group_name, last_message, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    last_message = excluded.last_message,
                    timestamp = excluded.timestamp",
                params![
                    conversation.id.as_str(),
                    conversation.kind.as_str(),
                    conversation.group_name,
                    conversation.last_message,
                    conversation.timestamp,
                ],
            )?;
            add_participants(conn, &conversation.id, &conversation.participant_ids)?;
            push_conversation_change(conn, &conversation.id, before, changes)?;
        }

        WriteOp::UpdateConversationPreview {
            id,
            last_message,
            timestamp,
        } => {
            let affected = conn.execute(
                "UPDATE conversations SET last_message = ?1, timestamp = ?2 WHERE id = ?3",
                params![last_message, timestamp, id.as_str()],
            )?;
            require_row(affected, || format!("conversation {id}"))?;
            push_conversation_change(conn, id, Vec::new(), changes)?;
        }

        WriteOp::RenameGroup { id, group_name } => {
            let affected = conn.execute(
                "UPDATE conversations SET group_name = ?1 WHERE id = ?2",
                params![group_name, id.as_str()],
            )?;
            require_row(affected, || format!("conversation {id}"))?;
            push_conversation_change(conn, id, Vec::new(), changes)?;
        }

        WriteOp::InsertMessage(message) => {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, content, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    message.id.to_string(),
                    message.conversation_id.as_str(),
                    message.sender_id.as_str(),
                    message.content,
                    message.timestamp,
                ],
            )?;
            changes.push(Change::Messages {
                conversation_id: message.conversation_id.clone(),
            });
        }
    }

    Ok(())
}

fn require_row(affected: usize, what: impl FnOnce() -> String) -> Result<()> {
    if affected == 0 {
        return Err(StoreError::NotFound(what()));
    }
    Ok(())
}

/// Append participants not yet present, keeping first-seen order.
fn add_participants(conn: &Connection, id: &ConversationId, participants: &[UserId]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO conversation_participants (conversation_id, user_id, position)
         VALUES (?1, ?2, (SELECT COALESCE(MAX(position), -1) + 1
                          FROM conversation_participants WHERE conversation_id = ?1))",
    )?;
    for participant in participants {
        stmt.execute(params![id.as_str(), participant.as_str()])?;
    }
    Ok(())
}

fn push_conversation_change(
    conn: &Connection,
    id: &ConversationId,
    mut participants: Vec<UserId>,
    changes: &mut Vec<Change>,
) -> Result<()> {
    for participant in load_participants(conn, id)? {
        if !participants.contains(&participant) {
            participants.push(participant);
        }
    }
    changes.push(Change::Conversation {
        id: id.clone(),
        participants,
    });
    Ok(())
}
