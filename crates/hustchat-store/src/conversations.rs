//! Queries over [`Conversation`] records.

use hustchat_shared::{ConversationId, UserId};
use rusqlite::{params, Connection};

use crate::database::{optional, Database};
use crate::error::Result;
use crate::models::{Conversation, ConversationKind};

impl Database {
    /// Fetch a single conversation by id.
    pub fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        let header = optional(self.conn().query_row(
            "SELECT id, kind, group_name, last_message, timestamp
             FROM conversations WHERE id = ?1",
            params![id.as_str()],
            row_to_header,
        ))?;

        match header {
            Some(mut conversation) => {
                conversation.participant_ids = load_participants(self.conn(), id)?;
                Ok(Some(conversation))
            }
            None => Ok(None),
        }
    }

    /// Conversations the user participates in, latest activity first.
    ///
    /// Ties on the timestamp are ordered by id so consecutive snapshots of an
    /// unchanged set are identical.
    pub fn list_conversations_for_user(&self, user_id: &UserId) -> Result<Vec<Conversation>> {
        let mut stmt = self.conn().prepare(
            "SELECT c.id, c.kind, c.group_name, c.last_message, c.timestamp
             FROM conversations c
             JOIN conversation_participants p ON p.conversation_id = c.id
             WHERE p.user_id = ?1
             ORDER BY c.timestamp DESC, c.id ASC",
        )?;

        let rows = stmt.query_map(params![user_id.as_str()], row_to_header)?;

        let mut conversations = Vec::new();
        for row in rows {
            let mut conversation = row?;
            conversation.participant_ids = load_participants(self.conn(), &conversation.id)?;
            conversations.push(conversation);
        }
        Ok(conversations)
    }
}

/// Participant ids in insertion order. Also used while applying batches.
pub(crate) fn load_participants(conn: &Connection, id: &ConversationId) -> Result<Vec<UserId>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM conversation_participants
         WHERE conversation_id = ?1
         ORDER BY position ASC",
    )?;
    let rows = stmt.query_map(params![id.as_str()], |row| row.get::<_, String>(0))?;

    let mut participants = Vec::new();
    for row in rows {
        participants.push(UserId(row?));
    }
    Ok(participants)
}

/// Everything but the participant list, which lives in its own table.
fn row_to_header(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let id: String = row.get(0)?;
    let kind: String = row.get(1)?;
    Ok(Conversation {
        id: ConversationId(id),
        participant_ids: Vec::new(),
        kind: ConversationKind::from_stored(&kind),
        group_name: row.get(2)?,
        last_message: row.get(3)?,
        timestamp: row.get(4)?,
    })
}
