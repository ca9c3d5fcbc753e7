use hustchat_shared::{ConversationId, MessageId, UserId};
use rusqlite::params;

use crate::database::{conversion_error, optional, Database};
use crate::error::Result;
use crate::models::Message;

impl Database {
    /// Messages of a conversation, oldest first.
    ///
    /// Messages sharing a timestamp keep the order in which they were
    /// committed.
    pub fn list_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, conversation_id, sender_id, content, timestamp
             FROM messages
             WHERE conversation_id = ?1
             ORDER BY timestamp ASC, seq ASC",
        )?;

        let rows = stmt.query_map(params![conversation_id.as_str()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn get_message(&self, id: &MessageId) -> Result<Option<Message>> {
        optional(self.conn().query_row(
            "SELECT id, conversation_id, sender_id, content, timestamp
             FROM messages WHERE id = ?1",
            params![id.to_string()],
            row_to_message,
        ))
    }

    pub fn count_messages(&self, conversation_id: &ConversationId) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
            params![conversation_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let conversation_id: String = row.get(1)?;
    let sender_id: String = row.get(2)?;

    let id = MessageId::parse(&id_str).map_err(|e| conversion_error(0, e))?;

    Ok(Message {
        id,
        conversation_id: ConversationId(conversation_id),
        sender_id: UserId(sender_id),
        content: row.get(3)?,
        timestamp: row.get(4)?,
    })
}
