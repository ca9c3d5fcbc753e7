//! Message thread view model: messages interleaved with date headers.

use chrono::{Local, NaiveDate, TimeZone};
use hustchat_shared::constants::DATE_HEADER_ID_PREFIX;
use hustchat_shared::time::calendar_day;
use hustchat_shared::UserId;
use hustchat_store::Message;

use crate::error::Result;
use crate::subscription::Subscription;

/// One row of a message thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatItem {
    /// Synthesized separator before the first message of a calendar day.
    /// Never persisted.
    DateHeader { timestamp: i64 },
    Message(Message),
}

impl ChatItem {
    /// Stable identity for change detection.
    pub fn id(&self) -> String {
        match self {
            ChatItem::DateHeader { timestamp } => format!("{DATE_HEADER_ID_PREFIX}{timestamp}"),
            ChatItem::Message(message) => message.id.to_string(),
        }
    }

    pub fn is_header(&self) -> bool {
        match self {
            ChatItem::DateHeader { .. } => true,
            ChatItem::Message(_) => false,
        }
    }
}

/// Insert a date header before the first message of each calendar day.
///
/// `messages` must be in ascending timestamp order. Days are computed in
/// `tz`; the first message always gets a header and a header carries the
/// timestamp of the message it precedes. System messages are not treated
/// specially.
pub fn compose_chat_items<Tz: TimeZone>(messages: &[Message], tz: &Tz) -> Vec<ChatItem> {
    let mut items = Vec::with_capacity(messages.len() + 1);
    let mut current_day: Option<NaiveDate> = None;

    for (i, message) in messages.iter().enumerate() {
        let day = calendar_day(message.timestamp, tz);
        if i == 0 || day.is_none() || day != current_day {
            items.push(ChatItem::DateHeader {
                timestamp: message.timestamp,
            });
            current_day = day;
        }
        items.push(ChatItem::Message(message.clone()));
    }

    items
}

/// Whether `sender_id` is the reserved announcement sender, which has no
/// profile to look up.
pub fn is_system_sender(sender_id: &UserId) -> bool {
    sender_id.is_system()
}

/// [`compose_chat_items`] in the viewer's local time zone.
pub fn compose_chat_items_local(messages: &[Message]) -> Vec<ChatItem> {
    compose_chat_items(messages, &Local)
}

/// A message subscription mapped through [`compose_chat_items`].
pub struct ChatThread<Tz: TimeZone> {
    messages: Subscription<Message>,
    tz: Tz,
}

impl<Tz: TimeZone> ChatThread<Tz> {
    pub fn new(messages: Subscription<Message>, tz: Tz) -> Self {
        Self { messages, tz }
    }

    /// Next full list of chat items.
    pub async fn next(&mut self) -> Option<Result<Vec<ChatItem>>> {
        let snapshot = self.messages.next().await?;
        Some(snapshot.map(|messages| compose_chat_items(&messages, &self.tz)))
    }

    pub fn unsubscribe(&mut self) {
        self.messages.unsubscribe();
    }
}
