//! Change notifications published after each committed batch.
//!
//! Notifications only say *what* changed. Live queries react by re-running
//! their query, so a lagging receiver loses nothing but intermediate
//! snapshots.

use hustchat_shared::{ConversationId, UserId};
use tokio::sync::broadcast;

/// Default capacity of the broadcast buffer.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// A conversation record was written. `participants` holds everyone who
    /// was a participant before or after the write.
    Conversation {
        id: ConversationId,
        participants: Vec<UserId>,
    },
    /// A message was appended to a conversation.
    Messages { conversation_id: ConversationId },
    /// A user record was written.
    User(UserId),
    /// A friend request between the two users was created or removed.
    FriendRequests { sender: UserId, receiver: UserId },
    /// The friend list of `owner` changed.
    Friends { owner: UserId },
}

impl Change {
    /// Whether the "conversations of `user_id`" query may have a new result.
    pub fn affects_conversations_of(&self, user_id: &UserId) -> bool {
        match self {
            Change::Conversation { participants, .. } => participants.contains(user_id),
            Change::Messages { .. }
            | Change::User(_)
            | Change::FriendRequests { .. }
            | Change::Friends { .. } => false,
        }
    }

    /// Whether the "messages of `conversation_id`" query may have a new result.
    pub fn affects_messages_of(&self, conversation_id: &ConversationId) -> bool {
        match self {
            Change::Messages { conversation_id: id } => id == conversation_id,
            Change::Conversation { .. }
            | Change::User(_)
            | Change::FriendRequests { .. }
            | Change::Friends { .. } => false,
        }
    }
}

/// Fan-out of [`Change`]s to every live query.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Change>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }

    pub fn publish(&self, changes: Vec<Change>) {
        for change in changes {
            // No receivers is the normal idle state.
            let _ = self.tx.send(change);
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}
