//! Records persisted in the document store.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to a UI layer. Timestamps are epoch milliseconds.

use hustchat_shared::{ConversationId, MessageId, RequestId, UserId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Online,
    #[default]
    Offline,
}

impl Presence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Presence::Online => "online",
            Presence::Offline => "offline",
        }
    }

    /// Unknown values read back as offline.
    pub fn from_stored(s: &str) -> Self {
        match s {
            "online" => Presence::Online,
            _ => Presence::Offline,
        }
    }
}

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Id assigned by the identity provider.
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub phone_number: String,
    /// Avatar reference; `None` lets the UI draw a placeholder.
    pub avatar_url: Option<String>,
    pub status: Presence,
    /// Last presence heartbeat.
    pub last_seen: i64,
}

impl User {
    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id.clone(),
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

/// Denormalized display data of a user.
///
/// Copies of a profile (friend edges, caches) are snapshots and are not kept
/// in sync with later edits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    pub avatar_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    #[default]
    Direct,
    Group,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationKind::Direct => "direct",
            ConversationKind::Group => "group",
        }
    }

    /// Anything but `group` is a direct conversation.
    pub fn from_stored(s: &str) -> Self {
        match s {
            "group" => ConversationKind::Group,
            _ => ConversationKind::Direct,
        }
    }
}

/// A direct or group conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    /// Participants in insertion order, without duplicates.
    pub participant_ids: Vec<UserId>,
    pub kind: ConversationKind,
    /// Display name; empty for direct conversations.
    pub group_name: String,
    /// Preview of the latest message.
    pub last_message: String,
    /// Time of the latest activity, used to order the conversation list.
    pub timestamp: i64,
}

impl Conversation {
    pub fn is_group(&self) -> bool {
        self.kind == ConversationKind::Group
    }

    pub fn has_participant(&self, user_id: &UserId) -> bool {
        self.participant_ids.iter().any(|p| p == user_id)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message. Messages are append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    /// [`UserId::system`] for automated announcements.
    pub sender_id: UserId,
    pub content: String,
    pub timestamp: i64,
}

impl Message {
    /// Build a message with a fresh id.
    pub fn new(
        conversation_id: ConversationId,
        sender_id: UserId,
        content: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: MessageId::new(),
            conversation_id,
            sender_id,
            content: content.into(),
            timestamp,
        }
    }

    /// Build an announcement authored by the reserved system sender.
    pub fn system(
        conversation_id: ConversationId,
        content: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self::new(conversation_id, UserId::system(), content, timestamp)
    }

    pub fn is_system(&self) -> bool {
        self.sender_id.is_system()
    }
}

// ---------------------------------------------------------------------------
// Friend requests and friend edges
// ---------------------------------------------------------------------------

/// Requests are deleted on accept or decline, so `Pending` is the only
/// state ever stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
        }
    }

    /// `None` for a value this version does not know.
    pub fn from_stored(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FriendRequest {
    pub id: RequestId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub status: RequestStatus,
    pub timestamp: i64,
}

impl FriendRequest {
    pub fn pending(sender_id: UserId, receiver_id: UserId, timestamp: i64) -> Self {
        Self {
            id: RequestId::new(),
            sender_id,
            receiver_id,
            status: RequestStatus::Pending,
            timestamp,
        }
    }
}

/// One direction of a friendship: `owner` lists `friend` among its friends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FriendEdge {
    pub owner_id: UserId,
    /// Snapshot of the friend taken when the edge was written.
    pub friend: Profile,
}
