use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{DIRECT_ID_SEPARATOR, SYSTEM_SENDER_ID};
use crate::error::SharedError;

/// User identity as assigned by the external identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Validate an externally supplied id.
    ///
    /// The direct conversation id joins two user ids with `_`, so a user id
    /// containing the separator would make that id ambiguous.
    pub fn parse(s: &str) -> Result<Self, SharedError> {
        if s.is_empty() {
            return Err(SharedError::EmptyId);
        }
        if s.contains(DIRECT_ID_SEPARATOR) {
            return Err(SharedError::ReservedCharacter(DIRECT_ID_SEPARATOR));
        }
        Ok(Self(s.to_string()))
    }

    /// The reserved sender of automated announcements.
    pub fn system() -> Self {
        Self(SYSTEM_SENDER_ID.to_string())
    }

    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM_SENDER_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Conversation identifier.
///
/// Direct conversations use an id derived from the two participants, groups
/// use a random one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Canonical id of the direct conversation between `a` and `b`.
    ///
    /// `min(a, b) + "_" + max(a, b)` using ordinal comparison, so the result
    /// does not depend on argument order. Every code path that creates or
    /// looks up a direct conversation must go through here.
    pub fn direct(a: &UserId, b: &UserId) -> Self {
        let (lo, hi) = if a.0 <= b.0 { (a, b) } else { (b, a) };
        Self(format!("{}{}{}", lo.0, DIRECT_ID_SEPARATOR, hi.0))
    }

    /// Fresh id for a group conversation.
    pub fn random() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Store-assigned message identifier, unique within a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, SharedError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| SharedError::InvalidMessageId(s.to_string()))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Friend request identifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_id_is_commutative() {
        let pairs = [
            ("alice", "bob"),
            ("bob", "alice"),
            ("Zed", "adam"),
            ("u1", "u10"),
            ("same", "same"),
            ("", "x"),
        ];
        for (a, b) in pairs {
            let (a, b) = (UserId::from(a), UserId::from(b));
            assert_eq!(ConversationId::direct(&a, &b), ConversationId::direct(&b, &a));
        }
    }

    #[test]
    fn direct_id_orders_ordinally() {
        let id = ConversationId::direct(&"bob".into(), &"alice".into());
        assert_eq!(id.as_str(), "alice_bob");

        // Uppercase sorts before lowercase in byte order.
        let id = ConversationId::direct(&"adam".into(), &"Zed".into());
        assert_eq!(id.as_str(), "Zed_adam");
    }

    #[test]
    fn random_ids_differ() {
        assert_ne!(ConversationId::random(), ConversationId::random());
    }

    #[test]
    fn user_id_parse_rejects_separator_and_empty() {
        assert_eq!(UserId::parse(""), Err(SharedError::EmptyId));
        assert_eq!(
            UserId::parse("a_b"),
            Err(SharedError::ReservedCharacter('_'))
        );
        assert_eq!(UserId::parse("uid42").unwrap().as_str(), "uid42");
    }

    #[test]
    fn system_sender() {
        assert!(UserId::system().is_system());
        assert!(!UserId::from("alice").is_system());
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&UserId::from("alice")).unwrap();
        assert_eq!(json, "\"alice\"");
    }

    #[test]
    fn message_id_parse() {
        let id = MessageId::new();
        assert_eq!(MessageId::parse(&id.to_string()).unwrap(), id);
        assert!(MessageId::parse("nope").is_err());
    }
}
