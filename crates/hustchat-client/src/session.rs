//! The signed-in user, passed explicitly to every component that needs it.

use hustchat_shared::UserId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    user_id: Option<UserId>,
}

impl Session {
    pub fn signed_in(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// `None` when nobody is signed in; operations then no-op.
    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user_id.is_some()
    }
}
