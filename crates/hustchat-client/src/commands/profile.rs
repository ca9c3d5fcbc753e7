use hustchat_shared::time::now_millis;
use hustchat_shared::UserId;
use hustchat_store::{Presence, Profile, User, WriteBatch, WriteOp};
use tracing::{debug, info};

use crate::client::Client;
use crate::error::{ClientError, Result};

impl Client {
    pub async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let id = id.clone();
        self.backend().read(move |db| db.get_user(&id)).await
    }

    /// Profile of `id`, served from the profile cache when possible.
    pub async fn profile(&self, id: &UserId) -> Result<Option<Profile>> {
        if let Some(profile) = self.profile_cache().get(id) {
            return Ok(Some(profile));
        }

        let fetched = {
            let id = id.clone();
            self.backend().read(move |db| db.get_profile(&id)).await?
        };
        if let Some(profile) = &fetched {
            self.profile_cache().insert(profile.clone());
        } else {
            debug!(user = %id, "no profile");
        }
        Ok(fetched)
    }

    /// Profile of a message sender. The system sender has none.
    pub async fn resolve_sender(&self, sender_id: &UserId) -> Result<Option<Profile>> {
        if sender_id.is_system() {
            return Ok(None);
        }
        self.profile(sender_id).await
    }

    pub async fn update_username(&self, username: &str) -> Result<()> {
        let Some(me) = self.current_user().cloned() else {
            return Ok(());
        };
        let username = username.trim();
        if username.is_empty() {
            return Err(ClientError::Validation("Username cannot be empty".into()));
        }

        self.backend()
            .commit(WriteBatch::from(vec![WriteOp::UpdateUsername {
                user_id: me.clone(),
                username: username.to_string(),
            }]))
            .await?;

        if let Some(mut profile) = self.profile_cache().get(&me) {
            profile.username = username.to_string();
            self.profile_cache().insert(profile);
        }

        info!(user = %me, "username updated");
        Ok(())
    }

    /// Record the current user's presence with `last_seen = now`.
    pub async fn set_presence(&self, status: Presence) -> Result<()> {
        let Some(me) = self.current_user().cloned() else {
            return Ok(());
        };

        self.backend()
            .commit(WriteBatch::from(vec![WriteOp::SetPresence {
                user_id: me.clone(),
                status,
                last_seen: now_millis(),
            }]))
            .await?;

        debug!(user = %me, status = status.as_str(), "presence updated");
        Ok(())
    }
}
