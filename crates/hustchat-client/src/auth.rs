//! Sign-in and registration on top of an external identity provider.
//!
//! The provider only knows emails and passwords. Phone-number logins are
//! resolved to an email through the user directory first, and registration
//! writes the directory record once the provider has created the account.

use async_trait::async_trait;
use hustchat_shared::UserId;
use hustchat_store::{Presence, User, WriteBatch, WriteOp};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::backend::Backend;
use crate::error::{ClientError, Result};

/// External account service (email/password).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> anyhow::Result<UserId>;

    async fn sign_up(&self, email: &str, password: &str) -> anyhow::Result<UserId>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Loading,
    /// Carries the id to build a [`crate::Session`] from.
    Success(UserId),
    /// Text to show the end user.
    Error(String),
}

pub struct AuthFlow<P> {
    backend: Backend,
    provider: P,
    state: watch::Sender<Option<AuthState>>,
}

impl<P: IdentityProvider> AuthFlow<P> {
    pub fn new(backend: Backend, provider: P) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            backend,
            provider,
            state,
        }
    }

    /// Observe state transitions. `None` until the first attempt.
    pub fn watch(&self) -> watch::Receiver<Option<AuthState>> {
        self.state.subscribe()
    }

    /// Sign in with an email, or with a phone number if `identifier` has no
    /// `@`.
    pub async fn login(&self, identifier: &str, password: &str) -> AuthState {
        self.set(AuthState::Loading);
        let outcome = match self.try_login(identifier.trim(), password).await {
            Ok(Some(user_id)) => {
                info!(user = %user_id, "signed in");
                AuthState::Success(user_id)
            }
            Ok(None) => AuthState::Error("Phone number is not registered!".into()),
            Err(e) => {
                warn!(error = %e, "sign in failed");
                AuthState::Error(format!("Login failed: {}", e.user_message()))
            }
        };
        self.set(outcome.clone());
        outcome
    }

    /// Create an account and its directory record.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        phone_number: &str,
        password: &str,
    ) -> AuthState {
        self.set(AuthState::Loading);
        let outcome = match self
            .try_register(username.trim(), email.trim(), phone_number.trim(), password)
            .await
        {
            Ok(Ok(user_id)) => {
                info!(user = %user_id, "registered");
                AuthState::Success(user_id)
            }
            Ok(Err(rejection)) => AuthState::Error(rejection.to_string()),
            Err(e) => {
                warn!(error = %e, "registration failed");
                AuthState::Error(format!("Registration failed: {}", e.user_message()))
            }
        };
        self.set(outcome.clone());
        outcome
    }

    /// `Ok(None)` for an unknown phone number.
    async fn try_login(&self, identifier: &str, password: &str) -> Result<Option<UserId>> {
        let email = if identifier.contains('@') {
            identifier.to_string()
        } else {
            let phone = identifier.to_string();
            let matches = self
                .backend
                .read(move |db| db.find_users_by_phone(&phone))
                .await?;
            match matches.into_iter().next() {
                Some(user) => user.email,
                None => return Ok(None),
            }
        };

        let user_id = self.provider.sign_in(&email, password).await?;
        Ok(Some(user_id))
    }

    /// Outer `Err` for failures, inner `Err` for a rejected duplicate.
    async fn try_register(
        &self,
        username: &str,
        email: &str,
        phone_number: &str,
        password: &str,
    ) -> Result<std::result::Result<UserId, &'static str>> {
        let (email_taken, phone_taken) = {
            let (email, phone) = (email.to_string(), phone_number.to_string());
            self.backend
                .read(move |db| {
                    Ok((
                        !db.find_users_by_email(&email)?.is_empty(),
                        !db.find_users_by_phone(&phone)?.is_empty(),
                    ))
                })
                .await?
        };
        if email_taken {
            return Ok(Err("This email is already in use!"));
        }
        if phone_taken {
            return Ok(Err("This phone number is already in use!"));
        }

        let user_id = self
            .provider
            .sign_up(email, password)
            .await
            .map_err(ClientError::Identity)?;

        let user = User {
            id: user_id.clone(),
            username: username.to_string(),
            email: email.to_string(),
            phone_number: phone_number.to_string(),
            avatar_url: None,
            status: Presence::Offline,
            last_seen: 0,
        };
        self.backend
            .commit(WriteBatch::from(vec![WriteOp::PutUser(user)]))
            .await?;

        Ok(Ok(user_id))
    }

    fn set(&self, state: AuthState) {
        self.state.send_replace(Some(state));
    }
}
