//! One-shot operations on behalf of the signed-in user.
//!
//! Each sub-module adds an `impl Client` block for one domain. Operations
//! called without a signed-in user are no-ops returning `Ok(None)`, an empty
//! list or `Ok(())`.

pub mod friends;
pub mod groups;
pub mod messaging;
pub mod profile;

#[cfg(test)]
pub(crate) mod test_support {
    use hustchat_store::{Presence, Store, User, WriteBatch, WriteOp};

    use crate::client::Client;
    use crate::config::ClientConfig;
    use crate::session::Session;

    pub(crate) fn user(id: &str, name: &str, phone: &str) -> User {
        User {
            id: id.into(),
            username: name.into(),
            email: format!("{id}@example.com"),
            phone_number: phone.into(),
            avatar_url: None,
            status: Presence::Offline,
            last_seen: 0,
        }
    }

    /// In-memory store holding `users`.
    pub(crate) fn seeded(users: &[User]) -> Store {
        let store = Store::in_memory().unwrap();
        let ops = users.iter().cloned().map(WriteOp::PutUser).collect::<Vec<_>>();
        store.commit(&WriteBatch::from(ops)).unwrap();
        store
    }

    pub(crate) fn client(store: &Store, id: &str) -> Client {
        Client::new(
            Session::signed_in(id.into()),
            store.clone(),
            ClientConfig::default(),
        )
    }

    /// Make every later write matching `event` (e.g. `INSERT ON messages`)
    /// abort its transaction.
    pub(crate) fn inject_failure(store: &Store, event: &str) {
        let sql = format!(
            "CREATE TRIGGER injected_failure BEFORE {event}
             BEGIN SELECT RAISE(ABORT, 'injected failure'); END;"
        );
        store
            .read(|db| db.conn().execute_batch(&sql).map_err(Into::into))
            .unwrap();
    }

    pub(crate) fn clear_failure(store: &Store) {
        store
            .read(|db| {
                db.conn()
                    .execute_batch("DROP TRIGGER injected_failure;")
                    .map_err(Into::into)
            })
            .unwrap();
    }
}
