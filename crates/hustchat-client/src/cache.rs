//! Session-scoped memoization of user profiles.

use std::sync::Arc;

use dashmap::DashMap;
use hustchat_shared::UserId;
use hustchat_store::Profile;

/// Profiles by user id. Entries are never evicted during a session; a later
/// write for the same id replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct ProfileCache {
    inner: Arc<DashMap<UserId, Profile>>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &UserId) -> Option<Profile> {
        self.inner.get(id).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, profile: Profile) {
        self.inner.insert(profile.id.clone(), profile);
    }

    pub fn contains(&self, id: &UserId) -> bool {
        self.inner.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, name: &str) -> Profile {
        Profile {
            id: id.into(),
            username: name.into(),
            avatar_url: None,
        }
    }

    #[test]
    fn last_write_wins() {
        let cache = ProfileCache::new();
        cache.insert(profile("a", "Alice"));
        cache.insert(profile("a", "Alicia"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"a".into()).unwrap().username, "Alicia");
    }

    #[tokio::test]
    async fn concurrent_writers_share_entries() {
        let cache = ProfileCache::new();
        let mut tasks = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                cache.insert(profile(&format!("u{}", i % 4), "Same"));
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(cache.len(), 4);
        assert!(cache.contains(&"u3".into()));
    }
}
