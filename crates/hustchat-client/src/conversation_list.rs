//! Conversation list view model.
//!
//! Conversations are persisted without any partner data. This module joins
//! each direct conversation with its partner's profile, from the
//! [`ProfileCache`] when possible and otherwise through an independent
//! background fetch per row. A snapshot is emitted right away with the
//! misses marked pending; each fetch that completes later re-emits only its
//! own row.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use hustchat_shared::constants::UNRESOLVED_PARTNER_TITLE;
use hustchat_shared::UserId;
use hustchat_store::{Conversation, Profile};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::cache::ProfileCache;
use crate::error::Result;
use crate::subscription::Subscription;

/// Source of partner profiles missing from the cache.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn lookup(&self, id: &UserId) -> Result<Option<Profile>>;
}

#[async_trait]
impl ProfileLookup for Backend {
    async fn lookup(&self, id: &UserId) -> Result<Option<Profile>> {
        let id = id.clone();
        self.read(move |db| db.get_profile(&id)).await
    }
}

/// Display decoration of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Counterpart {
    /// Group conversations are shown by their own name.
    Group,
    /// Partner known but its profile is still being fetched.
    Pending(UserId),
    Resolved(Profile),
    /// The partner has no user record.
    NotFound(UserId),
    /// A direct conversation without exactly one other participant.
    Malformed,
}

/// A persisted conversation plus its display decoration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedConversation {
    pub conversation: Conversation,
    pub counterpart: Counterpart,
}

impl EnrichedConversation {
    /// Decorate `conversation` as seen by `current_user`, using cached
    /// profiles only.
    pub fn from_cache(
        conversation: Conversation,
        current_user: &UserId,
        cache: &ProfileCache,
    ) -> Self {
        let counterpart = if conversation.is_group() {
            Counterpart::Group
        } else {
            match partner_id(&conversation, current_user) {
                Some(partner) => match cache.get(&partner) {
                    Some(profile) => Counterpart::Resolved(profile),
                    None => Counterpart::Pending(partner),
                },
                None => Counterpart::Malformed,
            }
        };
        Self {
            conversation,
            counterpart,
        }
    }

    pub fn partner(&self) -> Option<&Profile> {
        match &self.counterpart {
            Counterpart::Resolved(profile) => Some(profile),
            Counterpart::Group
            | Counterpart::Pending(_)
            | Counterpart::NotFound(_)
            | Counterpart::Malformed => None,
        }
    }

    /// Group name, partner name, or a placeholder while unresolved.
    pub fn title(&self) -> &str {
        match &self.counterpart {
            Counterpart::Group => &self.conversation.group_name,
            Counterpart::Resolved(profile) => &profile.username,
            Counterpart::Pending(_) | Counterpart::NotFound(_) | Counterpart::Malformed => {
                UNRESOLVED_PARTNER_TITLE
            }
        }
    }

    /// Name the filter matches against; empty while unresolved.
    fn searchable_name(&self) -> &str {
        match &self.counterpart {
            Counterpart::Group => &self.conversation.group_name,
            Counterpart::Resolved(profile) => &profile.username,
            Counterpart::Pending(_) | Counterpart::NotFound(_) | Counterpart::Malformed => "",
        }
    }
}

/// The other participant of a direct conversation.
///
/// `None` unless there are exactly two participants and exactly one of them
/// is `current_user`.
pub fn partner_id(conversation: &Conversation, current_user: &UserId) -> Option<UserId> {
    match conversation.participant_ids.as_slice() {
        [a, b] if a == current_user && b != current_user => Some(b.clone()),
        [a, b] if b == current_user && a != current_user => Some(a.clone()),
        _ => None,
    }
}

/// Case-insensitive substring filter on the group or partner name.
///
/// The query is trimmed; an empty query keeps every row. Rows whose partner
/// is not resolved yet never match a non-empty query. Order is preserved.
pub fn filter_conversations<'a>(
    rows: &'a [EnrichedConversation],
    query: &str,
) -> Vec<&'a EnrichedConversation> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return rows.iter().collect();
    }
    rows.iter()
        .filter(|row| row.searchable_name().to_lowercase().contains(&needle))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent {
    /// A new authoritative list; replaces everything shown before.
    Snapshot(Vec<EnrichedConversation>),
    /// One row of the latest snapshot got its partner resolved.
    RowResolved {
        index: usize,
        row: EnrichedConversation,
    },
}

enum FetchOutcome {
    Found(Profile),
    Missing,
    Failed,
}

struct Resolution {
    generation: u64,
    index: usize,
    partner: UserId,
    outcome: FetchOutcome,
}

/// Live conversation list for one user.
pub struct ConversationList {
    current_user: UserId,
    lookup: Arc<dyn ProfileLookup>,
    cache: ProfileCache,
    /// Partners known to have no user record, so they are not fetched again.
    missing: HashSet<UserId>,
    subscription: Subscription<Conversation>,
    resolved_tx: mpsc::UnboundedSender<Resolution>,
    resolved_rx: mpsc::UnboundedReceiver<Resolution>,
    rows: Vec<EnrichedConversation>,
    /// Bumped per snapshot so late fetches for replaced rows are ignored.
    generation: u64,
    in_flight: usize,
    subscription_ended: bool,
    closed: bool,
}

impl ConversationList {
    pub fn new(
        current_user: UserId,
        lookup: Arc<dyn ProfileLookup>,
        cache: ProfileCache,
        subscription: Subscription<Conversation>,
    ) -> Self {
        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();
        Self {
            current_user,
            lookup,
            cache,
            missing: HashSet::new(),
            subscription,
            resolved_tx,
            resolved_rx,
            rows: Vec::new(),
            generation: 0,
            in_flight: 0,
            subscription_ended: false,
            closed: false,
        }
    }

    /// Rows as of the last emitted event.
    pub fn rows(&self) -> &[EnrichedConversation] {
        &self.rows
    }

    pub fn filtered(&self, query: &str) -> Vec<&EnrichedConversation> {
        filter_conversations(&self.rows, query)
    }

    /// Next list event.
    ///
    /// Returns `None` after [`ConversationList::unsubscribe`], after a
    /// subscription error has been reported, or once the subscription ended
    /// and every outstanding fetch has been delivered.
    pub async fn next(&mut self) -> Option<Result<ListEvent>> {
        loop {
            if self.closed {
                return None;
            }

            tokio::select! {
                snapshot = self.subscription.next(), if !self.subscription_ended => {
                    match snapshot {
                        Some(Ok(conversations)) => {
                            return Some(Ok(self.apply_snapshot(conversations)));
                        }
                        Some(Err(e)) => {
                            self.closed = true;
                            return Some(Err(e));
                        }
                        None => self.subscription_ended = true,
                    }
                }
                Some(resolution) = self.resolved_rx.recv(), if self.in_flight > 0 => {
                    self.in_flight -= 1;
                    if let Some(event) = self.apply_resolution(resolution) {
                        return Some(Ok(event));
                    }
                }
                else => return None,
            }
        }
    }

    pub fn unsubscribe(&mut self) {
        self.subscription.unsubscribe();
        self.closed = true;
    }

    fn apply_snapshot(&mut self, conversations: Vec<Conversation>) -> ListEvent {
        self.generation += 1;
        self.rows = conversations
            .into_iter()
            .map(|c| {
                let mut row = EnrichedConversation::from_cache(c, &self.current_user, &self.cache);
                if let Counterpart::Pending(partner) = &row.counterpart {
                    if self.missing.contains(partner) {
                        row.counterpart = Counterpart::NotFound(partner.clone());
                    }
                }
                row
            })
            .collect();

        let mut pending = Vec::new();
        for (index, row) in self.rows.iter().enumerate() {
            match &row.counterpart {
                Counterpart::Pending(partner) => pending.push((index, partner.clone())),
                Counterpart::Malformed => {
                    warn!(conversation = %row.conversation.id, "direct conversation without a single partner");
                }
                Counterpart::Group | Counterpart::Resolved(_) | Counterpart::NotFound(_) => {}
            }
        }
        for (index, partner) in pending {
            self.spawn_fetch(index, partner);
        }

        ListEvent::Snapshot(self.rows.clone())
    }

    fn spawn_fetch(&mut self, index: usize, partner: UserId) {
        self.in_flight += 1;

        let lookup = Arc::clone(&self.lookup);
        let cache = self.cache.clone();
        let tx = self.resolved_tx.clone();
        let generation = self.generation;

        tokio::spawn(async move {
            let outcome = match lookup.lookup(&partner).await {
                Ok(Some(profile)) => {
                    cache.insert(profile.clone());
                    FetchOutcome::Found(profile)
                }
                Ok(None) => FetchOutcome::Missing,
                Err(e) => {
                    warn!(user = %partner, error = %e, "partner profile fetch failed");
                    FetchOutcome::Failed
                }
            };
            let _ = tx.send(Resolution {
                generation,
                index,
                partner,
                outcome,
            });
        });
    }

    fn apply_resolution(&mut self, resolution: Resolution) -> Option<ListEvent> {
        if let FetchOutcome::Missing = resolution.outcome {
            self.missing.insert(resolution.partner.clone());
        }
        if resolution.generation != self.generation {
            debug!(user = %resolution.partner, "dropping profile for a replaced snapshot");
            return None;
        }

        let row = self.rows.get_mut(resolution.index)?;
        match &row.counterpart {
            Counterpart::Pending(partner) if *partner == resolution.partner => {}
            _ => return None,
        }

        row.counterpart = match resolution.outcome {
            FetchOutcome::Found(profile) => Counterpart::Resolved(profile),
            FetchOutcome::Missing => Counterpart::NotFound(resolution.partner),
            FetchOutcome::Failed => return None,
        };

        Some(ListEvent::RowResolved {
            index: resolution.index,
            row: row.clone(),
        })
    }
}
