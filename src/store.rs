//! In-memory, observable entity collection backing one list context
//! (one feed page-set, one conversation, one chat list).

use std::cmp::Ordering;

use crate::entity::UnixTimeMs;

/// Behavior the store needs from anything it manages.
pub trait StoreEntity {
    /// Merge key once the server has named the entity.
    fn server_key(&self) -> Option<&str>;
    /// Fallback merge key while the id is still provisional.
    fn local_key(&self) -> Option<&str>;
    fn sort_key(&self) -> UnixTimeMs;
    /// Field-level merge; the entity decides which side wins per field.
    fn merge_from(&mut self, incoming: Self);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StoreOrder {
    /// Keep server-returned arrival order (feeds, follower lists).
    Arrival,
    /// `sort_key` descending with a key tiebreak (conversations).
    NewestFirst,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Merged,
    /// The store was torn down; late results are dropped, not applied.
    Discarded,
}

#[derive(Debug)]
pub struct EntityStore<T> {
    order: StoreOrder,
    items: Vec<T>,
    closed: bool,
}

impl<T: StoreEntity> EntityStore<T> {
    #[must_use]
    pub fn new(order: StoreOrder) -> Self {
        Self {
            order,
            items: Vec::new(),
            closed: false,
        }
    }

    /// Insert if unseen, merge otherwise. Matching tries the server key
    /// first, then the local key while the server id is still provisional.
    pub fn upsert(&mut self, entity: T) -> UpsertOutcome {
        if self.closed {
            return UpsertOutcome::Discarded;
        }

        let outcome = match self.position_of(&entity) {
            Some(index) => {
                self.items[index].merge_from(entity);
                UpsertOutcome::Merged
            }
            None => {
                self.items.push(entity);
                UpsertOutcome::Inserted
            }
        };

        self.restore_order();
        outcome
    }

    /// Roll back an optimistic entity that never made it to the server.
    pub fn remove_local(&mut self, local_key: &str) -> Option<T> {
        let index = self
            .items
            .iter()
            .position(|e| e.local_key() == Some(local_key))?;
        Some(self.items.remove(index))
    }

    /// Wholesale replacement, used by refresh.
    pub fn replace_all(&mut self, entities: Vec<T>) {
        if self.closed {
            return;
        }
        self.items = entities;
        self.restore_order();
    }

    /// The ordered sequence the presentation layer renders from.
    /// Deterministic for a given internal state.
    #[must_use]
    pub fn snapshot(&self) -> &[T] {
        &self.items
    }

    #[must_use]
    pub fn get_server(&self, server_key: &str) -> Option<&T> {
        self.items.iter().find(|e| e.server_key() == Some(server_key))
    }

    pub fn get_server_mut(&mut self, server_key: &str) -> Option<&mut T> {
        self.items
            .iter_mut()
            .find(|e| e.server_key() == Some(server_key))
    }

    pub fn get_local_mut(&mut self, local_key: &str) -> Option<&mut T> {
        self.items
            .iter_mut()
            .find(|e| e.local_key() == Some(local_key))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Teardown guard: after this, every mutation is a no-op.
    pub fn close(&mut self) {
        self.closed = true;
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn position_of(&self, entity: &T) -> Option<usize> {
        if let Some(key) = entity.server_key() {
            if let Some(index) = self.items.iter().position(|e| e.server_key() == Some(key)) {
                return Some(index);
            }
        }
        if let Some(key) = entity.local_key() {
            return self.items.iter().position(|e| e.local_key() == Some(key));
        }
        None
    }

    fn restore_order(&mut self) {
        if self.order == StoreOrder::NewestFirst {
            self.items.sort_by(compare_newest_first);
        }
    }
}

fn compare_newest_first<T: StoreEntity>(a: &T, b: &T) -> Ordering {
    b.sort_key()
        .cmp(&a.sort_key())
        .then_with(|| identity_of(b).cmp(identity_of(a)))
}

fn identity_of<T: StoreEntity>(e: &T) -> &str {
    e.server_key().or_else(|| e.local_key()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::sample_video;
    use crate::entity::{
        ConfirmationState, ConversationId, Message, MessageId, MessageOrigin, UnixTimeMs, UserId,
    };

    fn remote_message(id: &str, at: u64) -> Message {
        Message {
            id: MessageId::new(id),
            local_id: None,
            conversation_id: ConversationId::new("c1"),
            sender_id: UserId::new("peer"),
            body: format!("msg {id}"),
            created_at: UnixTimeMs(at),
            origin: MessageOrigin::Remote,
            confirmation: ConfirmationState::Confirmed,
        }
    }

    #[test]
    fn upsert_inserts_then_merges() {
        let mut store = EntityStore::new(StoreOrder::Arrival);
        assert_eq!(store.upsert(sample_video("v1")), UpsertOutcome::Inserted);

        let mut update = sample_video("v1");
        update.like_count = 7;
        assert_eq!(store.upsert(update), UpsertOutcome::Merged);

        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot()[0].like_count, 7);
    }

    #[test]
    fn arrival_order_is_preserved() {
        let mut store = EntityStore::new(StoreOrder::Arrival);
        store.upsert(sample_video("b"));
        store.upsert(sample_video("a"));
        store.upsert(sample_video("c"));

        let ids: Vec<_> = store.snapshot().iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn newest_first_orders_by_timestamp_descending() {
        let mut store = EntityStore::new(StoreOrder::NewestFirst);
        store.upsert(remote_message("1", 100));
        store.upsert(remote_message("2", 300));
        store.upsert(remote_message("3", 200));

        let ids: Vec<_> = store.snapshot().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3", "1"]);
    }

    #[test]
    fn newest_first_tiebreak_is_deterministic() {
        let mut a = EntityStore::new(StoreOrder::NewestFirst);
        a.upsert(remote_message("x", 100));
        a.upsert(remote_message("y", 100));

        let mut b = EntityStore::new(StoreOrder::NewestFirst);
        b.upsert(remote_message("y", 100));
        b.upsert(remote_message("x", 100));

        let ids_a: Vec<_> = a.snapshot().iter().map(|m| m.id.as_str()).collect();
        let ids_b: Vec<_> = b.snapshot().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn pending_message_matched_by_local_key() {
        let mut store = EntityStore::new(StoreOrder::NewestFirst);
        let pending = Message::compose(
            ConversationId::new("c1"),
            UserId::new("me"),
            "on my way".into(),
            UnixTimeMs(500),
        );
        let local_key = pending.local_id.clone().map(|l| l.0).unwrap_or_default();
        store.upsert(pending);

        // The authoritative copy arrives under a server id but echoes the
        // client reference; one entity must remain, now keyed by the server.
        let mut authoritative = remote_message("srv-1", 600);
        authoritative.local_id = Some(crate::entity::LocalId::new(&local_key));
        assert_eq!(store.upsert(authoritative), UpsertOutcome::Merged);

        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot()[0].server_key(), Some("srv-1"));
    }

    #[test]
    fn remove_local_rolls_back_pending_entity() {
        let mut store = EntityStore::new(StoreOrder::NewestFirst);
        let pending = Message::compose(
            ConversationId::new("c1"),
            UserId::new("me"),
            "oops".into(),
            UnixTimeMs(500),
        );
        let key = pending.local_id.clone().map(|l| l.0).unwrap_or_default();
        store.upsert(pending);

        let removed = store.remove_local(&key);
        assert_eq!(removed.map(|m| m.body), Some("oops".to_string()));
        assert!(store.is_empty());
        assert!(store.remove_local(&key).is_none());
    }

    #[test]
    fn replace_all_discards_previous_contents() {
        let mut store = EntityStore::new(StoreOrder::Arrival);
        for i in 0..20 {
            store.upsert(sample_video(&format!("old-{i}")));
        }

        store.replace_all((0..10).map(|i| sample_video(&format!("new-{i}"))).collect());

        assert_eq!(store.len(), 10);
        assert!(store.snapshot().iter().all(|v| v.id.as_str().starts_with("new-")));
    }

    #[test]
    fn closed_store_ignores_mutation() {
        let mut store = EntityStore::new(StoreOrder::NewestFirst);
        store.upsert(remote_message("1", 100));
        store.close();

        assert_eq!(store.upsert(remote_message("2", 200)), UpsertOutcome::Discarded);
        store.replace_all(vec![remote_message("3", 300)]);

        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot()[0].id.as_str(), "1");
    }

    #[test]
    fn snapshot_is_stable_across_reads() {
        let mut store = EntityStore::new(StoreOrder::NewestFirst);
        store.upsert(remote_message("1", 100));
        store.upsert(remote_message("2", 200));

        let first: Vec<_> = store.snapshot().iter().map(|m| m.id.clone()).collect();
        let second: Vec<_> = store.snapshot().iter().map(|m| m.id.clone()).collect();
        assert_eq!(first, second);
    }
}
