//! One open conversation: a message store kept eventually consistent by a
//! fixed-cadence poll, interleaved with optimistically rendered sends.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::entity::{ConversationId, LocalId, Message, MessageId, UnixTimeMs, UserId};
use crate::store::{EntityStore, StoreOrder};
use crate::MAX_COMPOSE_BYTES;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollState {
    Idle,
    Polling,
    Stopped,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollKind {
    /// A scheduled tick of the fixed interval.
    Scheduled,
    /// Pull-to-refresh: an out-of-band tick sharing the same merge, only
    /// distinguished by the `is_refreshing` flag.
    Refresh,
}

/// Issued per fetch; carries the generation it was minted under so a result
/// that outlives its screen is discarded instead of applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollTicket {
    pub conversation_id: ConversationId,
    pub generation: u64,
    pub kind: PollKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Applied { inserted: usize, merged: usize },
    Stale,
}

/// What the app layer must POST for an accepted compose.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub conversation_id: ConversationId,
    pub local_id: LocalId,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    #[error("message is empty")]
    Empty,
    #[error("message is {len} bytes, maximum is {max}")]
    TooLong { len: usize, max: usize },
}

#[derive(Debug)]
pub struct ChatSession {
    conversation_id: ConversationId,
    pub messages: EntityStore<Message>,
    poll_state: PollState,
    generation: u64,
    pub is_refreshing: bool,
}

impl ChatSession {
    #[must_use]
    pub fn open(conversation_id: ConversationId, generation: u64) -> Self {
        Self {
            conversation_id,
            messages: EntityStore::new(StoreOrder::NewestFirst),
            poll_state: PollState::Idle,
            generation,
            is_refreshing: false,
        }
    }

    #[must_use]
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn poll_state(&self) -> PollState {
        self.poll_state
    }

    /// `Idle → Polling`. While a poll is in flight further ticks are
    /// swallowed; after teardown no ticket is ever minted again.
    pub fn begin_poll(&mut self) -> Option<PollTicket> {
        match self.poll_state {
            PollState::Idle => {
                self.poll_state = PollState::Polling;
                Some(self.ticket(PollKind::Scheduled))
            }
            PollState::Polling => None,
            PollState::Stopped => None,
        }
    }

    /// Out-of-band fetch for pull-to-refresh; does not disturb the scheduled
    /// cycle, only raises the UI flag.
    pub fn begin_refresh(&mut self) -> Option<PollTicket> {
        if self.poll_state == PollState::Stopped {
            return None;
        }
        self.is_refreshing = true;
        Some(self.ticket(PollKind::Refresh))
    }

    #[must_use]
    pub fn accepts(&self, ticket: &PollTicket) -> bool {
        self.poll_state != PollState::Stopped
            && ticket.generation == self.generation
            && ticket.conversation_id == self.conversation_id
    }

    /// Merge one authoritative message list. Keyed by server id, falling back
    /// to the echoed client reference while an id is still provisional, so an
    /// optimistic copy is superseded rather than duplicated. Pending messages
    /// the server hasn't seen yet stay visible at their optimistic position.
    pub fn apply_poll(&mut self, ticket: &PollTicket, remote: Vec<Message>) -> PollOutcome {
        if !self.accepts(ticket) {
            debug!(
                conversation = %ticket.conversation_id,
                generation = ticket.generation,
                "discarding stale poll result"
            );
            return PollOutcome::Stale;
        }

        let mut inserted = 0;
        let mut merged = 0;
        for message in remote {
            match self.messages.upsert(message) {
                crate::store::UpsertOutcome::Inserted => inserted += 1,
                crate::store::UpsertOutcome::Merged => merged += 1,
                crate::store::UpsertOutcome::Discarded => {}
            }
        }

        self.settle(ticket);
        PollOutcome::Applied { inserted, merged }
    }

    /// Failed polls are absorbed; the next tick simply tries again.
    pub fn poll_failed(&mut self, ticket: &PollTicket) {
        if !self.accepts(ticket) {
            return;
        }
        debug!(conversation = %ticket.conversation_id, "poll failed, retrying next tick");
        self.settle(ticket);
    }

    /// Validate, render optimistically, and describe the send request.
    pub fn queue_send(
        &mut self,
        sender: &UserId,
        body: &str,
        now: UnixTimeMs,
    ) -> Result<OutboundMessage, ComposeError> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Err(ComposeError::Empty);
        }
        if trimmed.len() > MAX_COMPOSE_BYTES {
            return Err(ComposeError::TooLong {
                len: trimmed.len(),
                max: MAX_COMPOSE_BYTES,
            });
        }

        let message = Message::compose(
            self.conversation_id.clone(),
            sender.clone(),
            trimmed.to_string(),
            now,
        );
        let outbound = OutboundMessage {
            conversation_id: self.conversation_id.clone(),
            local_id: message.local_id.clone().unwrap_or_else(LocalId::generate),
            body: message.body.clone(),
        };
        self.messages.upsert(message);
        Ok(outbound)
    }

    /// The POST came back: swap in the server identity. If a poll already
    /// delivered the authoritative copy, the two collapse into one entity.
    pub fn confirm_send(
        &mut self,
        local_id: &LocalId,
        server_id: MessageId,
        created_at: Option<UnixTimeMs>,
    ) {
        let Some(mut message) = self.messages.remove_local(local_id.as_str()) else {
            debug!(local = %local_id, "send confirmation for unknown message");
            return;
        };
        message.mark_confirmed(server_id, created_at);
        self.messages.upsert(message);
    }

    /// The POST failed: the provisional entity is removed outright (there is
    /// no prior state to revert to) and the typed text is handed back so the
    /// compose input can be restored.
    pub fn fail_send(&mut self, local_id: &LocalId) -> Option<String> {
        let removed = self.messages.remove_local(local_id.as_str());
        if removed.is_some() {
            warn!(conversation = %self.conversation_id, "send failed, restoring compose text");
        }
        removed.map(|m| m.body)
    }

    /// Unmount: no further tickets, and any in-flight result is discarded.
    pub fn close(&mut self) {
        self.poll_state = PollState::Stopped;
        self.is_refreshing = false;
        self.messages.close();
    }

    fn ticket(&self, kind: PollKind) -> PollTicket {
        PollTicket {
            conversation_id: self.conversation_id.clone(),
            generation: self.generation,
            kind,
        }
    }

    fn settle(&mut self, ticket: &PollTicket) {
        match ticket.kind {
            PollKind::Scheduled => self.poll_state = PollState::Idle,
            PollKind::Refresh => self.is_refreshing = false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ConfirmationState, MessageOrigin};

    fn session() -> ChatSession {
        ChatSession::open(ConversationId::new("c1"), 7)
    }

    fn remote(id: &str, at: u64) -> Message {
        Message {
            id: MessageId::new(id),
            local_id: None,
            conversation_id: ConversationId::new("c1"),
            sender_id: UserId::new("peer"),
            body: format!("remote {id}"),
            created_at: UnixTimeMs(at),
            origin: MessageOrigin::Remote,
            confirmation: ConfirmationState::Confirmed,
        }
    }

    #[test]
    fn poll_cycle_idle_polling_idle() {
        let mut s = session();
        assert_eq!(s.poll_state(), PollState::Idle);

        let ticket = s.begin_poll().expect("idle session polls");
        assert_eq!(s.poll_state(), PollState::Polling);
        // Overlapping tick is swallowed.
        assert!(s.begin_poll().is_none());

        s.apply_poll(&ticket, vec![remote("1", 100)]);
        assert_eq!(s.poll_state(), PollState::Idle);
        assert_eq!(s.messages.len(), 1);
    }

    #[test]
    fn failed_poll_returns_to_idle_without_touching_store() {
        let mut s = session();
        let ticket = s.begin_poll().unwrap();
        s.apply_poll(&ticket, vec![remote("1", 100)]);

        let ticket = s.begin_poll().unwrap();
        s.poll_failed(&ticket);

        assert_eq!(s.poll_state(), PollState::Idle);
        assert_eq!(s.messages.len(), 1);
    }

    #[test]
    fn stale_generation_is_discarded() {
        let mut s = session();
        let ticket = s.begin_poll().unwrap();

        let stale = PollTicket {
            generation: ticket.generation + 1,
            ..ticket.clone()
        };
        assert_eq!(s.apply_poll(&stale, vec![remote("1", 100)]), PollOutcome::Stale);
        assert!(s.messages.is_empty());
        // The real ticket still applies.
        assert!(matches!(
            s.apply_poll(&ticket, vec![remote("1", 100)]),
            PollOutcome::Applied { inserted: 1, .. }
        ));
    }

    #[test]
    fn closed_session_discards_in_flight_poll() {
        let mut s = session();
        let ticket = s.begin_poll().unwrap();
        s.close();

        assert_eq!(s.apply_poll(&ticket, vec![remote("1", 100)]), PollOutcome::Stale);
        assert!(s.messages.is_empty());
        assert!(s.begin_poll().is_none());
        assert!(s.begin_refresh().is_none());
    }

    #[test]
    fn refresh_shares_merge_but_only_flips_flag() {
        let mut s = session();
        let poll = s.begin_poll().unwrap();

        let refresh = s.begin_refresh().expect("refresh runs out of band");
        assert!(s.is_refreshing);
        assert_eq!(s.poll_state(), PollState::Polling);

        s.apply_poll(&refresh, vec![remote("1", 100)]);
        assert!(!s.is_refreshing);
        // The scheduled cycle is untouched by the refresh settling.
        assert_eq!(s.poll_state(), PollState::Polling);
        s.apply_poll(&poll, vec![remote("2", 200)]);
        assert_eq!(s.poll_state(), PollState::Idle);
        assert_eq!(s.messages.len(), 2);
    }

    #[test]
    fn optimistic_send_is_visible_and_newest() {
        let mut s = session();
        let ticket = s.begin_poll().unwrap();
        s.apply_poll(&ticket, vec![remote("1", 100), remote("2", 200)]);

        s.queue_send(&UserId::new("me"), "hello", UnixTimeMs(300)).unwrap();

        let snapshot = s.messages.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].body, "hello");
        assert!(snapshot[0].confirmation.is_pending());
    }

    #[test]
    fn send_then_poll_yields_exactly_one_entity() {
        let mut s = session();
        let out = s
            .queue_send(&UserId::new("me"), "on my way", UnixTimeMs(300))
            .unwrap();
        s.confirm_send(&out.local_id, MessageId::new("srv-5"), Some(UnixTimeMs(301)));

        // The next poll returns the same message under its server id.
        let ticket = s.begin_poll().unwrap();
        s.apply_poll(&ticket, vec![remote("srv-5", 301)]);

        assert_eq!(s.messages.len(), 1);
        let only = &s.messages.snapshot()[0];
        assert_eq!(only.id.as_str(), "srv-5");
        assert_eq!(only.origin, MessageOrigin::Local);
        assert!(only.confirmation.is_confirmed());
    }

    #[test]
    fn poll_arriving_before_confirmation_still_deduplicates() {
        let mut s = session();
        let out = s
            .queue_send(&UserId::new("me"), "race me", UnixTimeMs(300))
            .unwrap();

        // The server echoes the client reference, so even a poll that beats
        // the POST response collapses onto the pending entity.
        let mut echoed = remote("srv-6", 301);
        echoed.local_id = Some(out.local_id.clone());
        let ticket = s.begin_poll().unwrap();
        s.apply_poll(&ticket, vec![echoed]);

        assert_eq!(s.messages.len(), 1);
        assert_eq!(s.messages.snapshot()[0].id.as_str(), "srv-6");

        // The late POST confirmation is then a harmless merge.
        s.confirm_send(&out.local_id, MessageId::new("srv-6"), Some(UnixTimeMs(301)));
        assert_eq!(s.messages.len(), 1);
    }

    #[test]
    fn failed_send_removes_entity_and_returns_text() {
        let mut s = session();
        let out = s
            .queue_send(&UserId::new("me"), "did this arrive?", UnixTimeMs(300))
            .unwrap();

        let restored = s.fail_send(&out.local_id);

        assert_eq!(restored.as_deref(), Some("did this arrive?"));
        assert!(s.messages.is_empty());
        assert!(s.fail_send(&out.local_id).is_none());
    }

    #[test]
    fn compose_validation() {
        let mut s = session();
        assert_eq!(
            s.queue_send(&UserId::new("me"), "   ", UnixTimeMs(1)),
            Err(ComposeError::Empty)
        );
        let oversized = "x".repeat(MAX_COMPOSE_BYTES + 1);
        assert!(matches!(
            s.queue_send(&UserId::new("me"), &oversized, UnixTimeMs(1)),
            Err(ComposeError::TooLong { .. })
        ));
        assert!(s.messages.is_empty());
    }

    #[test]
    fn merged_list_is_newest_first() {
        let mut s = session();
        let ticket = s.begin_poll().unwrap();
        s.apply_poll(&ticket, vec![remote("1", 100), remote("2", 250)]);
        s.queue_send(&UserId::new("me"), "latest", UnixTimeMs(300)).unwrap();

        let bodies: Vec<_> = s.messages.snapshot().iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["latest", "remote 2", "remote 1"]);
    }
}
