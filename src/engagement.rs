//! Optimistic like/save mutations for the video feed.
//!
//! A gesture mutates the store synchronously; the app layer issues exactly
//! one request for the returned descriptor and routes the response back into
//! [`EngagementEngine::confirm`] or [`EngagementEngine::fail`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::EngagementWire;
use crate::entity::{ConfirmationState, MutationId, UnixTimeMs, VideoId, VideoPost};
use crate::store::EntityStore;

/// Like and unlike are distinct idempotent server operations, selected by the
/// pre-mutation boolean. Same for save/unsave. There is no toggle endpoint.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementAction {
    Like,
    Unlike,
    Save,
    Unsave,
}

impl EngagementAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Unlike => "unlike",
            Self::Save => "save",
            Self::Unsave => "unsave",
        }
    }
}

/// The literal pre-mutation state, restored verbatim on failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementSnapshot {
    like_count: u64,
    is_liked: bool,
    is_saved: bool,
}

impl EngagementSnapshot {
    fn capture(video: &VideoPost) -> Self {
        Self {
            like_count: video.like_count,
            is_liked: video.is_liked,
            is_saved: video.is_saved,
        }
    }

    fn restore(&self, video: &mut VideoPost) {
        video.like_count = self.like_count;
        video.is_liked = self.is_liked;
        video.is_saved = self.is_saved;
    }
}

#[derive(Clone, Debug)]
pub struct PendingEngagement {
    pub mutation_id: MutationId,
    pub video_id: VideoId,
    pub action: EngagementAction,
    pub started_at: UnixTimeMs,
    prior: EngagementSnapshot,
}

/// What the app layer must send: exactly one request per accepted gesture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngagementRequest {
    pub mutation_id: MutationId,
    pub video_id: VideoId,
    pub action: EngagementAction,
}

#[derive(Debug, Default)]
pub struct EngagementEngine {
    in_flight: HashMap<MutationId, PendingEngagement>,
}

impl EngagementEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the optimistic like/unlike and describe the matching request.
    ///
    /// A second gesture on the same video while one is in flight is not
    /// blocked: it snapshots the latest local state and issues its own
    /// request. In-order completion is not guaranteed; whichever response
    /// lands last wins. Known race, kept deliberately.
    pub fn toggle_like(
        &mut self,
        store: &mut EntityStore<VideoPost>,
        video_id: &VideoId,
        now: UnixTimeMs,
    ) -> Option<EngagementRequest> {
        let video = store.get_server_mut(video_id.as_str())?;
        let prior = EngagementSnapshot::capture(video);

        let action = if video.is_liked {
            video.is_liked = false;
            video.like_count = video.like_count.saturating_sub(1);
            EngagementAction::Unlike
        } else {
            video.is_liked = true;
            video.like_count += 1;
            EngagementAction::Like
        };
        video.confirmation = ConfirmationState::Pending;

        Some(self.track(video_id.clone(), action, prior, now))
    }

    /// Apply the optimistic save/unsave and describe the matching request.
    pub fn toggle_save(
        &mut self,
        store: &mut EntityStore<VideoPost>,
        video_id: &VideoId,
        now: UnixTimeMs,
    ) -> Option<EngagementRequest> {
        let video = store.get_server_mut(video_id.as_str())?;
        let prior = EngagementSnapshot::capture(video);

        let action = if video.is_saved {
            video.is_saved = false;
            EngagementAction::Unsave
        } else {
            video.is_saved = true;
            EngagementAction::Save
        };
        video.confirmation = ConfirmationState::Pending;

        Some(self.track(video_id.clone(), action, prior, now))
    }

    /// Server said yes: merge its authoritative fields over the guess.
    pub fn confirm(
        &mut self,
        store: &mut EntityStore<VideoPost>,
        mutation_id: &MutationId,
        server: &EngagementWire,
    ) {
        let Some(pending) = self.in_flight.remove(mutation_id) else {
            debug!(mutation = %mutation_id, "confirmation for unknown mutation");
            return;
        };

        let Some(video) = store.get_server_mut(pending.video_id.as_str()) else {
            return;
        };

        if let Some(count) = server.like_count {
            video.like_count = count;
        }
        if let Some(liked) = server.is_liked {
            video.is_liked = liked;
        }
        if let Some(saved) = server.is_saved {
            video.is_saved = saved;
        }
        video.confirmation = ConfirmationState::Confirmed;

        debug!(video = %pending.video_id, action = pending.action.as_str(), "engagement confirmed");
    }

    /// Server said no (or never answered coherently): restore the literal
    /// pre-mutation snapshot. Swallowed here; the caller sees only the
    /// reverted state, never an error.
    pub fn fail(&mut self, store: &mut EntityStore<VideoPost>, mutation_id: &MutationId) {
        let Some(pending) = self.in_flight.remove(mutation_id) else {
            debug!(mutation = %mutation_id, "failure for unknown mutation");
            return;
        };

        warn!(
            video = %pending.video_id,
            action = pending.action.as_str(),
            "engagement failed, reverting"
        );

        if let Some(video) = store.get_server_mut(pending.video_id.as_str()) {
            pending.prior.restore(video);
            video.confirmation = ConfirmationState::Failed;
        }
    }

    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn in_flight(&self) -> impl Iterator<Item = &PendingEngagement> {
        self.in_flight.values()
    }

    #[must_use]
    pub fn has_in_flight_for(&self, video_id: &VideoId) -> bool {
        self.in_flight.values().any(|p| &p.video_id == video_id)
    }

    pub fn clear(&mut self) {
        self.in_flight.clear();
    }

    fn track(
        &mut self,
        video_id: VideoId,
        action: EngagementAction,
        prior: EngagementSnapshot,
        now: UnixTimeMs,
    ) -> EngagementRequest {
        let mutation_id = MutationId::generate();
        self.in_flight.insert(
            mutation_id.clone(),
            PendingEngagement {
                mutation_id: mutation_id.clone(),
                video_id: video_id.clone(),
                action,
                started_at: now,
                prior,
            },
        );
        EngagementRequest {
            mutation_id,
            video_id,
            action,
        }
    }
}
