use serde::{Deserialize, Serialize};

use crate::api::{
    ChatSummaryWire, EngagementWire, MessageWire, Paged, ProfileWire, SendMessageWire,
    StoryReelWire, UserCardWire, VideoWire,
};
use crate::capabilities::{KvOutput, TimerOutput};
use crate::chat::PollTicket;
use crate::entity::{ConversationId, LocalId, MutationId, UserId, VideoId};

pub type HttpResult<T> = crux_http::Result<crux_http::Response<T>>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowDirection {
    Followers,
    Following,
}

impl FollowDirection {
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Followers => "Followers",
            Self::Following => "Following",
        }
    }
}

/// Everything the core reacts to. Shell-originated variants are serializable
/// across the FFI; capability results are core-internal and skipped.
#[derive(Serialize, Deserialize)]
pub enum Event {
    // Session
    Started,
    LoggedIn { user_id: String, auth_token: String },
    LoggedOut,
    NetworkStatusChanged { online: bool },

    // Feed
    FeedOpened,
    FeedNextPageRequested,
    FeedRefreshRequested,
    #[serde(skip)]
    FeedPageLoaded {
        seq: u64,
        result: Box<HttpResult<Paged<VideoWire>>>,
    },
    ActiveVideoChanged { index: Option<u32> },
    #[serde(skip)]
    ViewRecorded {
        video_id: VideoId,
        result: Box<HttpResult<Vec<u8>>>,
    },

    // Engagement
    LikeToggled { video_id: VideoId },
    SaveToggled { video_id: VideoId },
    #[serde(skip)]
    EngagementCompleted {
        mutation_id: MutationId,
        result: Box<HttpResult<EngagementWire>>,
    },

    // Chat list
    ChatListOpened,
    ChatListNextPageRequested,
    ChatListRefreshRequested,
    #[serde(skip)]
    ChatListPageLoaded {
        seq: u64,
        result: Box<HttpResult<Paged<ChatSummaryWire>>>,
    },

    // Open conversation
    ConversationOpened { conversation_id: ConversationId },
    ConversationClosed,
    ChatRefreshRequested,
    #[serde(skip)]
    PollTimerElapsed(TimerOutput),
    #[serde(skip)]
    PollCompleted {
        ticket: PollTicket,
        result: Box<HttpResult<Vec<MessageWire>>>,
    },
    ComposeSubmitted { body: String },
    #[serde(skip)]
    SendCompleted {
        conversation_id: ConversationId,
        local_id: LocalId,
        result: Box<HttpResult<SendMessageWire>>,
    },
    ComposeRestoreConsumed,

    // Profile
    ProfileRequested,
    #[serde(skip)]
    ProfileLoaded {
        result: Box<HttpResult<ProfileWire>>,
    },
    #[serde(skip)]
    ProfileCacheRead(KvOutput),
    #[serde(skip)]
    ProfileCacheWritten(KvOutput),

    // Stories
    StoriesRequested,
    #[serde(skip)]
    StoriesLoaded {
        result: Box<HttpResult<Vec<StoryReelWire>>>,
    },
    StorySeen { author_id: UserId },

    // Follower / following lists
    FollowListOpened {
        user_id: UserId,
        direction: FollowDirection,
    },
    FollowListNextPageRequested,
    FollowListClosed,
    #[serde(skip)]
    FollowListPageLoaded {
        seq: u64,
        result: Box<HttpResult<Paged<UserCardWire>>>,
    },

    NoticeDismissed,
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::LoggedIn { .. } => "logged_in",
            Self::LoggedOut => "logged_out",
            Self::NetworkStatusChanged { .. } => "network_status_changed",
            Self::FeedOpened => "feed_opened",
            Self::FeedNextPageRequested => "feed_next_page_requested",
            Self::FeedRefreshRequested => "feed_refresh_requested",
            Self::FeedPageLoaded { .. } => "feed_page_loaded",
            Self::ActiveVideoChanged { .. } => "active_video_changed",
            Self::ViewRecorded { .. } => "view_recorded",
            Self::LikeToggled { .. } => "like_toggled",
            Self::SaveToggled { .. } => "save_toggled",
            Self::EngagementCompleted { .. } => "engagement_completed",
            Self::ChatListOpened => "chat_list_opened",
            Self::ChatListNextPageRequested => "chat_list_next_page_requested",
            Self::ChatListRefreshRequested => "chat_list_refresh_requested",
            Self::ChatListPageLoaded { .. } => "chat_list_page_loaded",
            Self::ConversationOpened { .. } => "conversation_opened",
            Self::ConversationClosed => "conversation_closed",
            Self::ChatRefreshRequested => "chat_refresh_requested",
            Self::PollTimerElapsed(_) => "poll_timer_elapsed",
            Self::PollCompleted { .. } => "poll_completed",
            Self::ComposeSubmitted { .. } => "compose_submitted",
            Self::SendCompleted { .. } => "send_completed",
            Self::ComposeRestoreConsumed => "compose_restore_consumed",
            Self::ProfileRequested => "profile_requested",
            Self::ProfileLoaded { .. } => "profile_loaded",
            Self::ProfileCacheRead(_) => "profile_cache_read",
            Self::ProfileCacheWritten(_) => "profile_cache_written",
            Self::StoriesRequested => "stories_requested",
            Self::StoriesLoaded { .. } => "stories_loaded",
            Self::StorySeen { .. } => "story_seen",
            Self::FollowListOpened { .. } => "follow_list_opened",
            Self::FollowListNextPageRequested => "follow_list_next_page_requested",
            Self::FollowListClosed => "follow_list_closed",
            Self::FollowListPageLoaded { .. } => "follow_list_page_loaded",
            Self::NoticeDismissed => "notice_dismissed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_size_is_reasonable() {
        // Capability results are boxed to keep the enum small.
        let size = std::mem::size_of::<Event>();
        assert!(
            size <= 128,
            "Event enum is {size} bytes — too large, box more variants"
        );
    }

    #[test]
    fn shell_events_roundtrip_through_serde() {
        let event = Event::ConversationOpened {
            conversation_id: ConversationId::new("c1"),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name(), "conversation_opened");
    }

    #[test]
    fn follow_direction_titles() {
        assert_eq!(FollowDirection::Followers.title(), "Followers");
        assert_eq!(FollowDirection::Following.title(), "Following");
    }
}
