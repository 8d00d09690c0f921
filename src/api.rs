//! Wire contract with the Reelay backend: endpoint paths and the JSON
//! shapes each one resolves to. The transport itself lives in the shell.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::entity::{
    ChatSummary, ConfirmationState, ConversationId, LocalId, Message, MessageId, MessageOrigin,
    StoryReel, UnixTimeMs, UserCard, UserId, UserProfile, VideoId, VideoPost,
};
use crate::engagement::EngagementAction;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiConfigError {
    #[error("invalid base url: {0}")]
    InvalidUrl(String),
    #[error("unsupported scheme '{0}', only http and https are allowed")]
    UnsupportedScheme(String),
    #[error("base url must have a host")]
    MissingHost,
}

/// Validated once at configuration time; every request path joins onto it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    base: Url,
}

impl Default for ApiConfig {
    fn default() -> Self {
        // The compiled-in default is known-valid.
        Self::new(crate::DEFAULT_API_BASE).expect("default base url is valid")
    }
}

impl ApiConfig {
    pub fn new(base: &str) -> Result<Self, ApiConfigError> {
        let mut url = Url::parse(base).map_err(|e| ApiConfigError::InvalidUrl(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(ApiConfigError::UnsupportedScheme(other.to_string())),
        }
        if url.host_str().is_none() {
            return Err(ApiConfigError::MissingHost);
        }
        // A trailing slash makes the base behave as a directory under join.
        if !url.path().ends_with('/') {
            url.set_path(&format!("{}/", url.path()));
        }
        Ok(Self { base: url })
    }

    #[must_use]
    pub fn base(&self) -> &str {
        self.base.as_str()
    }

    fn join(&self, path: &str) -> String {
        self.base
            .join(path)
            .map_or_else(|_| format!("{}{path}", self.base), |u| u.to_string())
    }

    #[must_use]
    pub fn feed_page(&self, page: u32) -> String {
        self.join(&format!("feed?page={page}"))
    }

    #[must_use]
    pub fn engagement(&self, video_id: &VideoId, action: EngagementAction) -> String {
        self.join(&format!("videos/{video_id}/{}", action.as_str()))
    }

    #[must_use]
    pub fn video_view(&self, video_id: &VideoId) -> String {
        self.join(&format!("videos/{video_id}/view"))
    }

    #[must_use]
    pub fn conversations_page(&self, page: u32) -> String {
        self.join(&format!("conversations?page={page}"))
    }

    #[must_use]
    pub fn conversation_messages(&self, conversation_id: &ConversationId) -> String {
        self.join(&format!("conversations/{conversation_id}/messages"))
    }

    #[must_use]
    pub fn me(&self) -> String {
        self.join("me")
    }

    #[must_use]
    pub fn stories(&self) -> String {
        self.join("stories")
    }

    #[must_use]
    pub fn followers_page(&self, user_id: &UserId, page: u32) -> String {
        self.join(&format!("users/{user_id}/followers?page={page}"))
    }

    #[must_use]
    pub fn following_page(&self, user_id: &UserId, page: u32) -> String {
        self.join(&format!("users/{user_id}/following?page={page}"))
    }
}

// --- Pagination envelope ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub current_page: u32,
    pub last_page: u32,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paged<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

// --- Feed ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoWire {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    #[serde(default)]
    pub caption: String,
    pub media_url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub is_saved: bool,
    pub created_at_ms: u64,
}

impl VideoWire {
    #[must_use]
    pub fn into_post(self) -> VideoPost {
        VideoPost {
            id: VideoId::new(self.id),
            author_id: UserId::new(self.author_id),
            author_name: self.author_name,
            caption: self.caption,
            media_url: self.media_url,
            thumbnail_url: self.thumbnail_url,
            like_count: self.like_count,
            comment_count: self.comment_count,
            is_liked: self.is_liked,
            is_saved: self.is_saved,
            created_at: UnixTimeMs(self.created_at_ms),
            confirmation: ConfirmationState::Confirmed,
            is_active_playback: false,
        }
    }
}

/// Authoritative engagement fields an engagement endpoint may return.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngagementWire {
    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub is_liked: Option<bool>,
    #[serde(default)]
    pub is_saved: Option<bool>,
}

// --- Chat ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageWire {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub body: String,
    pub created_at_ms: u64,
    /// Echo of the client reference for messages this device sent.
    #[serde(default)]
    pub client_ref: Option<String>,
}

impl MessageWire {
    #[must_use]
    pub fn into_message(self) -> Message {
        Message {
            id: MessageId::new(self.id),
            local_id: self.client_ref.map(LocalId::new),
            conversation_id: ConversationId::new(self.conversation_id),
            sender_id: UserId::new(self.sender_id),
            body: self.body,
            created_at: UnixTimeMs(self.created_at_ms),
            origin: MessageOrigin::Remote,
            confirmation: ConfirmationState::Confirmed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
    /// Round-trips through the server so polls can be de-duplicated against
    /// the optimistic copy even before the send response lands.
    pub client_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageWire {
    pub id: String,
    #[serde(default)]
    pub created_at_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummaryWire {
    pub conversation_id: String,
    pub peer_id: String,
    pub peer_name: String,
    #[serde(default)]
    pub peer_avatar_url: Option<String>,
    #[serde(default)]
    pub last_message_preview: String,
    #[serde(default)]
    pub last_message_at_ms: u64,
    #[serde(default)]
    pub unread_count: u32,
}

impl ChatSummaryWire {
    #[must_use]
    pub fn into_summary(self) -> ChatSummary {
        ChatSummary {
            conversation_id: ConversationId::new(self.conversation_id),
            peer_id: UserId::new(self.peer_id),
            peer_name: self.peer_name,
            peer_avatar_url: self.peer_avatar_url,
            last_message_preview: crate::truncate_preview(
                &self.last_message_preview,
                crate::PREVIEW_LENGTH,
            ),
            last_message_at: UnixTimeMs(self.last_message_at_ms),
            unread_count: self.unread_count,
        }
    }
}

// --- Profile & social graph ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileWire {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub video_count: u64,
}

impl ProfileWire {
    #[must_use]
    pub fn into_profile(self) -> UserProfile {
        UserProfile {
            id: UserId::new(self.id),
            username: self.username,
            display_name: self.display_name,
            bio: self.bio,
            avatar_url: self.avatar_url,
            follower_count: self.follower_count,
            following_count: self.following_count,
            video_count: self.video_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCardWire {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl UserCardWire {
    #[must_use]
    pub fn into_card(self) -> UserCard {
        UserCard {
            id: UserId::new(self.id),
            username: self.username,
            display_name: self.display_name,
            avatar_url: self.avatar_url,
        }
    }
}

// --- Stories ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryReelWire {
    pub author_id: String,
    pub author_name: String,
    #[serde(default)]
    pub author_avatar_url: Option<String>,
    #[serde(default)]
    pub item_urls: Vec<String>,
    #[serde(default)]
    pub latest_at_ms: u64,
}

impl StoryReelWire {
    #[must_use]
    pub fn into_reel(self) -> StoryReel {
        StoryReel {
            author_id: UserId::new(self.author_id),
            author_name: self.author_name,
            author_avatar_url: self.author_avatar_url,
            item_urls: self.item_urls,
            latest_at: UnixTimeMs(self.latest_at_ms),
            seen: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_rejects_bad_bases() {
        assert!(matches!(
            ApiConfig::new("not a url"),
            Err(ApiConfigError::InvalidUrl(_))
        ));
        assert!(matches!(
            ApiConfig::new("ftp://files.example.com"),
            Err(ApiConfigError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn config_normalizes_trailing_slash() {
        let a = ApiConfig::new("https://api.reelay.app/v1").unwrap();
        let b = ApiConfig::new("https://api.reelay.app/v1/").unwrap();
        assert_eq!(a.feed_page(2), b.feed_page(2));
        assert_eq!(a.feed_page(2), "https://api.reelay.app/v1/feed?page=2");
    }

    #[test]
    fn engagement_paths_are_distinct_per_action() {
        let cfg = ApiConfig::new("https://api.reelay.app/v1/").unwrap();
        let id = VideoId::new("v9");
        assert_eq!(
            cfg.engagement(&id, EngagementAction::Like),
            "https://api.reelay.app/v1/videos/v9/like"
        );
        assert_eq!(
            cfg.engagement(&id, EngagementAction::Unlike),
            "https://api.reelay.app/v1/videos/v9/unlike"
        );
        assert_ne!(
            cfg.engagement(&id, EngagementAction::Save),
            cfg.engagement(&id, EngagementAction::Unsave)
        );
    }

    #[test]
    fn chat_paths() {
        let cfg = ApiConfig::new("https://api.reelay.app/v1/").unwrap();
        assert_eq!(
            cfg.conversation_messages(&ConversationId::new("c3")),
            "https://api.reelay.app/v1/conversations/c3/messages"
        );
        assert_eq!(
            cfg.conversations_page(1),
            "https://api.reelay.app/v1/conversations?page=1"
        );
    }

    #[test]
    fn paged_feed_payload_parses() {
        let json = r#"{
            "data": [{
                "id": "v1",
                "author_id": "u1",
                "author_name": "Dana",
                "caption": "sunset",
                "media_url": "https://cdn.reelay.app/v1.mp4",
                "like_count": 12,
                "is_liked": true,
                "created_at_ms": 1700000000000
            }],
            "meta": {"current_page": 1, "last_page": 4, "total": 37}
        }"#;

        let page: Paged<VideoWire> = serde_json::from_str(json).unwrap();
        assert_eq!(page.meta.last_page, 4);
        let post = page.data.into_iter().next().unwrap().into_post();
        assert_eq!(post.id.as_str(), "v1");
        assert!(post.is_liked);
        assert!(!post.is_saved);
        assert!(post.confirmation.is_confirmed());
    }

    #[test]
    fn message_payload_parses_with_and_without_client_ref() {
        let json = r#"[
            {"id": "m1", "conversation_id": "c1", "sender_id": "u2",
             "body": "hey", "created_at_ms": 100},
            {"id": "m2", "conversation_id": "c1", "sender_id": "u1",
             "body": "hi", "created_at_ms": 200, "client_ref": "local-7"}
        ]"#;

        let wires: Vec<MessageWire> = serde_json::from_str(json).unwrap();
        let msgs: Vec<Message> = wires.into_iter().map(MessageWire::into_message).collect();
        assert!(msgs[0].local_id.is_none());
        assert_eq!(msgs[1].local_id.as_ref().map(LocalId::as_str), Some("local-7"));
        assert!(msgs.iter().all(|m| m.origin == MessageOrigin::Remote));
    }

    #[test]
    fn engagement_payload_tolerates_partial_fields() {
        let wire: EngagementWire = serde_json::from_str(r#"{"like_count": 3}"#).unwrap();
        assert_eq!(wire.like_count, Some(3));
        assert_eq!(wire.is_liked, None);

        let empty: EngagementWire = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.like_count, None);
    }

    #[test]
    fn summary_preview_is_truncated() {
        let wire = ChatSummaryWire {
            conversation_id: "c1".into(),
            peer_id: "u2".into(),
            peer_name: "Ira".into(),
            peer_avatar_url: None,
            last_message_preview: "x".repeat(200),
            last_message_at_ms: 5,
            unread_count: 2,
        };
        let summary = wire.into_summary();
        assert!(summary.last_message_preview.chars().count() <= crate::PREVIEW_LENGTH);
    }
}
