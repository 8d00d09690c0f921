use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::store::StoreEntity;

// --- Secret wrapper: redacts Debug so tokens never hit logs ---

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(VideoId);
typed_id!(MessageId);
typed_id!(ConversationId);
typed_id!(UserId);
typed_id!(LocalId);
typed_id!(MutationId);

impl LocalId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl MutationId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Explicit timestamp unit: Unix milliseconds, UTC.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    #[must_use]
    pub fn now() -> Self {
        Self(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default(),
        )
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

/// Where a locally visible entity stands against the server.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationState {
    #[default]
    Pending,
    Confirmed,
    Failed,
}

impl ConfirmationState {
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }

    #[must_use]
    pub const fn is_confirmed(self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    Local,
    Remote,
}

// --- Video feed entity ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoPost {
    pub id: VideoId,
    pub author_id: UserId,
    pub author_name: String,
    pub caption: String,
    pub media_url: String,
    pub thumbnail_url: Option<String>,
    pub like_count: u64,
    pub comment_count: u64,
    pub is_liked: bool,
    pub is_saved: bool,
    pub created_at: UnixTimeMs,
    pub confirmation: ConfirmationState,
    /// View concern, not server state: at most one post per feed carries this.
    pub is_active_playback: bool,
}

impl StoreEntity for VideoPost {
    fn server_key(&self) -> Option<&str> {
        Some(self.id.as_str())
    }

    fn local_key(&self) -> Option<&str> {
        None
    }

    fn sort_key(&self) -> UnixTimeMs {
        self.created_at
    }

    fn merge_from(&mut self, incoming: Self) {
        let keep_active = self.is_active_playback;
        if incoming.confirmation.is_confirmed() {
            *self = incoming;
        } else {
            // Optimistic overlay: only the engagement fields are client-authored.
            self.like_count = incoming.like_count;
            self.is_liked = incoming.is_liked;
            self.is_saved = incoming.is_saved;
            self.confirmation = incoming.confirmation;
        }
        self.is_active_playback = keep_active;
    }
}

// --- Direct message entity ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Server id once confirmed; a client-generated placeholder before that.
    pub id: MessageId,
    /// Tracks an optimistic send across its lifecycle, surviving the id swap.
    pub local_id: Option<LocalId>,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub body: String,
    /// Server-assigned on confirmation; wall-clock estimate while pending.
    pub created_at: UnixTimeMs,
    pub origin: MessageOrigin,
    pub confirmation: ConfirmationState,
}

impl Message {
    /// A freshly composed outgoing message, rendered before the server answers.
    #[must_use]
    pub fn compose(
        conversation_id: ConversationId,
        sender_id: UserId,
        body: String,
        now: UnixTimeMs,
    ) -> Self {
        let local_id = LocalId::generate();
        Self {
            id: MessageId::new(local_id.as_str()),
            local_id: Some(local_id),
            conversation_id,
            sender_id,
            body,
            created_at: now,
            origin: MessageOrigin::Local,
            confirmation: ConfirmationState::Pending,
        }
    }

    /// Adopt the server identity. Origin stays `Local` so a later poll of the
    /// same message is recognized as already rendered.
    pub fn mark_confirmed(&mut self, server_id: MessageId, created_at: Option<UnixTimeMs>) {
        self.id = server_id;
        if let Some(at) = created_at {
            self.created_at = at;
        }
        self.confirmation = ConfirmationState::Confirmed;
    }
}

impl StoreEntity for Message {
    fn server_key(&self) -> Option<&str> {
        // The id is only a usable merge key once the server has assigned it.
        match (self.confirmation, self.origin) {
            (ConfirmationState::Confirmed, _) | (_, MessageOrigin::Remote) => {
                Some(self.id.as_str())
            }
            _ => None,
        }
    }

    fn local_key(&self) -> Option<&str> {
        self.local_id.as_ref().map(LocalId::as_str)
    }

    fn sort_key(&self) -> UnixTimeMs {
        self.created_at
    }

    fn merge_from(&mut self, incoming: Self) {
        let was_local = self.origin == MessageOrigin::Local;
        let local_id = self.local_id.clone().or_else(|| incoming.local_id.clone());
        if incoming.confirmation.is_confirmed() {
            *self = incoming;
        } else {
            self.body = incoming.body;
            self.confirmation = incoming.confirmation;
        }
        if was_local {
            self.origin = MessageOrigin::Local;
        }
        self.local_id = local_id;
    }
}

// --- Chat list entity ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub conversation_id: ConversationId,
    pub peer_id: UserId,
    pub peer_name: String,
    pub peer_avatar_url: Option<String>,
    pub last_message_preview: String,
    pub last_message_at: UnixTimeMs,
    pub unread_count: u32,
}

impl ChatSummary {
    pub fn mark_read(&mut self) {
        self.unread_count = 0;
    }
}

impl StoreEntity for ChatSummary {
    fn server_key(&self) -> Option<&str> {
        Some(self.conversation_id.as_str())
    }

    fn local_key(&self) -> Option<&str> {
        None
    }

    fn sort_key(&self) -> UnixTimeMs {
        self.last_message_at
    }

    fn merge_from(&mut self, incoming: Self) {
        *self = incoming;
    }
}

// --- Social graph entity (follower / following lists) ---

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCard {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl StoreEntity for UserCard {
    fn server_key(&self) -> Option<&str> {
        Some(self.id.as_str())
    }

    fn local_key(&self) -> Option<&str> {
        None
    }

    fn sort_key(&self) -> UnixTimeMs {
        UnixTimeMs(0)
    }

    fn merge_from(&mut self, incoming: Self) {
        *self = incoming;
    }
}

// --- Profile (cached as a JSON blob between launches) ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub follower_count: u64,
    pub following_count: u64,
    pub video_count: u64,
}

// --- Stories tray ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoryReel {
    pub author_id: UserId,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    pub item_urls: Vec<String>,
    pub latest_at: UnixTimeMs,
    /// Local-only: never synced back to the server.
    pub seen: bool,
}
