//! The Crux app: one `Model`, one `Event` loop, one `ViewModel` the shells
//! render from. Engines mutate stores synchronously; capabilities carry the
//! asynchronous halves and resume the loop with response events.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::{
    ApiConfig, ChatSummaryWire, MessageWire, SendMessageRequest, StoryReelWire, UserCardWire,
    VideoWire,
};
use crate::capabilities::{Http, Kv, KvOutput, Render, Timer, TimerOutput};
use crate::chat::{ChatSession, OutboundMessage, PollState, PollTicket};
use crate::engagement::{EngagementEngine, EngagementRequest};
use crate::entity::{
    ChatSummary, MessageId, Secret, StoryReel, UnixTimeMs, UserCard, UserId, UserProfile, VideoId,
};
use crate::event::{Event, FollowDirection, HttpResult};
use crate::feed::FeedState;
use crate::store::{EntityStore, StoreOrder};
use crate::{feed::Pager, AppError, AppResult, ErrorKind, POLL_INTERVAL_MS, PROFILE_CACHE_KEY};

#[derive(Debug)]
pub struct ChatListState {
    pub summaries: EntityStore<ChatSummary>,
    pub pager: Pager,
}

impl Default for ChatListState {
    fn default() -> Self {
        Self {
            summaries: EntityStore::new(StoreOrder::NewestFirst),
            pager: Pager::new(),
        }
    }
}

#[derive(Debug)]
pub struct FollowListState {
    pub user_id: UserId,
    pub direction: FollowDirection,
    pub users: EntityStore<UserCard>,
    pub pager: Pager,
}

impl FollowListState {
    #[must_use]
    pub fn new(user_id: UserId, direction: FollowDirection) -> Self {
        Self {
            user_id,
            direction,
            users: EntityStore::new(StoreOrder::Arrival),
            pager: Pager::new(),
        }
    }
}

#[derive(Debug)]
pub struct Model {
    pub api: ApiConfig,
    /// Wall clock captured at the start of each update, so view building and
    /// optimistic timestamps agree within one event.
    pub now_ms: u64,
    pub user_id: Option<UserId>,
    auth_token: Option<Secret>,
    pub network_online: bool,

    pub feed: FeedState,
    pub engagement: EngagementEngine,
    pub stories: Vec<StoryReel>,

    pub chat_list: ChatListState,
    pub chat: Option<ChatSession>,
    pub compose_restore: Option<String>,
    next_generation: u64,

    pub profile: Option<UserProfile>,
    pub follow_list: Option<FollowListState>,

    pub notice: Option<AppError>,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            now_ms: 0,
            user_id: None,
            auth_token: None,
            network_online: true,
            feed: FeedState::default(),
            engagement: EngagementEngine::new(),
            stories: Vec::new(),
            chat_list: ChatListState::default(),
            chat: None,
            compose_restore: None,
            next_generation: 0,
            profile: None,
            follow_list: None,
            notice: None,
        }
    }
}

impl Model {
    fn update_timestamp(&mut self) {
        self.now_ms = UnixTimeMs::now().0;
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

// --- ViewModel: the only surface the shells read ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FeedItem {
    pub id: String,
    pub author_name: String,
    pub caption: String,
    pub media_url: String,
    pub thumbnail_url: Option<String>,
    pub like_count: u64,
    pub comment_count: u64,
    pub is_liked: bool,
    pub is_saved: bool,
    pub is_active: bool,
    pub engagement_pending: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FeedView {
    pub items: Vec<FeedItem>,
    pub is_loading: bool,
    pub is_refreshing: bool,
    pub has_more: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StoryTile {
    pub author_id: String,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    pub item_count: u32,
    pub seen: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatListItem {
    pub conversation_id: String,
    pub peer_name: String,
    pub peer_avatar_url: Option<String>,
    pub preview: String,
    pub time_ago: String,
    pub unread_count: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatListView {
    pub items: Vec<ChatListItem>,
    pub is_loading: bool,
    pub has_more: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MessageItem {
    pub id: String,
    pub body: String,
    pub is_mine: bool,
    pub is_pending: bool,
    pub time_ago: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatView {
    pub conversation_id: String,
    pub items: Vec<MessageItem>,
    pub is_refreshing: bool,
    /// Text handed back after a failed send, for the compose input.
    pub compose_restore: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProfileView {
    pub username: String,
    pub display_name: String,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub follower_count: u64,
    pub following_count: u64,
    pub video_count: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserCardView {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FollowListView {
    pub title: String,
    pub items: Vec<UserCardView>,
    pub is_loading: bool,
    pub has_more: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Notice {
    pub message: String,
    pub retryable: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ViewModel {
    pub feed: FeedView,
    pub stories: Vec<StoryTile>,
    pub chat_list: ChatListView,
    pub chat: Option<ChatView>,
    pub profile: Option<ProfileView>,
    pub follow_list: Option<FollowListView>,
    pub notice: Option<Notice>,
}

#[derive(crux_core::macros::Effect)]
#[effect(app = "App")]
pub struct Capabilities {
    pub http: Http<Event>,
    pub kv: Kv<Event>,
    pub render: Render<Event>,
    pub timer: Timer<Event>,
}

#[derive(Default)]
pub struct App;

impl App {
    fn parse<T>(result: HttpResult<T>) -> AppResult<T> {
        match result {
            Ok(mut response) => {
                let status = response.status();
                if status.is_success() {
                    response.take_body().ok_or_else(|| {
                        AppError::new(ErrorKind::Deserialization, "response body missing")
                    })
                } else {
                    Err(AppError::from_status(u16::from(status), None))
                }
            }
            Err(e) => Err(AppError::new(ErrorKind::Network, e.to_string())),
        }
    }

    fn bearer(model: &Model) -> Option<String> {
        model
            .auth_token
            .as_ref()
            .map(|t| format!("Bearer {}", t.expose()))
    }

    fn send_feed_page(model: &Model, caps: &Capabilities, page: u32, seq: u64) {
        let mut builder = caps.http.get(model.api.feed_page(page));
        if let Some(auth) = Self::bearer(model) {
            builder = builder.header("Authorization", auth.as_str());
        }
        builder
            .expect_json()
            .send(move |result| Event::FeedPageLoaded {
                seq,
                result: Box::new(result),
            });
    }

    fn send_engagement(model: &Model, caps: &Capabilities, request: &EngagementRequest) {
        let url = model.api.engagement(&request.video_id, request.action);
        let mut builder = caps.http.post(url);
        if let Some(auth) = Self::bearer(model) {
            builder = builder.header("Authorization", auth.as_str());
        }
        let mutation_id = request.mutation_id.clone();
        builder
            .expect_json()
            .send(move |result| Event::EngagementCompleted {
                mutation_id: mutation_id.clone(),
                result: Box::new(result),
            });
    }

    fn send_view_ping(model: &Model, caps: &Capabilities, video_id: &VideoId) {
        let mut builder = caps.http.post(model.api.video_view(video_id));
        if let Some(auth) = Self::bearer(model) {
            builder = builder.header("Authorization", auth.as_str());
        }
        let video_id = video_id.clone();
        builder.send(move |result| Event::ViewRecorded {
            video_id: video_id.clone(),
            result: Box::new(result),
        });
    }

    fn send_chat_list_page(model: &Model, caps: &Capabilities, page: u32, seq: u64) {
        let mut builder = caps.http.get(model.api.conversations_page(page));
        if let Some(auth) = Self::bearer(model) {
            builder = builder.header("Authorization", auth.as_str());
        }
        builder
            .expect_json()
            .send(move |result| Event::ChatListPageLoaded {
                seq,
                result: Box::new(result),
            });
    }

    fn send_poll(model: &Model, caps: &Capabilities, ticket: &PollTicket) {
        let url = model.api.conversation_messages(&ticket.conversation_id);
        let mut builder = caps.http.get(url);
        if let Some(auth) = Self::bearer(model) {
            builder = builder.header("Authorization", auth.as_str());
        }
        let ticket = ticket.clone();
        builder
            .expect_json()
            .send(move |result| Event::PollCompleted {
                ticket: ticket.clone(),
                result: Box::new(result),
            });
    }

    fn schedule_poll(caps: &Capabilities, generation: u64) {
        caps.timer
            .after(generation, POLL_INTERVAL_MS, Event::PollTimerElapsed);
    }

    /// False means the request never left the core; the caller must undo the
    /// optimistic render.
    fn send_message(model: &Model, caps: &Capabilities, outbound: &OutboundMessage) -> bool {
        let url = model.api.conversation_messages(&outbound.conversation_id);
        let request = SendMessageRequest {
            body: outbound.body.clone(),
            client_ref: outbound.local_id.0.clone(),
        };
        let mut builder = caps.http.post(url);
        if let Some(auth) = Self::bearer(model) {
            builder = builder.header("Authorization", auth.as_str());
        }
        match builder.body_json(&request) {
            Ok(builder) => {
                let conversation_id = outbound.conversation_id.clone();
                let local_id = outbound.local_id.clone();
                builder
                    .expect_json()
                    .send(move |result| Event::SendCompleted {
                        conversation_id: conversation_id.clone(),
                        local_id: local_id.clone(),
                        result: Box::new(result),
                    });
                true
            }
            Err(e) => {
                warn!(error = %e, "could not serialize outgoing message");
                false
            }
        }
    }

    fn send_profile_request(model: &Model, caps: &Capabilities) {
        let mut builder = caps.http.get(model.api.me());
        if let Some(auth) = Self::bearer(model) {
            builder = builder.header("Authorization", auth.as_str());
        }
        builder
            .expect_json()
            .send(move |result| Event::ProfileLoaded {
                result: Box::new(result),
            });
    }

    fn send_stories_request(model: &Model, caps: &Capabilities) {
        let mut builder = caps.http.get(model.api.stories());
        if let Some(auth) = Self::bearer(model) {
            builder = builder.header("Authorization", auth.as_str());
        }
        builder
            .expect_json()
            .send(move |result| Event::StoriesLoaded {
                result: Box::new(result),
            });
    }

    fn send_follow_page(model: &Model, caps: &Capabilities, page: u32, seq: u64) {
        let Some(list) = &model.follow_list else { return };
        let url = match list.direction {
            FollowDirection::Followers => model.api.followers_page(&list.user_id, page),
            FollowDirection::Following => model.api.following_page(&list.user_id, page),
        };
        let mut builder = caps.http.get(url);
        if let Some(auth) = Self::bearer(model) {
            builder = builder.header("Authorization", auth.as_str());
        }
        builder
            .expect_json()
            .send(move |result| Event::FollowListPageLoaded {
                seq,
                result: Box::new(result),
            });
    }

    fn teardown_chat(model: &mut Model, caps: &Capabilities) {
        if let Some(mut session) = model.chat.take() {
            caps.timer.cancel(session.generation());
            session.close();
        }
        model.compose_restore = None;
    }

    fn write_profile_cache(caps: &Capabilities, profile: &UserProfile) {
        match serde_json::to_vec(profile) {
            Ok(bytes) => {
                if let Err(e) = caps.kv.set(PROFILE_CACHE_KEY, bytes, Event::ProfileCacheWritten) {
                    warn!(error = %e, "profile cache write rejected");
                }
            }
            Err(e) => warn!(error = %e, "profile cache serialization failed"),
        }
    }

    /// Freshen the chat list row for a conversation from its newest message.
    fn refresh_summary_preview(model: &mut Model) {
        let Some(session) = &model.chat else { return };
        let Some(newest) = session.messages.snapshot().first() else {
            return;
        };
        let (preview, at) = (
            crate::truncate_preview(&newest.body, crate::PREVIEW_LENGTH),
            newest.created_at,
        );
        let key = session.conversation_id().as_str().to_string();
        if let Some(summary) = model.chat_list.summaries.get_server_mut(&key) {
            summary.last_message_preview = preview;
            summary.last_message_at = at;
        }
    }

    // --- view builders ---

    fn build_feed(model: &Model) -> FeedView {
        let items = model
            .feed
            .videos
            .snapshot()
            .iter()
            .map(|v| FeedItem {
                id: v.id.0.clone(),
                author_name: v.author_name.clone(),
                caption: v.caption.clone(),
                media_url: v.media_url.clone(),
                thumbnail_url: v.thumbnail_url.clone(),
                like_count: v.like_count,
                comment_count: v.comment_count,
                is_liked: v.is_liked,
                is_saved: v.is_saved,
                is_active: v.is_active_playback,
                engagement_pending: model.engagement.has_in_flight_for(&v.id),
            })
            .collect();
        FeedView {
            items,
            is_loading: model.feed.pager.is_loading(),
            is_refreshing: model.feed.pager.is_refreshing(),
            has_more: model.feed.pager.has_more(),
        }
    }

    fn build_chat_list(model: &Model, now_ms: u64) -> ChatListView {
        let items = model
            .chat_list
            .summaries
            .snapshot()
            .iter()
            .map(|s| ChatListItem {
                conversation_id: s.conversation_id.0.clone(),
                peer_name: s.peer_name.clone(),
                peer_avatar_url: s.peer_avatar_url.clone(),
                preview: s.last_message_preview.clone(),
                time_ago: crate::format_time_ago(s.last_message_at.0, now_ms),
                unread_count: s.unread_count,
            })
            .collect();
        ChatListView {
            items,
            is_loading: model.chat_list.pager.is_loading(),
            has_more: model.chat_list.pager.has_more(),
        }
    }

    fn build_chat(model: &Model, session: &ChatSession, now_ms: u64) -> ChatView {
        let items = session
            .messages
            .snapshot()
            .iter()
            .map(|m| MessageItem {
                id: m.id.0.clone(),
                body: m.body.clone(),
                is_mine: model.user_id.as_ref() == Some(&m.sender_id),
                is_pending: m.confirmation.is_pending(),
                time_ago: crate::format_time_ago(m.created_at.0, now_ms),
            })
            .collect();
        ChatView {
            conversation_id: session.conversation_id().0.clone(),
            items,
            is_refreshing: session.is_refreshing,
            compose_restore: model.compose_restore.clone(),
        }
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        model.update_timestamp();
        debug!(event = event.name(), "update");

        match event {
            // --- session ---
            Event::Started => {
                if let Err(e) = caps.kv.get(PROFILE_CACHE_KEY, Event::ProfileCacheRead) {
                    warn!(error = %e, "profile cache read rejected");
                }
                caps.render.render();
            }

            Event::LoggedIn {
                user_id,
                auth_token,
            } => {
                model.user_id = Some(UserId::new(user_id));
                model.auth_token = Some(Secret::new(auth_token));
                self.update(Event::ProfileRequested, model, caps);
                caps.render.render();
            }

            Event::LoggedOut => {
                Self::teardown_chat(model, caps);
                model.user_id = None;
                model.auth_token = None;
                model.profile = None;
                model.stories.clear();
                model.feed.clear();
                model.engagement.clear();
                model.chat_list = ChatListState::default();
                model.follow_list = None;
                model.notice = None;
                caps.render.render();
            }

            Event::NetworkStatusChanged { online } => {
                let was_offline = !model.network_online;
                model.network_online = online;
                if online && was_offline && !model.feed.videos.is_empty() {
                    self.update(Event::FeedRefreshRequested, model, caps);
                }
                caps.render.render();
            }

            // --- feed ---
            Event::FeedOpened => {
                if model.feed.videos.is_empty() && !model.feed.pager.is_loading() {
                    self.update(Event::FeedRefreshRequested, model, caps);
                }
                if model.stories.is_empty() {
                    self.update(Event::StoriesRequested, model, caps);
                }
                caps.render.render();
            }

            Event::FeedNextPageRequested => {
                if let Some(request) = model.feed.pager.load_next() {
                    Self::send_feed_page(model, caps, request.page, request.seq);
                }
                caps.render.render();
            }

            Event::FeedRefreshRequested => {
                let request = model.feed.pager.refresh();
                Self::send_feed_page(model, caps, request.page, request.seq);
                caps.render.render();
            }

            Event::FeedPageLoaded { seq, result } => {
                match Self::parse(*result) {
                    Ok(page) => {
                        let posts = page.data.into_iter().map(VideoWire::into_post).collect();
                        model.feed.apply_page(seq, posts, &page.meta);
                    }
                    Err(e) => {
                        model.feed.pager.fail(seq);
                        warn!(error = %e, "feed page load failed");
                        model.notice = Some(e);
                    }
                }
                caps.render.render();
            }

            Event::ActiveVideoChanged { index } => {
                let activated = model.feed.set_active_index(index.map(|i| i as usize));
                if let Some(video_id) = activated {
                    Self::send_view_ping(model, caps, &video_id);
                }
                caps.render.render();
            }

            Event::ViewRecorded { video_id, result } => {
                // Fire-and-forget; a lost view is not worth surfacing.
                if let Err(e) = Self::parse(*result) {
                    debug!(video = %video_id, error = %e, "view ping dropped");
                }
            }

            // --- engagement ---
            Event::LikeToggled { video_id } => {
                let now = UnixTimeMs(model.now_ms);
                match model.engagement.toggle_like(&mut model.feed.videos, &video_id, now) {
                    Some(request) => Self::send_engagement(model, caps, &request),
                    None => warn!(video = %video_id, "like gesture on unknown video"),
                }
                caps.render.render();
            }

            Event::SaveToggled { video_id } => {
                let now = UnixTimeMs(model.now_ms);
                match model.engagement.toggle_save(&mut model.feed.videos, &video_id, now) {
                    Some(request) => Self::send_engagement(model, caps, &request),
                    None => warn!(video = %video_id, "save gesture on unknown video"),
                }
                caps.render.render();
            }

            Event::EngagementCompleted {
                mutation_id,
                result,
            } => {
                match Self::parse(*result) {
                    Ok(wire) => {
                        model
                            .engagement
                            .confirm(&mut model.feed.videos, &mutation_id, &wire);
                    }
                    Err(e) => {
                        debug!(error = %e, "engagement request failed");
                        model.engagement.fail(&mut model.feed.videos, &mutation_id);
                    }
                }
                caps.render.render();
            }

            // --- chat list ---
            Event::ChatListOpened => {
                if model.chat_list.summaries.is_empty() && !model.chat_list.pager.is_loading() {
                    self.update(Event::ChatListRefreshRequested, model, caps);
                }
                caps.render.render();
            }

            Event::ChatListNextPageRequested => {
                if let Some(request) = model.chat_list.pager.load_next() {
                    Self::send_chat_list_page(model, caps, request.page, request.seq);
                }
                caps.render.render();
            }

            Event::ChatListRefreshRequested => {
                let request = model.chat_list.pager.refresh();
                Self::send_chat_list_page(model, caps, request.page, request.seq);
                caps.render.render();
            }

            Event::ChatListPageLoaded { seq, result } => {
                match Self::parse(*result) {
                    Ok(page) => {
                        if model.chat_list.pager.complete(seq, &page.meta) {
                            let summaries: Vec<_> = page
                                .data
                                .into_iter()
                                .map(ChatSummaryWire::into_summary)
                                .collect();
                            if page.meta.current_page <= 1 {
                                model.chat_list.summaries.replace_all(summaries);
                            } else {
                                for summary in summaries {
                                    model.chat_list.summaries.upsert(summary);
                                }
                            }
                        }
                    }
                    Err(e) => {
                        model.chat_list.pager.fail(seq);
                        warn!(error = %e, "chat list load failed");
                        model.notice = Some(e);
                    }
                }
                caps.render.render();
            }

            // --- open conversation ---
            Event::ConversationOpened { conversation_id } => {
                Self::teardown_chat(model, caps);
                let generation = model.bump_generation();
                let mut session = ChatSession::open(conversation_id.clone(), generation);

                if let Some(summary) = model
                    .chat_list
                    .summaries
                    .get_server_mut(conversation_id.as_str())
                {
                    summary.mark_read();
                }

                let ticket = session.begin_poll();
                model.chat = Some(session);
                if let Some(ticket) = ticket {
                    Self::send_poll(model, caps, &ticket);
                }
                Self::schedule_poll(caps, generation);
                caps.render.render();
            }

            Event::ConversationClosed => {
                Self::teardown_chat(model, caps);
                caps.render.render();
            }

            Event::ChatRefreshRequested => {
                let ticket = model.chat.as_mut().and_then(ChatSession::begin_refresh);
                if let Some(ticket) = ticket {
                    Self::send_poll(model, caps, &ticket);
                }
                caps.render.render();
            }

            Event::PollTimerElapsed(output) => {
                let TimerOutput::Fired { id } = output else {
                    return;
                };
                let ticket = match model.chat.as_mut() {
                    Some(session)
                        if session.generation() == id
                            && session.poll_state() != PollState::Stopped =>
                    {
                        // Re-arm first so the cadence survives a failed poll.
                        Self::schedule_poll(caps, id);
                        session.begin_poll()
                    }
                    _ => None,
                };
                if let Some(ticket) = ticket {
                    Self::send_poll(model, caps, &ticket);
                }
            }

            Event::PollCompleted { ticket, result } => {
                let Some(session) = model.chat.as_mut() else {
                    debug!("poll resolved after conversation closed");
                    return;
                };
                if !session.accepts(&ticket) {
                    debug!(generation = ticket.generation, "stale poll result dropped");
                    return;
                }
                match Self::parse(*result) {
                    Ok(wires) => {
                        let messages = wires.into_iter().map(MessageWire::into_message).collect();
                        session.apply_poll(&ticket, messages);
                        Self::refresh_summary_preview(model);
                    }
                    Err(e) => {
                        // No backoff: absorbed, the next tick retries.
                        debug!(error = %e, "poll failed");
                        session.poll_failed(&ticket);
                    }
                }
                caps.render.render();
            }

            Event::ComposeSubmitted { body } => {
                let Some(sender) = model.user_id.clone() else {
                    model.notice = Some(AppError::new(
                        ErrorKind::Authentication,
                        "Sign in to send messages",
                    ));
                    caps.render.render();
                    return;
                };
                let now = UnixTimeMs(model.now_ms);
                let queued = match model.chat.as_mut() {
                    Some(session) => session.queue_send(&sender, &body, now),
                    None => return,
                };
                match queued {
                    Ok(outbound) => {
                        if !Self::send_message(model, caps, &outbound) {
                            let restored = model
                                .chat
                                .as_mut()
                                .and_then(|s| s.fail_send(&outbound.local_id));
                            model.compose_restore = restored;
                            model.notice = Some(AppError::new(
                                ErrorKind::InvalidState,
                                "Your message didn't send",
                            ));
                        }
                    }
                    Err(e) => {
                        model.notice = Some(AppError::new(ErrorKind::Validation, e.to_string()));
                    }
                }
                caps.render.render();
            }

            Event::SendCompleted {
                conversation_id,
                local_id,
                result,
            } => {
                let Some(session) = model.chat.as_mut() else {
                    debug!("send resolved after conversation closed");
                    return;
                };
                if session.conversation_id() != &conversation_id {
                    debug!("send resolved for a different conversation");
                    return;
                }
                match Self::parse(*result) {
                    Ok(wire) => {
                        let created_at = wire.created_at_ms.map(UnixTimeMs);
                        session.confirm_send(&local_id, MessageId::new(wire.id), created_at);
                        Self::refresh_summary_preview(model);
                    }
                    Err(e) => {
                        if let Some(text) = session.fail_send(&local_id) {
                            model.compose_restore = Some(text);
                            model.notice = Some(AppError::new(e.kind, "Your message didn't send"));
                        }
                    }
                }
                caps.render.render();
            }

            Event::ComposeRestoreConsumed => {
                model.compose_restore = None;
            }

            // --- profile ---
            Event::ProfileRequested => {
                Self::send_profile_request(model, caps);
            }

            Event::ProfileLoaded { result } => {
                match Self::parse(*result) {
                    Ok(wire) => {
                        let profile = wire.into_profile();
                        Self::write_profile_cache(caps, &profile);
                        model.profile = Some(profile);
                    }
                    Err(e) => {
                        warn!(error = %e, "profile load failed");
                        if model.profile.is_none() {
                            model.notice = Some(e);
                        }
                    }
                }
                caps.render.render();
            }

            Event::ProfileCacheRead(output) => {
                if let KvOutput::Value(Some(bytes)) = output {
                    if model.profile.is_none() {
                        match serde_json::from_slice::<UserProfile>(&bytes) {
                            Ok(profile) => {
                                model.profile = Some(profile);
                                caps.render.render();
                            }
                            Err(e) => warn!(error = %e, "ignoring malformed profile cache"),
                        }
                    }
                }
            }

            Event::ProfileCacheWritten(output) => {
                if let KvOutput::Written(false) = output {
                    warn!("profile cache write failed");
                }
            }

            // --- stories ---
            Event::StoriesRequested => {
                Self::send_stories_request(model, caps);
            }

            Event::StoriesLoaded { result } => {
                match Self::parse(*result) {
                    Ok(wires) => {
                        let seen: HashSet<String> = model
                            .stories
                            .iter()
                            .filter(|r| r.seen)
                            .map(|r| r.author_id.0.clone())
                            .collect();
                        model.stories = wires
                            .into_iter()
                            .map(StoryReelWire::into_reel)
                            .map(|mut reel| {
                                reel.seen = seen.contains(&reel.author_id.0);
                                reel
                            })
                            .collect();
                    }
                    // The tray is decorative; a failed load just keeps the old one.
                    Err(e) => debug!(error = %e, "stories load failed"),
                }
                caps.render.render();
            }

            Event::StorySeen { author_id } => {
                if let Some(reel) = model.stories.iter_mut().find(|r| r.author_id == author_id) {
                    reel.seen = true;
                }
                caps.render.render();
            }

            // --- follower / following lists ---
            Event::FollowListOpened { user_id, direction } => {
                let mut list = FollowListState::new(user_id, direction);
                let request = list.pager.refresh();
                model.follow_list = Some(list);
                Self::send_follow_page(model, caps, request.page, request.seq);
                caps.render.render();
            }

            Event::FollowListNextPageRequested => {
                let request = model
                    .follow_list
                    .as_mut()
                    .and_then(|list| list.pager.load_next());
                if let Some(request) = request {
                    Self::send_follow_page(model, caps, request.page, request.seq);
                }
                caps.render.render();
            }

            Event::FollowListClosed => {
                model.follow_list = None;
                caps.render.render();
            }

            Event::FollowListPageLoaded { seq, result } => {
                match Self::parse(*result) {
                    Ok(page) => {
                        if let Some(list) = model.follow_list.as_mut() {
                            if list.pager.complete(seq, &page.meta) {
                                let cards: Vec<_> = page
                                    .data
                                    .into_iter()
                                    .map(UserCardWire::into_card)
                                    .collect();
                                if page.meta.current_page <= 1 {
                                    list.users.replace_all(cards);
                                } else {
                                    for card in cards {
                                        list.users.upsert(card);
                                    }
                                }
                            }
                        }
                    }
                    Err(e) => {
                        if let Some(list) = model.follow_list.as_mut() {
                            list.pager.fail(seq);
                        }
                        warn!(error = %e, "follow list load failed");
                    }
                }
                caps.render.render();
            }

            Event::NoticeDismissed => {
                model.notice = None;
                caps.render.render();
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        let now_ms = model.now_ms;
        ViewModel {
            feed: Self::build_feed(model),
            stories: model
                .stories
                .iter()
                .map(|r| StoryTile {
                    author_id: r.author_id.0.clone(),
                    author_name: r.author_name.clone(),
                    author_avatar_url: r.author_avatar_url.clone(),
                    item_count: u32::try_from(r.item_urls.len()).unwrap_or(u32::MAX),
                    seen: r.seen,
                })
                .collect(),
            chat_list: Self::build_chat_list(model, now_ms),
            chat: model
                .chat
                .as_ref()
                .map(|session| Self::build_chat(model, session, now_ms)),
            profile: model.profile.as_ref().map(|p| ProfileView {
                username: p.username.clone(),
                display_name: p.display_name.clone(),
                bio: p.bio.clone(),
                avatar_url: p.avatar_url.clone(),
                follower_count: p.follower_count,
                following_count: p.following_count,
                video_count: p.video_count,
            }),
            follow_list: model.follow_list.as_ref().map(|list| FollowListView {
                title: list.direction.title().to_string(),
                items: list
                    .users
                    .snapshot()
                    .iter()
                    .map(|u| UserCardView {
                        id: u.id.0.clone(),
                        username: u.username.clone(),
                        display_name: u.display_name.clone(),
                        avatar_url: u.avatar_url.clone(),
                    })
                    .collect(),
                is_loading: list.pager.is_loading(),
                has_more: list.pager.has_more(),
            }),
            notice: model.notice.as_ref().map(|e| Notice {
                message: e.user_facing_message(),
                retryable: e.is_retryable(),
            }),
        }
    }
}
