//! Page-based loading for any list the API paginates, plus the feed's
//! exclusive-playback tracking.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::PageMeta;
use crate::entity::{VideoId, VideoPost};
use crate::store::{EntityStore, StoreOrder};

/// Issued per fetch; `seq` stamps the request so a response that lost a race
/// with a refresh is dropped instead of appended.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pager {
    current_page: u32,
    has_more: bool,
    is_loading: bool,
    is_refreshing: bool,
    seq: u64,
}

impl Default for Pager {
    fn default() -> Self {
        Self::new()
    }
}

impl Pager {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current_page: 0,
            has_more: true,
            is_loading: false,
            is_refreshing: false,
            seq: 0,
        }
    }

    /// No-op while a fetch is in flight or the server has no more pages.
    pub fn load_next(&mut self) -> Option<PageRequest> {
        if self.is_loading || !self.has_more {
            return None;
        }
        self.is_loading = true;
        self.seq += 1;
        Some(PageRequest {
            page: self.current_page + 1,
            seq: self.seq,
        })
    }

    /// Back to page one. The caller replaces the list contents when the
    /// response arrives; a response to any earlier request is now stale.
    pub fn refresh(&mut self) -> PageRequest {
        self.seq += 1;
        self.is_loading = true;
        self.is_refreshing = true;
        self.has_more = true;
        self.current_page = 0;
        PageRequest { page: 1, seq: self.seq }
    }

    /// Returns false for stale responses, which must not be applied.
    pub fn complete(&mut self, seq: u64, meta: &PageMeta) -> bool {
        if seq != self.seq {
            debug!(seq, current = self.seq, "ignoring stale page response");
            return false;
        }
        self.is_loading = false;
        self.is_refreshing = false;
        self.current_page = meta.current_page;
        self.has_more = meta.current_page < meta.last_page;
        true
    }

    pub fn fail(&mut self, seq: u64) {
        if seq != self.seq {
            return;
        }
        self.is_loading = false;
        self.is_refreshing = false;
    }

    #[must_use]
    pub const fn current_page(&self) -> u32 {
        self.current_page
    }

    /// Sequence number of the most recent request; responses carrying an
    /// older one are stale.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.has_more
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.is_loading
    }

    #[must_use]
    pub const fn is_refreshing(&self) -> bool {
        self.is_refreshing
    }
}

/// The applied result of a page response.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AppliedPage {
    Replaced(usize),
    Appended(usize),
    Stale,
}

#[derive(Debug)]
pub struct FeedState {
    pub videos: EntityStore<VideoPost>,
    pub pager: Pager,
    active_index: Option<usize>,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            videos: EntityStore::new(StoreOrder::Arrival),
            pager: Pager::new(),
            active_index: None,
        }
    }
}

impl FeedState {
    /// Page one replaces, later pages append in server order.
    pub fn apply_page(
        &mut self,
        seq: u64,
        videos: Vec<VideoPost>,
        meta: &PageMeta,
    ) -> AppliedPage {
        if !self.pager.complete(seq, meta) {
            return AppliedPage::Stale;
        }

        let count = videos.len();
        let applied = if meta.current_page <= 1 {
            self.videos.replace_all(videos);
            AppliedPage::Replaced(count)
        } else {
            for video in videos {
                self.videos.upsert(video);
            }
            AppliedPage::Appended(count)
        };
        self.sync_active_flag();
        applied
    }

    /// The shell reports which cell the viewport settled on; the flag swap is
    /// atomic within this call, so no snapshot ever shows two active posts.
    /// Returns the newly activated id, if any, so a view can be recorded.
    pub fn set_active_index(&mut self, index: Option<usize>) -> Option<VideoId> {
        if let Some(i) = index {
            // A report that outran the list (mid-refresh scroll) is ignored.
            if i >= self.videos.len() {
                return None;
            }
        }
        if index == self.active_index {
            return None;
        }

        // Flip the previous one off before turning the new one on.
        if let Some(prev) = self.active_index {
            if let Some(video) = self.videos.snapshot().get(prev).map(|v| v.id.clone()) {
                if let Some(v) = self.videos.get_server_mut(video.as_str()) {
                    v.is_active_playback = false;
                }
            }
        }

        self.active_index = index;
        index.and_then(|i| {
            let id = self.videos.snapshot().get(i).map(|v| v.id.clone())?;
            self.videos.get_server_mut(id.as_str())?.is_active_playback = true;
            Some(id)
        })
    }

    #[must_use]
    pub const fn active_index(&self) -> Option<usize> {
        self.active_index
    }

    pub fn clear(&mut self) {
        self.videos.clear();
        self.pager = Pager::new();
        self.active_index = None;
    }

    /// After a replace the indices may have shifted; re-point the flag at the
    /// entity the viewport index refers to now.
    fn sync_active_flag(&mut self) {
        let index = self.active_index.filter(|i| *i < self.videos.len());
        self.active_index = None;
        self.set_active_index(index);
        // A non-empty feed with a settled viewport always has one active post.
        if self.active_index.is_none() && !self.videos.is_empty() {
            self.set_active_index(Some(0));
        }
    }
}
