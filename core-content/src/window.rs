//! Paginated verse window
//!
//! [`VerseWindow`] holds the verses of one chapter that have been fetched so
//! far (the materialized window) together with its [`PaginationCursor`]. The
//! window only grows until it is reset for a different chapter or narrator.

use parking_lot::RwLock;
use tracing::{debug, instrument};

use crate::api::ContentApi;
use crate::error::Result;
use crate::models::{PageInfo, Verse, VerseKey, VersePage};

/// Tracks how far through a chapter's pages the window has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationCursor {
    pub pages_fetched: u32,
    pub fetched_records: u32,
    /// Unknown until the first page arrives.
    pub total_records: Option<u32>,
}

impl PaginationCursor {
    pub fn new() -> Self {
        Self {
            pages_fetched: 0,
            fetched_records: 0,
            total_records: None,
        }
    }

    pub fn has_more(&self) -> bool {
        match self.total_records {
            None => true,
            Some(total) => self.fetched_records < total,
        }
    }

    /// Page number to request next, if any remain.
    pub fn next_page(&self) -> Option<u32> {
        self.has_more().then_some(self.pages_fetched + 1)
    }

    fn record(&mut self, info: &PageInfo, records: u32) {
        self.pages_fetched = self.pages_fetched.max(info.current_page);
        self.fetched_records = self.fetched_records.saturating_add(records);
        self.total_records = Some(info.total_records);
    }
}

impl Default for PaginationCursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Pending fetch handed out by [`VerseWindow::next_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub chapter_id: u32,
    pub page: u32,
    pub narrator_id: Option<u32>,
    generation: u64,
}

/// Verses of one chapter fetched so far, in verse order.
#[derive(Debug, Clone)]
pub struct VerseWindow {
    chapter_id: u32,
    narrator_id: Option<u32>,
    cursor: PaginationCursor,
    verses: Vec<Verse>,
    generation: u64,
}

impl VerseWindow {
    pub fn new(chapter_id: u32, narrator_id: Option<u32>) -> Self {
        Self {
            chapter_id,
            narrator_id,
            cursor: PaginationCursor::new(),
            verses: Vec::new(),
            generation: 0,
        }
    }

    pub fn chapter_id(&self) -> u32 {
        self.chapter_id
    }

    pub fn narrator_id(&self) -> Option<u32> {
        self.narrator_id
    }

    pub fn cursor(&self) -> &PaginationCursor {
        &self.cursor
    }

    pub fn has_more(&self) -> bool {
        self.cursor.has_more()
    }

    pub fn verses(&self) -> &[Verse] {
        &self.verses
    }

    pub fn len(&self) -> usize {
        self.verses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verses.is_empty()
    }

    pub fn get(&self, key: &VerseKey) -> Option<&Verse> {
        self.verses
            .binary_search_by(|v| v.key.cmp(key))
            .ok()
            .map(|i| &self.verses[i])
    }

    pub fn contains(&self, key: &VerseKey) -> bool {
        self.get(key).is_some()
    }

    /// Drop everything and start over. Pages requested before the reset are
    /// ignored when they arrive.
    pub fn reset(&mut self, chapter_id: u32, narrator_id: Option<u32>) {
        self.chapter_id = chapter_id;
        self.narrator_id = narrator_id;
        self.cursor = PaginationCursor::new();
        self.verses.clear();
        self.generation += 1;
    }

    pub fn next_request(&self) -> Option<PageRequest> {
        self.cursor.next_page().map(|page| PageRequest {
            chapter_id: self.chapter_id,
            page,
            narrator_id: self.narrator_id,
            generation: self.generation,
        })
    }

    /// Merge a fetched page. Returns the number of verses added, or `None`
    /// when the page belongs to a window that has since been reset.
    ///
    /// Verses from another chapter and duplicates are skipped.
    pub fn apply_page(&mut self, request: &PageRequest, page: VersePage) -> Option<usize> {
        if request.generation != self.generation {
            return None;
        }

        let received = page.verses.len() as u32;
        let before = self.verses.len();
        for verse in page.verses {
            if verse.key.chapter != self.chapter_id {
                continue;
            }
            if let Err(pos) = self.verses.binary_search_by(|v| v.key.cmp(&verse.key)) {
                self.verses.insert(pos, verse);
            }
        }
        self.cursor.record(&page.pagination, received);
        Some(self.verses.len() - before)
    }

    /// Case-insensitive search over word translations and verse keys.
    ///
    /// A blank query returns the whole window.
    pub fn filter(&self, query: &str) -> Vec<&Verse> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.verses.iter().collect();
        }
        self.verses
            .iter()
            .filter(|verse| {
                verse.translation_text().to_lowercase().contains(&query)
                    || verse.key.to_string().contains(&query)
            })
            .collect()
    }
}

/// Fetch the next page into a shared window.
///
/// The lock is not held across the request. Returns the number of verses
/// added; zero when nothing remains or the window was reset meanwhile.
#[instrument(skip(window, api))]
pub async fn load_next_page(window: &RwLock<VerseWindow>, api: &dyn ContentApi) -> Result<usize> {
    let Some(request) = window.read().next_request() else {
        return Ok(0);
    };

    let page = api
        .fetch_verses(request.chapter_id, request.page, request.narrator_id)
        .await?;

    match window.write().apply_page(&request, page) {
        Some(added) => {
            debug!(chapter = request.chapter_id, page = request.page, added, "Window grew");
            Ok(added)
        }
        None => {
            debug!(chapter = request.chapter_id, page = request.page, "Discarded stale page");
            Ok(0)
        }
    }
}
