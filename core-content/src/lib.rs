//! # Content Module
//!
//! Chapters, verses and narrators as served by the content API, plus the
//! pieces of the playback core that only read content:
//!
//! - [`ContentApi`] / [`QuranApiClient`]: remote read-only API
//! - [`AssetResolver`]: chapter download descriptors and verse stream URLs
//! - [`VerseWindow`]: the paginated, materialized slice of a chapter

pub mod api;
pub mod error;
pub mod models;
pub mod resolver;
pub mod types;
pub mod window;

pub use api::{ContentApi, QuranApiClient};
pub use error::{ContentError, Result};
pub use models::{
    AudioDescriptor, AudioRef, Chapter, ChapterInfo, Narrator, PageInfo, RevelationPlace, Verse,
    VerseKey, VersePage, Word,
};
pub use resolver::{resolve_verse_audio_url, AssetResolver};
pub use window::{load_next_page, PageRequest, PaginationCursor, VerseWindow};
