//! Asset resolution
//!
//! Maps a chapter and narrator to a downloadable recitation, and a verse to
//! its streaming URL. No caching happens here.

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::api::ContentApi;
use crate::error::Result;
use crate::models::{AudioDescriptor, Verse};

pub struct AssetResolver {
    api: Arc<dyn ContentApi>,
    verse_audio_host: String,
}

impl AssetResolver {
    pub fn new(api: Arc<dyn ContentApi>, verse_audio_host: impl Into<String>) -> Self {
        Self {
            api,
            verse_audio_host: verse_audio_host.into(),
        }
    }

    /// Descriptor for a full chapter recitation.
    ///
    /// `NotFound` when the narrator never recorded the chapter, `Network` on
    /// transport failure.
    #[instrument(skip(self))]
    pub async fn resolve_chapter_audio(
        &self,
        chapter_id: u32,
        narrator_id: u32,
    ) -> Result<AudioDescriptor> {
        let descriptor = self.api.fetch_chapter_audio(chapter_id, narrator_id).await?;
        debug!(bytes = descriptor.byte_size, "Resolved chapter audio");
        Ok(descriptor)
    }

    /// Streaming URL for a verse, or `None` if the verse has no recording.
    pub fn resolve_verse_audio_url(&self, verse: &Verse) -> Option<String> {
        resolve_verse_audio_url(verse, &self.verse_audio_host)
    }
}

/// Join the verse's relative audio path onto `base_host`.
///
/// Fragments that are already absolute URLs are returned unchanged.
pub fn resolve_verse_audio_url(verse: &Verse, base_host: &str) -> Option<String> {
    let fragment = verse.audio.as_ref()?.url.trim();
    if fragment.is_empty() {
        return None;
    }
    if fragment.starts_with("http://") || fragment.starts_with("https://") || fragment.starts_with("//") {
        return Some(fragment.to_string());
    }
    Some(format!(
        "{}/{}",
        base_host.trim_end_matches('/'),
        fragment.trim_start_matches('/')
    ))
}
