//! Content API response types
//!
//! Data structures for deserializing `api.quran.com/api/v4` responses.

use serde::Deserialize;

use crate::error::{ContentError, Result};
use crate::models::{
    AudioDescriptor, AudioRef, Chapter, ChapterInfo, Narrator, PageInfo, RevelationPlace, Verse,
    VersePage, Word,
};

#[derive(Debug, Deserialize)]
pub struct TranslatedText {
    pub text: Option<String>,
    #[serde(default)]
    pub language_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TranslatedName {
    pub name: String,
    #[serde(default)]
    pub language_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiWord {
    pub id: u64,
    pub position: u32,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub char_type_name: String,
    #[serde(default)]
    pub translation: Option<TranslatedText>,
    #[serde(default)]
    pub transliteration: Option<TranslatedText>,
}

#[derive(Debug, Deserialize)]
pub struct ApiVerseAudio {
    pub url: Option<String>,
}

/// Verse resource
#[derive(Debug, Deserialize)]
pub struct ApiVerse {
    pub id: u64,
    pub verse_key: String,
    #[serde(default)]
    pub text_uthmani: Option<String>,
    #[serde(default)]
    pub page_number: Option<u32>,
    #[serde(default)]
    pub juz_number: Option<u32>,
    #[serde(default)]
    pub words: Vec<ApiWord>,
    #[serde(default)]
    pub audio: Option<ApiVerseAudio>,
}

impl TryFrom<ApiVerse> for Verse {
    type Error = ContentError;

    fn try_from(verse: ApiVerse) -> Result<Self> {
        let key = verse.verse_key.parse()?;
        let audio = verse
            .audio
            .and_then(|a| a.url)
            .filter(|url| !url.trim().is_empty())
            .map(|url| AudioRef { url });

        Ok(Verse {
            id: verse.id,
            key,
            text_uthmani: verse.text_uthmani.unwrap_or_default(),
            page_number: verse.page_number,
            juz_number: verse.juz_number,
            words: verse
                .words
                .into_iter()
                .map(|w| Word {
                    id: w.id,
                    position: w.position,
                    char_type: w.char_type_name,
                    translation: w.translation.and_then(|t| t.text),
                    transliteration: w.transliteration.and_then(|t| t.text),
                    audio_url: w.audio_url,
                })
                .collect(),
            audio,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiPagination {
    pub per_page: u32,
    pub current_page: u32,
    #[serde(default)]
    pub next_page: Option<u32>,
    pub total_pages: u32,
    pub total_records: u32,
}

/// `verses/by_chapter` response
#[derive(Debug, Deserialize)]
pub struct VersesResponse {
    pub verses: Vec<ApiVerse>,
    pub pagination: ApiPagination,
}

impl TryFrom<VersesResponse> for VersePage {
    type Error = ContentError;

    fn try_from(response: VersesResponse) -> Result<Self> {
        let verses = response
            .verses
            .into_iter()
            .map(Verse::try_from)
            .collect::<Result<Vec<_>>>()?;
        let p = response.pagination;
        Ok(VersePage {
            verses,
            pagination: PageInfo {
                per_page: p.per_page,
                current_page: p.current_page,
                next_page: p.next_page,
                total_pages: p.total_pages,
                total_records: p.total_records,
            },
        })
    }
}

/// `verses/random` response
#[derive(Debug, Deserialize)]
pub struct RandomVerseResponse {
    pub verse: ApiVerse,
}

#[derive(Debug, Deserialize)]
pub struct ApiRecitation {
    pub id: u32,
    pub reciter_name: String,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub translated_name: Option<TranslatedName>,
}

impl From<ApiRecitation> for Narrator {
    fn from(r: ApiRecitation) -> Self {
        Narrator {
            id: r.id,
            name: r.reciter_name,
            style: r.style.filter(|s| !s.is_empty()),
            translated_name: r.translated_name.map(|t| t.name),
        }
    }
}

/// `resources/recitations` response. The key is optional so a missing list
/// can be reported as a parse error rather than an empty catalog.
#[derive(Debug, Deserialize)]
pub struct RecitationsResponse {
    #[serde(default)]
    pub recitations: Option<Vec<ApiRecitation>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiAudioFile {
    pub audio_url: Option<String>,
    pub file_size: Option<f64>,
}

/// `chapter_recitations/{narrator}/{chapter}` response
#[derive(Debug, Deserialize)]
pub struct ChapterAudioResponse {
    #[serde(default)]
    pub audio_file: Option<ApiAudioFile>,
}

impl ApiAudioFile {
    /// A descriptor needs both a URL and a positive size.
    pub fn into_descriptor(self) -> Option<AudioDescriptor> {
        let url = self.audio_url.filter(|u| !u.trim().is_empty())?;
        let size = self.file_size.filter(|s| s.is_finite() && *s > 0.0)?;
        Some(AudioDescriptor {
            url,
            byte_size: size.round() as u64,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiChapter {
    pub id: u32,
    pub revelation_place: RevelationPlace,
    pub revelation_order: u32,
    pub bismillah_pre: bool,
    pub name_simple: String,
    pub name_arabic: String,
    pub verses_count: u32,
    pub translated_name: TranslatedName,
}

impl From<ApiChapter> for Chapter {
    fn from(c: ApiChapter) -> Self {
        Chapter {
            id: c.id,
            name_simple: c.name_simple,
            name_arabic: c.name_arabic,
            translated_name: c.translated_name.name,
            verses_count: c.verses_count,
            revelation_place: c.revelation_place,
            revelation_order: c.revelation_order,
            bismillah_pre: c.bismillah_pre,
        }
    }
}

/// `chapters` response
#[derive(Debug, Deserialize)]
pub struct ChaptersResponse {
    pub chapters: Vec<ApiChapter>,
}

#[derive(Debug, Deserialize)]
pub struct ApiChapterInfo {
    pub chapter_id: u32,
    #[serde(default)]
    pub language_name: String,
    #[serde(default)]
    pub short_text: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub text: String,
}

/// `chapters/{id}/info` response
#[derive(Debug, Deserialize)]
pub struct ChapterInfoResponse {
    pub chapter_info: ApiChapterInfo,
}

impl From<ApiChapterInfo> for ChapterInfo {
    fn from(info: ApiChapterInfo) -> Self {
        ChapterInfo {
            chapter_id: info.chapter_id,
            language_name: info.language_name,
            source: info.source,
            short_text: info.short_text,
            text: info.text,
        }
    }
}
