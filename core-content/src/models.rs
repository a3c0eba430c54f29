//! Domain models
//!
//! Content units as the rest of the core sees them. Wire shapes live in
//! [`crate::types`] and are converted into these on arrival.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ContentError;

// =============================================================================
// Verse key
// =============================================================================

/// Composite `chapter:verse` identifier.
///
/// Ordering compares the two integer parts numerically, so `2:10` sorts after
/// `2:9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VerseKey {
    pub chapter: u32,
    pub verse: u32,
}

impl VerseKey {
    pub fn new(chapter: u32, verse: u32) -> Self {
        Self { chapter, verse }
    }

    /// Key of the following verse in the same chapter.
    pub fn next(&self) -> Option<Self> {
        self.verse.checked_add(1).map(|verse| Self::new(self.chapter, verse))
    }

    /// Key of the preceding verse in the same chapter. `None` for verse 1.
    pub fn previous(&self) -> Option<Self> {
        match self.verse {
            0 | 1 => None,
            verse => Some(Self::new(self.chapter, verse - 1)),
        }
    }
}

impl fmt::Display for VerseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chapter, self.verse)
    }
}

impl FromStr for VerseKey {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ContentError::InvalidVerseKey(s.to_string());
        let (chapter, verse) = s.trim().split_once(':').ok_or_else(invalid)?;
        let chapter = chapter.parse().map_err(|_| invalid())?;
        let verse = verse.parse().map_err(|_| invalid())?;
        Ok(Self { chapter, verse })
    }
}

impl TryFrom<String> for VerseKey {
    type Error = ContentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VerseKey> for String {
    fn from(key: VerseKey) -> Self {
        key.to_string()
    }
}

// =============================================================================
// Verses
// =============================================================================

/// Relative audio path attached to a verse, e.g. `AbdulBaset/Mujawwad/mp3/001001.mp3`.
///
/// Absent on verses nobody has recorded for the requested narrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioRef {
    pub url: String,
}

/// A single word of a verse with its translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub id: u64,
    pub position: u32,
    /// `word`, `end`, `pause` ...
    pub char_type: String,
    pub translation: Option<String>,
    pub transliteration: Option<String>,
    pub audio_url: Option<String>,
}

/// A verse as fetched by page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verse {
    pub id: u64,
    pub key: VerseKey,
    pub text_uthmani: String,
    pub page_number: Option<u32>,
    pub juz_number: Option<u32>,
    pub words: Vec<Word>,
    pub audio: Option<AudioRef>,
}

impl Verse {
    pub fn chapter_id(&self) -> u32 {
        self.key.chapter
    }

    pub fn verse_number(&self) -> u32 {
        self.key.verse
    }

    /// Word translations joined by spaces, used for search.
    pub fn translation_text(&self) -> String {
        self.words
            .iter()
            .filter_map(|w| w.translation.as_deref())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Pagination block returned with every page of verses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub per_page: u32,
    pub current_page: u32,
    pub next_page: Option<u32>,
    pub total_pages: u32,
    pub total_records: u32,
}

/// One page of a chapter's verses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersePage {
    pub verses: Vec<Verse>,
    pub pagination: PageInfo,
}

// =============================================================================
// Chapters
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevelationPlace {
    Makkah,
    Madinah,
}

/// Chapter (surah) metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: u32,
    pub name_simple: String,
    pub name_arabic: String,
    pub translated_name: String,
    pub verses_count: u32,
    pub revelation_place: RevelationPlace,
    pub revelation_order: u32,
    pub bismillah_pre: bool,
}

/// Descriptive text about a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterInfo {
    pub chapter_id: u32,
    pub language_name: String,
    pub source: String,
    pub short_text: String,
    /// Rich text (HTML) body
    pub text: String,
}

// =============================================================================
// Narrators and audio
// =============================================================================

/// A reciter whose recordings can be selected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Narrator {
    pub id: u32,
    pub name: String,
    /// `Murattal`, `Mujawwad` ... Some narrators carry none.
    pub style: Option<String>,
    pub translated_name: Option<String>,
}

impl Narrator {
    /// Name with the recitation style, e.g. `Mishari Rashid al-Afasy (Murattal)`.
    pub fn display_name(&self) -> String {
        match &self.style {
            Some(style) => format!("{} ({})", self.name, style),
            None => self.name.clone(),
        }
    }
}

/// Downloadable chapter recitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDescriptor {
    pub url: String,
    pub byte_size: u64,
}
