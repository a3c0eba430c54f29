//! # Playback Error Types
//!
//! Errors surfaced by the download manager, the playback engine and the
//! sequencers. Most failures are also recorded as state transitions before
//! the `Err` reaches the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during playback and download operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Device Errors
    // ========================================================================
    /// The audio device could not open or play the source.
    #[error("Playback failed: {0}")]
    Playback(String),

    /// Operation needs a loaded source and none is loaded.
    #[error("No source loaded")]
    NoSourceLoaded,

    // ========================================================================
    // Content Errors
    // ========================================================================
    /// The verse is not part of the loaded window.
    #[error("Verse {0} is not loaded")]
    VerseNotLoaded(String),

    /// The chapter recitation has not been downloaded for this narrator.
    #[error("Chapter {chapter_id} by narrator {narrator_id} is not downloaded")]
    NotDownloaded { chapter_id: u32, narrator_id: u32 },

    #[error(transparent)]
    Content(#[from] core_content::ContentError),

    // ========================================================================
    // Storage Errors
    // ========================================================================
    /// Local file system failure.
    #[error("I/O error at {path:?}: {message}")]
    Io { path: PathBuf, message: String },

    #[error(transparent)]
    Bridge(#[from] bridge_traits::error::BridgeError),
}

impl PlaybackError {
    /// Returns `true` if the user can reasonably retry.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::Playback(_) | PlaybackError::Io { .. } => true,
            PlaybackError::Content(e) => e.is_retryable(),
            PlaybackError::Bridge(e) => !e.is_local_io(),
            _ => false,
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
