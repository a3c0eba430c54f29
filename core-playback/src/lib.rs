//! # Playback & Download Module
//!
//! Sequential audio playback and download orchestration.
//!
//! ## Overview
//!
//! This module handles:
//! - Chapter recitation downloads keyed by chapter and narrator ([`DownloadManager`])
//! - The single shared audio output device ([`PlaybackEngine`])
//! - Auto-advance through the loaded verses of a chapter ([`VerseSequencer`])
//! - Whole-chapter playback of downloaded files ([`ChapterPlayer`])

pub mod chapter;
pub mod download;
pub mod engine;
pub mod error;
pub mod sequencer;

pub use chapter::{ChapterPlayer, ChapterProgress};
pub use download::{
    DownloadFailure, DownloadKey, DownloadManager, DownloadOutcome, DownloadState, FailureKind,
    VerseDownload,
};
pub use engine::{EngineSnapshot, EngineState, PlaybackEngine, SubscriptionToken};
pub use error::{PlaybackError, Result};
pub use sequencer::{advance, advance_key, previous, previous_key, PlayOutcome, VerseSequencer};
