//! Whole-chapter playback from downloaded files.

use bridge_traits::playback::AudioSource;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::download::{DownloadKey, DownloadManager};
use crate::engine::{EngineState, PlaybackEngine};
use crate::error::{PlaybackError, Result};

/// Progress bar data for the chapter being played.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterProgress {
    pub chapter_id: u32,
    pub is_playing: bool,
    pub position: Duration,
    pub duration: Option<Duration>,
}

impl ChapterProgress {
    /// Fraction played, `0.0` while the duration is unknown.
    pub fn fraction(&self) -> f64 {
        match self.duration {
            Some(d) if !d.is_zero() => (self.position.as_secs_f64() / d.as_secs_f64()).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }
}

/// Plays one downloaded chapter at a time through the shared engine.
pub struct ChapterPlayer {
    engine: PlaybackEngine,
    downloads: Arc<DownloadManager>,
    current: Mutex<Option<(DownloadKey, String)>>,
}

impl ChapterPlayer {
    pub fn new(engine: PlaybackEngine, downloads: Arc<DownloadManager>) -> Self {
        Self {
            engine,
            downloads,
            current: Mutex::new(None),
        }
    }

    pub fn current_chapter(&self) -> Option<u32> {
        self.current.lock().as_ref().map(|(key, _)| key.chapter_id)
    }

    /// Pause or resume `chapter_id` if it is the loaded chapter; otherwise
    /// replace whatever is loaded with its local file and start playing.
    #[instrument(skip(self))]
    pub async fn toggle_chapter(&self, chapter_id: u32, narrator_id: u32) -> Result<()> {
        let key = DownloadKey::new(chapter_id, narrator_id);
        let current = self.current.lock().clone();
        let loaded = self.engine.current_uri().await;

        if let Some((current_key, uri)) = current {
            if current_key == key && loaded.as_deref() == Some(uri.as_str()) {
                return self.engine.toggle(None).await;
            }
        }

        if !self.downloads.check_exists(key).await {
            return Err(PlaybackError::NotDownloaded {
                chapter_id,
                narrator_id,
            });
        }

        let source = AudioSource::local(self.downloads.local_path(key).await?);
        let uri = source.uri();
        *self.current.lock() = Some((key, uri));
        debug!("Loading chapter file");
        if let Err(e) = self.engine.load(source, true).await {
            *self.current.lock() = None;
            return Err(e);
        }
        Ok(())
    }

    /// Progress of the loaded chapter, `None` when another source (or
    /// nothing) is loaded.
    pub async fn progress(&self) -> Option<ChapterProgress> {
        let (key, uri) = self.current.lock().clone()?;
        let snapshot = self.engine.snapshot().await;
        if snapshot.uri.as_deref() != Some(uri.as_str()) {
            return None;
        }
        Some(ChapterProgress {
            chapter_id: key.chapter_id,
            is_playing: snapshot.state == EngineState::Playing,
            position: snapshot.position,
            duration: snapshot.duration,
        })
    }

    pub async fn stop(&self) {
        *self.current.lock() = None;
        self.engine.stop().await;
    }

    /// Forget the loaded chapter without touching the engine.
    pub fn clear(&self) {
        *self.current.lock() = None;
    }
}
