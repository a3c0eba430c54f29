//! # Download Manager
//!
//! Drives chapter recitation downloads keyed by `(chapter, narrator)`.
//!
//! Each key moves through `Idle -> Downloading -> {Complete | Error}`, and
//! `Error -> Downloading` on retry. At most one transfer per key is in flight;
//! a second request while one runs is rejected, not queued.
//!
//! Whether a file is present on disk is answered separately by
//! [`DownloadManager::check_exists`], which stats the expected path and never
//! consults the state machine. That lets a cold process recognise files
//! downloaded in an earlier session.

use bridge_traits::{
    error::BridgeError,
    storage::FileSystemAccess,
    transfer::{FileTransfer, ProgressCallback, TransferProgress, TransferRequest},
};
use core_content::{AssetResolver, ContentError, VerseKey};
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use core_runtime::logging::strip_path;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{PlaybackError, Result};

/// Composite key of a chapter recitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DownloadKey {
    pub chapter_id: u32,
    pub narrator_id: u32,
}

impl DownloadKey {
    pub fn new(chapter_id: u32, narrator_id: u32) -> Self {
        Self {
            chapter_id,
            narrator_id,
        }
    }

    /// File name under the audio directory.
    pub fn file_name(&self) -> String {
        format!("chapter_{}_recitor_{}.mp3", self.chapter_id, self.narrator_id)
    }
}

/// Why a download ended in the error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Transport failure; worth retrying.
    Network,
    /// The narrator has no recording of this chapter.
    NotFound,
    /// The descriptor lacked a usable URL or size.
    InvalidDescriptor,
    /// Local disk failure.
    Io,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl DownloadFailure {
    /// `NotFound` is shown as "unavailable" with no retry affordance.
    pub fn is_retryable(&self) -> bool {
        self.kind != FailureKind::NotFound
    }

    fn from_content(error: &ContentError) -> Self {
        let kind = match error {
            ContentError::NotFound(_) => FailureKind::NotFound,
            ContentError::Parse(_) | ContentError::InvalidVerseKey(_) => {
                FailureKind::InvalidDescriptor
            }
            ContentError::Network(_) => FailureKind::Network,
            ContentError::Bridge(e) if e.is_local_io() => FailureKind::Io,
            ContentError::Bridge(_) => FailureKind::Network,
        };
        Self {
            kind,
            message: error.to_string(),
        }
    }

    fn from_bridge(error: &BridgeError) -> Self {
        let kind = if error.is_local_io() {
            FailureKind::Io
        } else {
            FailureKind::Network
        };
        Self {
            kind,
            message: error.to_string(),
        }
    }
}

/// State of one key.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadState {
    Idle,
    /// `progress` is in `0.0..=1.0`.
    Downloading { progress: f64 },
    /// Progress is cleared; the failure stays visible until retried.
    Error { failure: DownloadFailure },
    Complete { path: PathBuf },
}

impl DownloadState {
    pub fn is_downloading(&self) -> bool {
        matches!(self, DownloadState::Downloading { .. })
    }

    pub fn progress(&self) -> Option<f64> {
        match self {
            DownloadState::Downloading { progress } => Some(*progress),
            _ => None,
        }
    }
}

/// Result of [`DownloadManager::start_download`].
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    Completed { path: PathBuf },
    /// A transfer for the key was already running.
    Rejected,
    Failed { failure: DownloadFailure },
    /// The key was reset while the transfer ran; the result is not recorded.
    Discarded,
}

/// Result of [`DownloadManager::download_verse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerseDownload {
    Saved { path: PathBuf },
    AlreadyDownloaded { path: PathBuf },
    /// The same verse is being saved by an earlier call.
    InProgress,
}

/// Removes a key from an in-flight set when dropped.
struct InFlight<'a, K: Eq + Hash + Copy> {
    set: &'a Mutex<HashSet<K>>,
    key: K,
}

impl<'a, K: Eq + Hash + Copy> InFlight<'a, K> {
    fn acquire(set: &'a Mutex<HashSet<K>>, key: K) -> Option<Self> {
        set.lock().insert(key).then(|| Self { set, key })
    }
}

impl<K: Eq + Hash + Copy> Drop for InFlight<'_, K> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.key);
    }
}

type Records = Arc<Mutex<HashMap<DownloadKey, DownloadState>>>;

/// Chapter download orchestration.
///
/// Share behind `Arc` and call [`start_download`](Self::start_download) from
/// a spawned task; progress arrives on the event bus.
pub struct DownloadManager {
    resolver: Arc<AssetResolver>,
    transfer: Arc<dyn FileTransfer>,
    fs: Arc<dyn FileSystemAccess>,
    audio_directory: String,
    event_bus: Option<EventBus>,
    records: Records,
    in_flight: Mutex<HashSet<DownloadKey>>,
    verses_in_flight: Mutex<HashSet<VerseKey>>,
    existence: Mutex<HashMap<DownloadKey, bool>>,
}

impl DownloadManager {
    pub fn new(
        resolver: Arc<AssetResolver>,
        transfer: Arc<dyn FileTransfer>,
        fs: Arc<dyn FileSystemAccess>,
        audio_directory: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            transfer,
            fs,
            audio_directory: audio_directory.into(),
            event_bus: None,
            records: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Mutex::new(HashSet::new()),
            verses_in_flight: Mutex::new(HashSet::new()),
            existence: Mutex::new(HashMap::new()),
        }
    }

    /// Set event bus for progress events.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Download(event));
        }
    }

    /// Current state of `key`; `Idle` when nothing has been recorded.
    pub fn state(&self, key: DownloadKey) -> DownloadState {
        self.records
            .lock()
            .get(&key)
            .cloned()
            .unwrap_or(DownloadState::Idle)
    }

    pub fn is_in_flight(&self, key: DownloadKey) -> bool {
        self.in_flight.lock().contains(&key)
    }

    async fn audio_dir(&self) -> Result<PathBuf> {
        let data_dir = self.fs.get_data_directory().await?;
        Ok(data_dir.join(&self.audio_directory))
    }

    /// Expected location of the chapter file, whether or not it exists.
    pub async fn local_path(&self, key: DownloadKey) -> Result<PathBuf> {
        Ok(self.audio_dir().await?.join(key.file_name()))
    }

    /// Expected location of a saved verse.
    pub async fn verse_path(&self, verse: VerseKey) -> Result<PathBuf> {
        Ok(self
            .audio_dir()
            .await?
            .join(format!("verse_{}_{}.mp3", verse.chapter, verse.verse)))
    }

    /// Download the chapter recitation for `key`.
    ///
    /// Never fails: every error is recorded as [`DownloadState::Error`] and
    /// returned as [`DownloadOutcome::Failed`].
    #[instrument(skip(self), fields(chapter = key.chapter_id, narrator = key.narrator_id))]
    pub async fn start_download(&self, key: DownloadKey) -> DownloadOutcome {
        let Some(_guard) = InFlight::acquire(&self.in_flight, key) else {
            warn!("Download already in progress");
            self.emit(DownloadEvent::Rejected {
                chapter_id: key.chapter_id,
                narrator_id: key.narrator_id,
            });
            return DownloadOutcome::Rejected;
        };

        self.records
            .lock()
            .insert(key, DownloadState::Downloading { progress: 0.0 });
        self.emit(DownloadEvent::Started {
            chapter_id: key.chapter_id,
            narrator_id: key.narrator_id,
        });

        let descriptor = match self
            .resolver
            .resolve_chapter_audio(key.chapter_id, key.narrator_id)
            .await
        {
            Ok(descriptor) => descriptor,
            Err(e) => return self.fail(key, DownloadFailure::from_content(&e)),
        };

        let directory = match self.audio_dir().await {
            Ok(dir) => dir,
            Err(e) => return self.fail(key, Self::io_failure(&e)),
        };
        if let Err(e) = self.fs.create_dir_all(&directory).await {
            return self.fail(key, DownloadFailure::from_bridge(&e));
        }
        let destination = directory.join(key.file_name());

        info!(url = %descriptor.url, bytes = descriptor.byte_size, "Starting download");
        let request = TransferRequest::new(&descriptor.url, &destination);
        let on_progress = self.progress_callback(key, descriptor.byte_size);

        match self.transfer.download(request, on_progress).await {
            Ok(outcome) => self.complete(key, outcome.path),
            Err(e) => {
                error!(error = %e, "Download failed");
                self.fail(key, DownloadFailure::from_bridge(&e))
            }
        }
    }

    fn progress_callback(&self, key: DownloadKey, expected: u64) -> ProgressCallback {
        let records = Arc::clone(&self.records);
        let bus = self.event_bus.clone();
        Arc::new(move |progress: TransferProgress| {
            let fraction = progress.fraction_of(expected);
            {
                let mut records = records.lock();
                match records.get_mut(&key) {
                    Some(DownloadState::Downloading { progress }) => *progress = fraction,
                    // Reset while running; nothing is displayed for it anymore.
                    _ => return,
                }
            }
            if let Some(bus) = &bus {
                let _ = bus.emit(CoreEvent::Download(DownloadEvent::Progress {
                    chapter_id: key.chapter_id,
                    narrator_id: key.narrator_id,
                    fraction,
                }));
            }
        })
    }

    fn complete(&self, key: DownloadKey, path: PathBuf) -> DownloadOutcome {
        {
            let mut records = self.records.lock();
            match records.get_mut(&key) {
                Some(state @ DownloadState::Downloading { .. }) => {
                    *state = DownloadState::Complete { path: path.clone() };
                }
                _ => {
                    debug!("Discarding completion for reset key");
                    self.existence.lock().remove(&key);
                    return DownloadOutcome::Discarded;
                }
            }
        }

        self.existence.lock().insert(key, true);
        info!(file = %strip_path(&path.to_string_lossy()), "Download completed");
        self.emit(DownloadEvent::Completed {
            chapter_id: key.chapter_id,
            narrator_id: key.narrator_id,
            path: path.display().to_string(),
        });
        DownloadOutcome::Completed { path }
    }

    fn fail(&self, key: DownloadKey, failure: DownloadFailure) -> DownloadOutcome {
        {
            let mut records = self.records.lock();
            match records.get_mut(&key) {
                Some(state @ DownloadState::Downloading { .. }) => {
                    *state = DownloadState::Error {
                        failure: failure.clone(),
                    };
                }
                _ => {
                    debug!(error = %failure.message, "Discarding failure for reset key");
                    return DownloadOutcome::Discarded;
                }
            }
        }

        warn!(kind = ?failure.kind, error = %failure.message, "Download entered error state");
        self.emit(DownloadEvent::Failed {
            chapter_id: key.chapter_id,
            narrator_id: key.narrator_id,
            message: failure.message.clone(),
            retryable: failure.is_retryable(),
        });
        DownloadOutcome::Failed { failure }
    }

    fn io_failure(error: &PlaybackError) -> DownloadFailure {
        DownloadFailure {
            kind: FailureKind::Io,
            message: error.to_string(),
        }
    }

    /// Whether the chapter file is present on disk.
    ///
    /// Answers from the existence cache when possible; otherwise stats the
    /// expected path and caches the answer.
    pub async fn check_exists(&self, key: DownloadKey) -> bool {
        if let Some(exists) = self.existence.lock().get(&key).copied() {
            return exists;
        }

        let exists = match self.local_path(key).await {
            Ok(path) => match self.fs.exists(&path).await {
                Ok(exists) => exists,
                Err(e) => {
                    warn!(error = %e, "Existence check failed");
                    return false;
                }
            },
            Err(e) => {
                warn!(error = %e, "Could not resolve audio directory");
                return false;
            }
        };

        self.existence.lock().insert(key, exists);
        exists
    }

    /// Forget every cached existence answer.
    pub fn invalidate_existence(&self) {
        self.existence.lock().clear();
    }

    /// Clear per-key state for `narrator_id` back to idle. Files on disk are
    /// kept, and transfers still running are left to finish.
    ///
    /// Returns the number of records cleared.
    #[instrument(skip(self))]
    pub fn reset_narrator(&self, narrator_id: u32) -> usize {
        let cleared = {
            let mut records = self.records.lock();
            let before = records.len();
            records.retain(|key, _| key.narrator_id != narrator_id);
            before - records.len()
        };
        self.existence
            .lock()
            .retain(|key, _| key.narrator_id != narrator_id);

        debug!(cleared, "Reset download state");
        self.emit(DownloadEvent::Reset {
            narrator_id,
            cleared,
        });
        cleared
    }

    /// Save a single verse recitation next to the chapter files.
    #[instrument(skip(self, url), fields(verse = %verse))]
    pub async fn download_verse(&self, verse: VerseKey, url: &str) -> Result<VerseDownload> {
        let Some(_guard) = InFlight::acquire(&self.verses_in_flight, verse) else {
            warn!("Verse download already in progress");
            return Ok(VerseDownload::InProgress);
        };

        let directory = self.audio_dir().await?;
        self.fs.create_dir_all(&directory).await?;
        let path = self.verse_path(verse).await?;

        if self.fs.exists(&path).await? {
            debug!("Verse already downloaded");
            return Ok(VerseDownload::AlreadyDownloaded { path });
        }

        let noop: ProgressCallback = Arc::new(|_| {});
        let outcome = self
            .transfer
            .download(TransferRequest::new(url, &path), noop)
            .await
            .map_err(|e| match e {
                BridgeError::Io(io) => PlaybackError::Io {
                    path: path.clone(),
                    message: io.to_string(),
                },
                other => PlaybackError::Bridge(other),
            })?;

        self.emit(DownloadEvent::VerseSaved {
            verse_key: verse.to_string(),
            path: outcome.path.display().to_string(),
        });
        Ok(VerseDownload::Saved { path: outcome.path })
    }
}
