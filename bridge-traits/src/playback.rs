//! Playback bridge traits and supporting audio types.
//!
//! The host owns exactly one audio output device and exposes it through a
//! [`PlaybackAdapter`]. Each `prepare` call creates a new session; status
//! changes for that session (loaded, position ticks, finished, failure) are
//! pushed onto the [`StatusSender`] supplied with the request, tagged with the
//! session id so the core can discard updates from sessions it has already
//! released.

use crate::error::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// High-level audio source descriptor provided to playback adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Local file accessible to the host runtime.
    LocalFile { path: PathBuf },
    /// Remote HTTP(S) stream to be fetched by the host.
    RemoteStream {
        url: String,
        headers: HashMap<String, String>,
    },
}

impl AudioSource {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        AudioSource::LocalFile { path: path.into() }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        AudioSource::RemoteStream {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    /// Determine whether the source represents remote content.
    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSource::RemoteStream { .. })
    }

    /// URI form of the source, suitable for logging and comparison.
    pub fn uri(&self) -> String {
        match self {
            AudioSource::LocalFile { path } => format!("file://{}", path.display()),
            AudioSource::RemoteStream { url, .. } => url.clone(),
        }
    }
}

/// Request describing the session a host adapter should provision.
#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    pub source: AudioSource,
    /// Start playing as soon as the source is ready.
    pub autoplay: bool,
    /// Restart the source when it reaches the end instead of finishing.
    pub looping: bool,
    /// Optional display title surfaced to platform media sessions.
    pub title: Option<String>,
}

impl PlaybackRequest {
    pub fn new(source: AudioSource) -> Self {
        Self {
            source,
            autoplay: false,
            looping: false,
            title: None,
        }
    }

    pub fn autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Unique identifier for playback sessions managed by a host adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackSessionId(Uuid);

impl PlaybackSessionId {
    /// Generate a new session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlaybackSessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Status reported by the device for one session.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceStatus {
    /// The source opened successfully.
    Loaded { duration: Option<Duration> },
    /// Periodic position report while playing.
    Position {
        position: Duration,
        duration: Option<Duration>,
    },
    /// The source played to its end. Not sent for looping sessions.
    Finished,
    /// The device could not continue playing the source.
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatusUpdate {
    pub session: PlaybackSessionId,
    pub status: DeviceStatus,
}

pub type StatusSender = mpsc::UnboundedSender<DeviceStatusUpdate>;
pub type StatusReceiver = mpsc::UnboundedReceiver<DeviceStatusUpdate>;

/// Create the channel pair handed to [`PlaybackAdapter::prepare`].
pub fn status_channel() -> (StatusSender, StatusReceiver) {
    mpsc::unbounded_channel()
}

/// The single audio output device.
///
/// `prepare` must fail (rather than report `Failed` later) when the source
/// cannot be opened at all, e.g. an unreachable URL or unsupported codec.
#[async_trait::async_trait]
pub trait PlaybackAdapter: Send + Sync {
    /// Open `request.source` and return the new session id. Status updates
    /// for the session are sent on `updates` until it is unloaded.
    async fn prepare(
        &self,
        request: PlaybackRequest,
        updates: StatusSender,
    ) -> Result<PlaybackSessionId>;

    /// Begin or resume playback for the provided session.
    async fn play(&self, session: PlaybackSessionId) -> Result<()>;

    /// Pause playback without releasing the session.
    async fn pause(&self, session: PlaybackSessionId) -> Result<()>;

    /// Stop playback and rewind to the start.
    async fn stop(&self, session: PlaybackSessionId) -> Result<()>;

    async fn set_looping(&self, session: PlaybackSessionId, looping: bool) -> Result<()>;

    /// Query the current playback position.
    async fn get_position(&self, session: PlaybackSessionId) -> Result<Duration>;

    /// Release the device handle associated with a session.
    async fn unload(&self, session: PlaybackSessionId) -> Result<()>;
}
