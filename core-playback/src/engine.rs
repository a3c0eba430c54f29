//! # Playback Engine
//!
//! Sole owner of the host's audio output device.
//!
//! ## State machine
//!
//! ```text
//! Empty -> Loading -> Playing <-> Paused -> Empty   (stop / finish)
//!             |
//!             +-> Error --(error display duration)--> Empty
//! ```
//!
//! At most one source is loaded at a time. `load` stops and releases the
//! previous session before the new one is prepared, and device status for a
//! released session is dropped: every session gets a [`SubscriptionToken`]
//! that is invalidated on release, and its forwarding task is aborted.
//!
//! A session reaching its natural end is reported as
//! [`PlaybackEvent::Completed`]. That event is the only trigger for
//! auto-advance; pause and stop never emit it.

use bridge_traits::playback::{
    status_channel, AudioSource, DeviceStatus, PlaybackAdapter, PlaybackRequest,
    PlaybackSessionId, StatusReceiver,
};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::{PlaybackError, Result};

/// Observable engine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Empty,
    Loading,
    Playing,
    Paused,
    /// Shown for the error display duration, then reverts to `Empty`.
    Error { message: String },
}

/// Handle guarding the status subscription of one session.
#[derive(Debug, Clone)]
pub struct SubscriptionToken {
    id: Uuid,
    valid: Arc<AtomicBool>,
}

impl SubscriptionToken {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            valid: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }
}

/// Point-in-time view of the engine for UI rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub state: EngineState,
    pub uri: Option<String>,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub looping: bool,
}

struct LoadedSource {
    load_id: u64,
    session: PlaybackSessionId,
    uri: String,
    token: SubscriptionToken,
    forwarder: Option<JoinHandle<()>>,
    started: bool,
    position: Duration,
    duration: Option<Duration>,
}

struct Inner {
    state: EngineState,
    loaded: Option<LoadedSource>,
    looping: bool,
    error_generation: u64,
    last_load_id: u64,
}

/// Single-stream playback over a [`PlaybackAdapter`].
///
/// Cheap to clone; clones share the device and state.
#[derive(Clone)]
pub struct PlaybackEngine {
    adapter: Arc<dyn PlaybackAdapter>,
    event_bus: EventBus,
    error_display_duration: Duration,
    inner: Arc<Mutex<Inner>>,
}

impl PlaybackEngine {
    pub fn new(
        adapter: Arc<dyn PlaybackAdapter>,
        event_bus: EventBus,
        error_display_duration: Duration,
    ) -> Self {
        Self {
            adapter,
            event_bus,
            error_display_duration,
            inner: Arc::new(Mutex::new(Inner {
                state: EngineState::Empty,
                loaded: None,
                looping: false,
                error_generation: 0,
                last_load_id: 0,
            })),
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.event_bus.emit(CoreEvent::Playback(event));
    }

    pub async fn state(&self) -> EngineState {
        self.inner.lock().await.state.clone()
    }

    pub async fn current_uri(&self) -> Option<String> {
        self.inner.lock().await.loaded.as_ref().map(|l| l.uri.clone())
    }

    /// Id returned by the [`load`](Self::load) that is still loaded.
    pub async fn current_load_id(&self) -> Option<u64> {
        self.inner.lock().await.loaded.as_ref().map(|l| l.load_id)
    }

    pub async fn is_playing(&self) -> bool {
        self.inner.lock().await.state == EngineState::Playing
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        let inner = self.inner.lock().await;
        EngineSnapshot {
            state: inner.state.clone(),
            uri: inner.loaded.as_ref().map(|l| l.uri.clone()),
            position: inner.loaded.as_ref().map(|l| l.position).unwrap_or_default(),
            duration: inner.loaded.as_ref().and_then(|l| l.duration),
            looping: inner.looping,
        }
    }

    /// Load `source`, releasing whatever was loaded before.
    ///
    /// Returns an id unique to this load; it is repeated in the
    /// [`PlaybackEvent::Completed`] for the source. On failure the engine is
    /// already in [`EngineState::Error`] when the `Err` is returned.
    #[instrument(skip(self, source), fields(uri = %source.uri()))]
    pub async fn load(&self, source: AudioSource, autoplay: bool) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        inner.last_load_id += 1;
        let load_id = inner.last_load_id;

        if let Some(previous) = inner.loaded.take() {
            self.release(previous).await;
        }

        let uri = source.uri();
        inner.state = EngineState::Loading;
        self.emit(PlaybackEvent::Loading { uri: uri.clone() });

        let token = SubscriptionToken::new();
        let (updates, receiver) = status_channel();
        let request = PlaybackRequest::new(source)
            .autoplay(autoplay)
            .looping(inner.looping);

        let session = match self.adapter.prepare(request, updates).await {
            Ok(session) => session,
            Err(e) => {
                let message = e.to_string();
                error!(error = %message, "Device could not open source");
                self.enter_error(&mut inner, Some(uri), message.clone());
                return Err(PlaybackError::Playback(message));
            }
        };

        let forwarder = self.spawn_forwarder(session, token.clone(), receiver);
        inner.loaded = Some(LoadedSource {
            load_id,
            session,
            uri: uri.clone(),
            token,
            forwarder: Some(forwarder),
            started: autoplay,
            position: Duration::ZERO,
            duration: None,
        });

        if autoplay {
            inner.state = EngineState::Playing;
            self.emit(PlaybackEvent::Started { uri });
        } else {
            inner.state = EngineState::Paused;
        }
        debug!(session = %session.as_uuid(), load_id, "Source loaded");
        Ok(load_id)
    }

    /// Start or resume the loaded source.
    pub async fn play(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.play_locked(&mut inner).await
    }

    async fn play_locked(&self, inner: &mut Inner) -> Result<()> {
        let Some((session, uri)) = inner.loaded.as_ref().map(|l| (l.session, l.uri.clone())) else {
            return Err(PlaybackError::NoSourceLoaded);
        };
        if inner.state == EngineState::Playing {
            return Ok(());
        }

        if let Err(e) = self.adapter.play(session).await {
            let message = e.to_string();
            if let Some(loaded) = inner.loaded.take() {
                self.release(loaded).await;
            }
            self.enter_error(inner, Some(uri), message.clone());
            return Err(PlaybackError::Playback(message));
        }

        let first = inner
            .loaded
            .as_mut()
            .map_or(false, |l| !std::mem::replace(&mut l.started, true));
        inner.state = EngineState::Playing;
        if first {
            self.emit(PlaybackEvent::Started { uri });
        } else {
            self.emit(PlaybackEvent::Resumed { uri });
        }
        Ok(())
    }

    /// Pause without unloading. No-op when nothing is playing.
    pub async fn pause(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.pause_locked(&mut inner).await
    }

    async fn pause_locked(&self, inner: &mut Inner) -> Result<()> {
        let Some(loaded) = inner.loaded.as_ref() else {
            return Ok(());
        };
        if inner.state != EngineState::Playing {
            return Ok(());
        }

        self.adapter
            .pause(loaded.session)
            .await
            .map_err(|e| PlaybackError::Playback(e.to_string()))?;
        let uri = loaded.uri.clone();
        inner.state = EngineState::Paused;
        self.emit(PlaybackEvent::Paused { uri });
        Ok(())
    }

    /// Pause if playing, play if paused.
    ///
    /// With nothing loaded, `source` is loaded and played; without one this
    /// fails with [`PlaybackError::NoSourceLoaded`]. A `source` different
    /// from the loaded one replaces it.
    pub async fn toggle(&self, source: Option<AudioSource>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let loaded_uri = inner.loaded.as_ref().map(|l| l.uri.clone());

        match (loaded_uri, source) {
            (Some(current), Some(source)) if current != source.uri() => {
                drop(inner);
                self.load(source, true).await.map(|_| ())
            }
            (Some(_), _) => {
                if inner.state == EngineState::Playing {
                    self.pause_locked(&mut inner).await
                } else {
                    self.play_locked(&mut inner).await
                }
            }
            (None, Some(source)) => {
                drop(inner);
                self.load(source, true).await.map(|_| ())
            }
            (None, None) => Err(PlaybackError::NoSourceLoaded),
        }
    }

    /// Stop and release the loaded source. Always leaves the engine `Empty`.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        let previous = inner.loaded.take();
        // Any pending error display is superseded.
        inner.error_generation += 1;
        inner.state = EngineState::Empty;

        if let Some(previous) = previous {
            let uri = previous.uri.clone();
            self.release(previous).await;
            self.emit(PlaybackEvent::Stopped { uri });
        }
    }

    /// When looping, the device restarts the source at its end and no
    /// completion is reported.
    pub async fn set_looping(&self, looping: bool) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.looping = looping;
        if let Some(loaded) = inner.loaded.as_ref() {
            self.adapter
                .set_looping(loaded.session, looping)
                .await
                .map_err(|e| PlaybackError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    pub async fn is_looping(&self) -> bool {
        self.inner.lock().await.looping
    }

    /// Release the device. Call when the hosting context is discarded.
    pub async fn teardown(&self) {
        info!("Tearing down playback engine");
        self.stop().await;
    }

    /// Invalidate the session's subscription, then stop and unload it.
    async fn release(&self, mut loaded: LoadedSource) {
        loaded.token.invalidate();
        if let Some(forwarder) = loaded.forwarder.take() {
            forwarder.abort();
        }
        if let Err(e) = self.adapter.stop(loaded.session).await {
            warn!(error = %e, "Device stop failed");
        }
        if let Err(e) = self.adapter.unload(loaded.session).await {
            warn!(error = %e, "Device unload failed");
        }
        debug!(session = %loaded.session.as_uuid(), "Released session");
    }

    fn enter_error(&self, inner: &mut Inner, uri: Option<String>, message: String) {
        inner.error_generation += 1;
        inner.state = EngineState::Error {
            message: message.clone(),
        };
        self.emit(PlaybackEvent::Error { uri, message });

        let generation = inner.error_generation;
        let engine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(engine.error_display_duration).await;
            let mut inner = engine.inner.lock().await;
            if inner.error_generation == generation
                && matches!(inner.state, EngineState::Error { .. })
            {
                inner.state = EngineState::Empty;
                engine.emit(PlaybackEvent::ErrorCleared);
            }
        });
    }

    fn spawn_forwarder(
        &self,
        session: PlaybackSessionId,
        token: SubscriptionToken,
        mut receiver: StatusReceiver,
    ) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            while let Some(update) = receiver.recv().await {
                if update.session != session || !token.is_valid() {
                    continue;
                }
                if engine.handle_status(session, &token, update.status).await {
                    break;
                }
            }
        })
    }

    /// Apply one device status. Returns `true` once the session has ended.
    async fn handle_status(
        &self,
        session: PlaybackSessionId,
        token: &SubscriptionToken,
        status: DeviceStatus,
    ) -> bool {
        let mut inner = self.inner.lock().await;
        // Checked under the lock: `load` and `stop` invalidate while holding it.
        if !token.is_valid() {
            return true;
        }

        match status {
            DeviceStatus::Loaded { duration } => {
                if let Some(loaded) = inner.loaded.as_mut() {
                    loaded.duration = duration;
                }
                false
            }
            DeviceStatus::Position { position, duration } => {
                let Some(loaded) = inner.loaded.as_mut() else {
                    return false;
                };
                loaded.position = position;
                if duration.is_some() {
                    loaded.duration = duration;
                }
                self.emit(PlaybackEvent::PositionChanged {
                    uri: loaded.uri.clone(),
                    position_ms: position.as_millis() as u64,
                    duration_ms: loaded.duration.map(|d| d.as_millis() as u64),
                });
                false
            }
            DeviceStatus::Finished => {
                if inner.looping {
                    return false;
                }
                let Some(mut finished) = inner.loaded.take() else {
                    return true;
                };
                finished.token.invalidate();
                // This task is the forwarder; detach rather than abort it.
                finished.forwarder.take();
                inner.state = EngineState::Empty;
                drop(inner);

                if let Err(e) = self.adapter.unload(session).await {
                    warn!(error = %e, "Device unload failed");
                }
                debug!(uri = %finished.uri, "Playback completed");
                self.emit(PlaybackEvent::Completed {
                    uri: finished.uri,
                    load_id: finished.load_id,
                });
                true
            }
            DeviceStatus::Failed { message } => {
                let Some(mut failed) = inner.loaded.take() else {
                    return true;
                };
                failed.token.invalidate();
                failed.forwarder.take();
                error!(error = %message, "Device reported playback failure");
                self.enter_error(&mut inner, Some(failed.uri), message);
                drop(inner);

                if let Err(e) = self.adapter.unload(session).await {
                    warn!(error = %e, "Device unload failed");
                }
                true
            }
        }
    }
}
