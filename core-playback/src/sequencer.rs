//! # Verse Sequencer
//!
//! Decides what plays after a verse finishes.
//!
//! [`advance`] and [`previous`] are pure lookups over the materialized
//! [`VerseWindow`]: the neighbour is computed numerically within the same
//! chapter and returned only if it has already been paginated in. Reaching
//! the edge of the window during auto-play stops playback; no page is
//! fetched speculatively.
//!
//! [`VerseSequencer`] drives the engine: it listens for
//! [`PlaybackEvent::Completed`] on the event bus and loads the next verse
//! while auto-advance is on. Completions are matched by load id, never by
//! URI: replaying the same verse must not inherit the previous run's
//! completion.

use bridge_traits::playback::AudioSource;
use core_content::{AssetResolver, VerseKey, VerseWindow};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, RecvError};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::engine::{EngineState, PlaybackEngine};
use crate::error::{PlaybackError, Result};

/// Next verse of the same chapter, if it is in the window.
pub fn advance(window: &VerseWindow, current: &VerseKey) -> Option<VerseKey> {
    current.next().filter(|key| window.contains(key))
}

/// Preceding verse of the same chapter, if it is in the window. Never
/// crosses into the previous chapter.
pub fn previous(window: &VerseWindow, current: &VerseKey) -> Option<VerseKey> {
    current.previous().filter(|key| window.contains(key))
}

/// String-keyed form of [`advance`]; malformed keys have no successor.
pub fn advance_key(window: &VerseWindow, current: &str) -> Option<VerseKey> {
    current.parse().ok().and_then(|key| advance(window, &key))
}

/// String-keyed form of [`previous`].
pub fn previous_key(window: &VerseWindow, current: &str) -> Option<VerseKey> {
    current.parse().ok().and_then(|key| previous(window, &key))
}

/// What happened when a verse was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    Playing { key: VerseKey, uri: String },
    /// The verse has no recording for the current narrator; nothing was loaded.
    Unavailable { key: VerseKey },
}

#[derive(Debug, Clone)]
struct ActiveUnit {
    key: VerseKey,
    uri: String,
    /// Set once the engine accepted the source.
    load_id: Option<u64>,
}

#[derive(Debug, Default)]
struct SequencerState {
    active: Option<ActiveUnit>,
    auto_advance: bool,
}

/// Auto-advancing verse playback over a shared window.
pub struct VerseSequencer {
    engine: PlaybackEngine,
    resolver: Arc<AssetResolver>,
    window: Arc<RwLock<VerseWindow>>,
    event_bus: EventBus,
    state: Mutex<SequencerState>,
    /// Held from `engine.load` until its id is recorded, so a completion is
    /// never checked against a half-recorded unit.
    load_gate: AsyncMutex<()>,
}

impl VerseSequencer {
    pub fn new(
        engine: PlaybackEngine,
        resolver: Arc<AssetResolver>,
        window: Arc<RwLock<VerseWindow>>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            engine,
            resolver,
            window,
            event_bus,
            state: Mutex::new(SequencerState::default()),
            load_gate: AsyncMutex::new(()),
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.event_bus.emit(CoreEvent::Playback(event));
    }

    pub fn window(&self) -> &Arc<RwLock<VerseWindow>> {
        &self.window
    }

    /// Verse currently active, i.e. highlighted and scrolled into view.
    pub fn active_key(&self) -> Option<VerseKey> {
        self.state.lock().active.as_ref().map(|a| a.key)
    }

    pub fn is_auto_advancing(&self) -> bool {
        self.state.lock().auto_advance
    }

    /// Play `key` from the window and turn auto-advance on.
    #[instrument(skip(self), fields(verse = %key))]
    pub async fn play_verse(&self, key: VerseKey) -> Result<PlayOutcome> {
        let url = {
            let window = self.window.read();
            let verse = window
                .get(&key)
                .ok_or_else(|| PlaybackError::VerseNotLoaded(key.to_string()))?;
            self.resolver.resolve_verse_audio_url(verse)
        };

        let Some(url) = url else {
            debug!("Verse has no audio");
            return Ok(PlayOutcome::Unavailable { key });
        };

        let source = AudioSource::remote(url);
        let uri = source.uri();
        let _gate = self.load_gate.lock().await;
        {
            let mut state = self.state.lock();
            state.active = Some(ActiveUnit {
                key,
                uri: uri.clone(),
                load_id: None,
            });
            state.auto_advance = true;
        }
        self.emit(PlaybackEvent::ActiveUnitChanged {
            key: key.to_string(),
        });

        match self.engine.load(source, true).await {
            Ok(load_id) => {
                if let Some(active) = self.state.lock().active.as_mut() {
                    if active.key == key && active.load_id.is_none() {
                        active.load_id = Some(load_id);
                    }
                }
                Ok(PlayOutcome::Playing { key, uri })
            }
            Err(e) => {
                self.clear();
                Err(e)
            }
        }
    }

    /// Play/pause control of a verse row.
    ///
    /// On the active verse this pauses or resumes; pausing turns auto-advance
    /// off so a later completion does not move on. Any other verse starts
    /// playing.
    pub async fn toggle_verse(&self, key: VerseKey) -> Result<PlayOutcome> {
        let active = self.state.lock().active.clone();
        let loaded = self.engine.current_load_id().await;

        match active {
            Some(active) if active.key == key && loaded.is_some() && active.load_id == loaded => {
                let resume = self.engine.state().await != EngineState::Playing;
                self.engine.toggle(None).await?;
                self.state.lock().auto_advance = resume;
                Ok(PlayOutcome::Playing {
                    key,
                    uri: active.uri,
                })
            }
            _ => self.play_verse(key).await,
        }
    }

    /// Play the verse after the active one, if it is in the window.
    pub async fn skip_next(&self) -> Result<Option<PlayOutcome>> {
        let Some(current) = self.active_key() else {
            return Ok(None);
        };
        let next = advance(&self.window.read(), &current);
        match next {
            Some(key) => self.play_verse(key).await.map(Some),
            None => Ok(None),
        }
    }

    /// Play the verse before the active one, if it is in the window.
    pub async fn skip_previous(&self) -> Result<Option<PlayOutcome>> {
        let Some(current) = self.active_key() else {
            return Ok(None);
        };
        let prev = previous(&self.window.read(), &current);
        match prev {
            Some(key) => self.play_verse(key).await.map(Some),
            None => Ok(None),
        }
    }

    /// Propagated to the device; suppresses auto-advance while on.
    pub async fn set_looping(&self, looping: bool) -> Result<()> {
        self.engine.set_looping(looping).await
    }

    /// Stop playback and forget the active verse.
    pub async fn stop(&self) {
        self.clear();
        self.engine.stop().await;
    }

    /// Forget the active verse without touching the engine.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.active = None;
        state.auto_advance = false;
    }

    /// React to the source of `load_id` finishing.
    ///
    /// Completions for any load but the active verse's are stale and ignored.
    #[instrument(skip(self))]
    pub async fn on_completed(&self, load_id: u64) -> Result<Option<VerseKey>> {
        let (current, auto_advance) = {
            let _gate = self.load_gate.lock().await;
            let state = self.state.lock();
            match state.active.as_ref() {
                Some(active) if active.load_id == Some(load_id) => {
                    (active.key, state.auto_advance)
                }
                _ => {
                    debug!("Ignoring stale completion");
                    return Ok(None);
                }
            }
        };

        if !auto_advance || self.engine.is_looping().await {
            return Ok(None);
        }

        let mut candidate = advance(&self.window.read(), &current);
        while let Some(key) = candidate {
            match self.play_verse(key).await? {
                PlayOutcome::Playing { key, .. } => return Ok(Some(key)),
                PlayOutcome::Unavailable { key } => {
                    debug!(verse = %key, "Skipping verse without audio");
                    candidate = advance(&self.window.read(), &key);
                }
            }
        }

        info!(last = %current, "Reached edge of loaded verses, stopping auto-advance");
        self.clear();
        self.engine.stop().await;
        self.emit(PlaybackEvent::AutoAdvanceStopped {
            last_key: current.to_string(),
        });
        Ok(None)
    }

    /// Subscribe to completions and advance until the bus closes.
    ///
    /// The subscription exists before this returns.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.event_bus.subscribe();
        let sequencer = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(CoreEvent::Playback(PlaybackEvent::Completed { load_id, .. })) => {
                        if let Err(e) = sequencer.on_completed(load_id).await {
                            warn!(error = %e, "Auto-advance failed");
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Sequencer lagged behind event bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
