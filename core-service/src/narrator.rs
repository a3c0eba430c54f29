//! # Narrator Selection
//!
//! The selected narrator scopes every download key and every verse audio
//! URL, so changing it fans out to the playback components before the new
//! selection becomes visible:
//!
//! 1. per-key download state of the previous narrator is reset
//! 2. the engine is stopped and its source released
//! 3. cached existence answers are dropped
//! 4. the verse window is reset, since its audio annotations belong to the
//!    previous narrator
//!
//! The selection is persisted under [`SELECTED_NARRATOR_KEY`] first; if that
//! fails nothing is invalidated and the previous selection stays. The
//! fan-out runs while the selection lock is held, so no later operation can
//! observe the new narrator together with stale narrator-scoped state.

use bridge_traits::storage::SettingsStore;
use core_content::{ContentApi, Narrator, VerseWindow};
use core_playback::{ChapterPlayer, DownloadManager, VerseSequencer};
use core_runtime::events::{CoreEvent, EventBus, NarratorEvent};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{CoreError, Result};

/// Settings key of the persisted selection (JSON-encoded [`Narrator`]).
pub const SELECTED_NARRATOR_KEY: &str = "selectedNarrator";

/// Components whose state depends on the selected narrator.
#[derive(Clone)]
pub struct NarratorScope {
    pub downloads: Arc<DownloadManager>,
    pub sequencer: Arc<VerseSequencer>,
    pub chapters: Arc<ChapterPlayer>,
    pub window: Arc<RwLock<VerseWindow>>,
}

#[derive(Default)]
struct SelectionState {
    selected: Option<Narrator>,
    catalog: Option<Vec<Narrator>>,
}

/// Session-wide narrator selection and catalog.
pub struct NarratorSelection {
    settings: Arc<dyn SettingsStore>,
    scope: NarratorScope,
    event_bus: EventBus,
    default_narrator_id: u32,
    state: Mutex<SelectionState>,
}

impl NarratorSelection {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        scope: NarratorScope,
        event_bus: EventBus,
        default_narrator_id: u32,
    ) -> Self {
        Self {
            settings,
            scope,
            event_bus,
            default_narrator_id,
            state: Mutex::new(SelectionState::default()),
        }
    }

    fn emit(&self, event: NarratorEvent) {
        let _ = self.event_bus.emit(CoreEvent::Narrator(event));
    }

    /// Load the persisted selection. A stored value that cannot be decoded is
    /// removed and treated as no selection.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<Option<Narrator>> {
        let stored = self.settings.get_string(SELECTED_NARRATOR_KEY).await?;
        let narrator = match stored {
            None => None,
            Some(json) => match serde_json::from_str::<Narrator>(&json) {
                Ok(narrator) => Some(narrator),
                Err(e) => {
                    warn!(error = %e, "Discarding malformed stored narrator");
                    self.settings.delete(SELECTED_NARRATOR_KEY).await?;
                    None
                }
            },
        };

        if let Some(narrator) = &narrator {
            info!(narrator = narrator.id, "Restored narrator selection");
        }
        self.state.lock().await.selected = narrator.clone();
        Ok(narrator)
    }

    pub async fn selected(&self) -> Option<Narrator> {
        self.state.lock().await.selected.clone()
    }

    /// Narrator whose recordings are used, falling back to the configured
    /// default while nothing is selected.
    pub async fn selected_narrator_id(&self) -> u32 {
        self.state
            .lock()
            .await
            .selected
            .as_ref()
            .map_or(self.default_narrator_id, |n| n.id)
    }

    /// The cached catalog, if it has been loaded this session.
    pub async fn catalog(&self) -> Option<Vec<Narrator>> {
        self.state.lock().await.catalog.clone()
    }

    /// Select `narrator`. Selecting the current narrator again is a no-op.
    ///
    /// Returns whether the selection changed.
    #[instrument(skip(self, narrator), fields(narrator = narrator.id))]
    pub async fn set_selected_narrator(&self, narrator: Narrator) -> Result<bool> {
        let mut state = self.state.lock().await;
        let previous = state.selected.as_ref().map(|n| n.id);
        if previous == Some(narrator.id) {
            debug!("Narrator already selected");
            return Ok(false);
        }

        let json = serde_json::to_string(&narrator)?;
        self.settings.set_string(SELECTED_NARRATOR_KEY, &json).await?;

        let previous_effective = previous.unwrap_or(self.default_narrator_id);
        self.invalidate(previous_effective, narrator.id).await;
        state.selected = Some(narrator.clone());
        drop(state);

        info!(previous = ?previous, "Narrator selection changed");
        self.emit(NarratorEvent::SelectionChanged {
            previous,
            current: narrator.id,
        });
        Ok(true)
    }

    /// Select a narrator from the loaded catalog by id.
    pub async fn set_selected_narrator_id(&self, narrator_id: u32) -> Result<bool> {
        let narrator = self
            .state
            .lock()
            .await
            .catalog
            .as_ref()
            .and_then(|catalog| catalog.iter().find(|n| n.id == narrator_id).cloned())
            .ok_or(CoreError::UnknownNarrator(narrator_id))?;
        self.set_selected_narrator(narrator).await
    }

    /// Replace the catalog. The selection is kept unless it is missing from
    /// `narrators`, in which case it is cleared.
    #[instrument(skip(self, narrators), fields(count = narrators.len()))]
    pub async fn set_recitations(&self, narrators: Vec<Narrator>) -> Result<()> {
        let mut state = self.state.lock().await;
        let count = narrators.len();

        let dropped = state
            .selected
            .as_ref()
            .filter(|selected| !narrators.iter().any(|n| n.id == selected.id))
            .map(|selected| selected.id);
        if dropped.is_some() {
            self.settings.delete(SELECTED_NARRATOR_KEY).await?;
        }
        state.catalog = Some(narrators);

        if let Some(previous) = dropped {
            if previous != self.default_narrator_id {
                self.invalidate(previous, self.default_narrator_id).await;
            }
            state.selected = None;
            warn!(previous, "Selected narrator left the catalog; selection cleared");
            self.emit(NarratorEvent::SelectionCleared { previous });
        }
        drop(state);

        self.emit(NarratorEvent::CatalogLoaded { count });
        Ok(())
    }

    /// The narrator catalog, fetched once per session.
    pub async fn load_catalog(&self, api: &dyn ContentApi) -> Result<Vec<Narrator>> {
        if let Some(catalog) = self.catalog().await {
            return Ok(catalog);
        }
        let narrators = api.fetch_narrators().await?;
        self.set_recitations(narrators.clone()).await?;
        Ok(narrators)
    }

    async fn invalidate(&self, previous: u32, next: u32) {
        let scope = &self.scope;
        let cleared = scope.downloads.reset_narrator(previous);

        scope.sequencer.clear();
        scope.chapters.clear();
        // Shared engine; stopping through the sequencer covers chapter playback too.
        scope.sequencer.stop().await;

        scope.downloads.invalidate_existence();
        {
            let mut window = scope.window.write();
            let chapter = window.chapter_id();
            window.reset(chapter, Some(next));
        }
        debug!(previous, next, cleared, "Invalidated narrator-scoped state");
    }
}
