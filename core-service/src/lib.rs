//! Core service façade and bootstrap helpers.
//!
//! [`CoreService`] is the explicitly constructed application context: it owns
//! the event bus, the content API client, the download manager, the single
//! playback engine and the narrator selection, wired from a
//! [`CoreConfig`]. Hosts create one at startup and call
//! [`CoreService::shutdown`] when the context is discarded.
//!
//! Desktop apps typically enable the `desktop-shims` feature, which lets the
//! config builder fill in the HTTP, filesystem, transfer and settings bridges.

pub mod error;
pub mod narrator;

pub use error::{CoreError, Result};
pub use narrator::{NarratorScope, NarratorSelection, SELECTED_NARRATOR_KEY};

use std::sync::Arc;

use core_content::{
    load_next_page, AssetResolver, Chapter, ChapterInfo, ContentApi, Narrator, QuranApiClient,
    Verse, VerseKey, VerseWindow,
};
use core_playback::{
    ChapterPlayer, ChapterProgress, DownloadKey, DownloadManager, DownloadOutcome, DownloadState,
    PlayOutcome, PlaybackEngine, VerseDownload, VerseSequencer,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Primary façade exposed to host applications.
pub struct CoreService {
    config: CoreConfig,
    event_bus: EventBus,
    api: Arc<dyn ContentApi>,
    resolver: Arc<AssetResolver>,
    downloads: Arc<DownloadManager>,
    engine: PlaybackEngine,
    sequencer: Arc<VerseSequencer>,
    chapters: Arc<ChapterPlayer>,
    window: Arc<RwLock<VerseWindow>>,
    narrators: NarratorSelection,
    auto_advance: Mutex<Option<JoinHandle<()>>>,
}

impl CoreService {
    /// Wire every component from `config`, restore the persisted narrator
    /// and start listening for completions.
    ///
    /// Must be called within a Tokio runtime.
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        let api: Arc<dyn ContentApi> = Arc::new(QuranApiClient::from_config(&config));
        Self::with_api(config, api).await
    }

    /// Like [`bootstrap`](Self::bootstrap) with a custom content API.
    #[instrument(skip_all)]
    pub async fn with_api(config: CoreConfig, api: Arc<dyn ContentApi>) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let resolver = Arc::new(AssetResolver::new(
            Arc::clone(&api),
            config.verse_audio_host.clone(),
        ));
        let downloads = Arc::new(
            DownloadManager::new(
                Arc::clone(&resolver),
                Arc::clone(&config.file_transfer),
                Arc::clone(&config.file_system),
                config.audio_directory.clone(),
            )
            .with_event_bus(event_bus.clone()),
        );
        let engine = PlaybackEngine::new(
            Arc::clone(&config.playback_adapter),
            event_bus.clone(),
            config.error_display_duration,
        );
        let window = Arc::new(RwLock::new(VerseWindow::new(1, Some(config.default_narrator_id))));
        let sequencer = Arc::new(VerseSequencer::new(
            engine.clone(),
            Arc::clone(&resolver),
            Arc::clone(&window),
            event_bus.clone(),
        ));
        let chapters = Arc::new(ChapterPlayer::new(engine.clone(), Arc::clone(&downloads)));

        let narrators = NarratorSelection::new(
            Arc::clone(&config.settings_store),
            NarratorScope {
                downloads: Arc::clone(&downloads),
                sequencer: Arc::clone(&sequencer),
                chapters: Arc::clone(&chapters),
                window: Arc::clone(&window),
            },
            event_bus.clone(),
            config.default_narrator_id,
        );
        let restored = narrators.restore().await?;
        if let Some(narrator) = &restored {
            window.write().reset(1, Some(narrator.id));
        }

        let auto_advance = sequencer.spawn();
        info!(
            narrator = restored.as_ref().map(|n| n.id),
            "Core service ready"
        );

        Ok(Self {
            config,
            event_bus,
            api,
            resolver,
            downloads,
            engine,
            sequencer,
            chapters,
            window,
            narrators,
            auto_advance: Mutex::new(Some(auto_advance)),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Subscribe to playback, download and narrator events.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn downloads(&self) -> &Arc<DownloadManager> {
        &self.downloads
    }

    pub fn sequencer(&self) -> &Arc<VerseSequencer> {
        &self.sequencer
    }

    pub fn chapters(&self) -> &Arc<ChapterPlayer> {
        &self.chapters
    }

    pub fn resolver(&self) -> &Arc<AssetResolver> {
        &self.resolver
    }

    pub fn narrators(&self) -> &NarratorSelection {
        &self.narrators
    }

    // ========================================================================
    // Content
    // ========================================================================

    pub async fn chapter_list(&self) -> Result<Vec<Chapter>> {
        Ok(self.api.fetch_chapters().await?)
    }

    pub async fn chapter_info(&self, chapter_id: u32) -> Result<ChapterInfo> {
        Ok(self.api.fetch_chapter_info(chapter_id).await?)
    }

    pub async fn random_verse(&self) -> Result<Verse> {
        Ok(self.api.fetch_random_verse().await?)
    }

    /// Narrator catalog, fetched on first use.
    pub async fn narrator_catalog(&self) -> Result<Vec<Narrator>> {
        self.narrators.load_catalog(self.api.as_ref()).await
    }

    /// Show `chapter_id`: playback of the previous chapter's verses stops, the
    /// window restarts at the first page and that page is fetched.
    #[instrument(skip(self))]
    pub async fn open_chapter(&self, chapter_id: u32) -> Result<usize> {
        let narrator = self.narrators.selected_narrator_id().await;
        let switching = self.window.read().chapter_id() != chapter_id;
        if switching {
            self.sequencer.stop().await;
        }
        self.window.write().reset(chapter_id, Some(narrator));
        self.load_more_verses().await
    }

    /// Fetch the next page of the open chapter. Zero when everything is loaded.
    pub async fn load_more_verses(&self) -> Result<usize> {
        Ok(load_next_page(&self.window, self.api.as_ref()).await?)
    }

    /// Loaded verses matching `query`, all of them for an empty query.
    pub fn search_verses(&self, query: &str) -> Vec<Verse> {
        self.window
            .read()
            .filter(query)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn window(&self) -> &Arc<RwLock<VerseWindow>> {
        &self.window
    }

    // ========================================================================
    // Narrator
    // ========================================================================

    /// Select a narrator and reload the open chapter with its audio.
    pub async fn select_narrator(&self, narrator: Narrator) -> Result<bool> {
        let changed = self.narrators.set_selected_narrator(narrator).await?;
        if changed {
            // The switch already happened; the host can page in again.
            if let Err(e) = self.load_more_verses().await {
                warn!(error = %e, "Reloading verses for new narrator failed");
            }
        }
        Ok(changed)
    }

    // ========================================================================
    // Downloads
    // ========================================================================

    async fn key_for(&self, chapter_id: u32) -> DownloadKey {
        DownloadKey::new(chapter_id, self.narrators.selected_narrator_id().await)
    }

    /// Download `chapter_id` for the selected narrator.
    pub async fn download_chapter(&self, chapter_id: u32) -> DownloadOutcome {
        let key = self.key_for(chapter_id).await;
        self.downloads.start_download(key).await
    }

    /// Start [`download_chapter`](Self::download_chapter) in the background;
    /// follow it through [`DownloadEvent`](core_runtime::events::DownloadEvent)s.
    pub async fn spawn_chapter_download(&self, chapter_id: u32) -> JoinHandle<DownloadOutcome> {
        let key = self.key_for(chapter_id).await;
        let downloads = Arc::clone(&self.downloads);
        tokio::spawn(async move { downloads.start_download(key).await })
    }

    pub async fn download_state(&self, chapter_id: u32) -> DownloadState {
        self.downloads.state(self.key_for(chapter_id).await)
    }

    /// Whether the selected narrator's recording of `chapter_id` is on disk.
    pub async fn is_chapter_downloaded(&self, chapter_id: u32) -> bool {
        self.downloads.check_exists(self.key_for(chapter_id).await).await
    }

    /// Save the recitation of a loaded verse.
    pub async fn download_verse(&self, key: VerseKey) -> Result<Option<VerseDownload>> {
        let url = {
            let window = self.window.read();
            window
                .get(&key)
                .and_then(|verse| self.resolver.resolve_verse_audio_url(verse))
        };
        match url {
            Some(url) => Ok(Some(self.downloads.download_verse(key, &url).await?)),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Playback
    // ========================================================================

    pub async fn toggle_verse(&self, key: VerseKey) -> Result<PlayOutcome> {
        self.chapters.clear();
        Ok(self.sequencer.toggle_verse(key).await?)
    }

    pub async fn toggle_chapter(&self, chapter_id: u32) -> Result<()> {
        self.sequencer.clear();
        let narrator = self.narrators.selected_narrator_id().await;
        Ok(self.chapters.toggle_chapter(chapter_id, narrator).await?)
    }

    pub async fn chapter_progress(&self) -> Option<ChapterProgress> {
        self.chapters.progress().await
    }

    pub async fn set_looping(&self, looping: bool) -> Result<()> {
        Ok(self.engine.set_looping(looping).await?)
    }

    /// Stop playback, end the completion listener and release the device.
    pub async fn shutdown(&self) {
        info!("Shutting down core service");
        if let Some(listener) = self.auto_advance.lock().take() {
            listener.abort();
        }
        self.sequencer.clear();
        self.chapters.clear();
        self.engine.teardown().await;
    }
}

/// Bootstrap with the desktop bridges and a host audio device.
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(
    adapter: Arc<dyn bridge_traits::playback::PlaybackAdapter>,
) -> Result<CoreService> {
    let config = CoreConfig::builder()
        .playback_adapter(adapter)
        .build()
        .await?;
    CoreService::bootstrap(config).await
}
