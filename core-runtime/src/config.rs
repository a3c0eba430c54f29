//! # Core Configuration Module
//!
//! Builder-based configuration for the recitation core.
//!
//! ## Overview
//!
//! [`CoreConfig`] holds every bridge the core talks to plus the tunables of
//! the content API client, the download manager and the playback engine.
//! [`CoreConfigBuilder::build`] fails fast with an actionable
//! [`Error::CapabilityMissing`] when a required bridge is absent.
//!
//! ## Required Dependencies
//!
//! - `PlaybackAdapter` - the host audio device; there is no default
//!
//! ## Optional Dependencies (with desktop defaults)
//!
//! - `HttpClient` - content API requests (desktop default: reqwest)
//! - `FileSystemAccess` - local audio directory (desktop default: tokio fs)
//! - `FileTransfer` - resumable downloads (desktop default: reqwest stream)
//! - `SettingsStore` - persisted narrator selection (desktop default: SQLite)
//!
//! Desktop defaults are injected only with the `desktop-shims` feature.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .playback_adapter(Arc::new(MyAudioDevice::new()))
//!     .translation_language("en")
//!     .build()
//!     .await?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{FileSystemAccess, FileTransfer, HttpClient, PlaybackAdapter, SettingsStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.quran.com/api/v4";
pub const DEFAULT_VERSE_AUDIO_HOST: &str = "https://verses.quran.com/";
pub const DEFAULT_TRANSLATION_LANGUAGE: &str = "ur";
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 50;
pub const DEFAULT_AUDIO_DIRECTORY: &str = "quran_audio";
pub const DEFAULT_NARRATOR_ID: u32 = 1;
pub const DEFAULT_ERROR_DISPLAY_DURATION: Duration = Duration::from_millis(3000);
pub const DEFAULT_NARRATOR_FETCH_RETRIES: u32 = 2;
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = crate::events::DEFAULT_EVENT_BUFFER_SIZE;

/// Core configuration for the recitation core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base URL of the content REST API, without trailing slash
    pub api_base_url: String,

    /// Host prefix joined with each verse's relative audio path
    pub verse_audio_host: String,

    /// Language code for translations in verse pages and chapter info
    pub translation_language: String,

    /// Verses per page when paginating a chapter
    pub page_size: u32,

    /// Directory name, below the data directory, holding downloaded audio
    pub audio_directory: String,

    /// Narrator used for audio annotations until the user picks one
    pub default_narrator_id: u32,

    /// How long a playback error stays visible before the engine resets
    pub error_display_duration: Duration,

    /// Automatic retries for the narrator catalog request
    pub narrator_fetch_retries: u32,

    /// Buffer size of the event bus channel
    pub event_buffer_size: usize,

    pub http_client: Arc<dyn HttpClient>,
    pub file_system: Arc<dyn FileSystemAccess>,
    pub file_transfer: Arc<dyn FileTransfer>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub playback_adapter: Arc<dyn PlaybackAdapter>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("api_base_url", &self.api_base_url)
            .field("verse_audio_host", &self.verse_audio_host)
            .field("translation_language", &self.translation_language)
            .field("page_size", &self.page_size)
            .field("audio_directory", &self.audio_directory)
            .field("default_narrator_id", &self.default_narrator_id)
            .field("error_display_duration", &self.error_display_duration)
            .field("narrator_fetch_retries", &self.narrator_fetch_retries)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("http_client", &"HttpClient { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field("file_transfer", &"FileTransfer { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("playback_adapter", &"PlaybackAdapter { ... }")
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(Error::Config("API base URL cannot be empty".to_string()));
        }

        if self.verse_audio_host.trim().is_empty() {
            return Err(Error::Config("Verse audio host cannot be empty".to_string()));
        }

        if self.translation_language.trim().is_empty() {
            return Err(Error::Config(
                "Translation language cannot be empty".to_string(),
            ));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Page size must be between 1 and {} (got {})",
                MAX_PAGE_SIZE, self.page_size
            )));
        }

        if self.audio_directory.trim().is_empty() {
            return Err(Error::Config("Audio directory cannot be empty".to_string()));
        }

        if self.error_display_duration.is_zero() {
            return Err(Error::Config(
                "Error display duration must be greater than 0ms".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn playback_adapter_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "PlaybackAdapter".to_string(),
        message: "A PlaybackAdapter implementation is required to drive the audio device. \
                 Inject the host's native player (AVPlayer/ExoPlayer/desktop audio backend) \
                 with .playback_adapter()."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn bridge_missing_error(capability: &str, purpose: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required for {}. \
             Desktop: enable the 'desktop-shims' feature to use the default. \
             Mobile: inject the platform-native adapter.",
            capability, purpose
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Ok(Arc::new(bridge_desktop::ReqwestHttpClient::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(bridge_missing_error("HttpClient", "content API requests"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(bridge_missing_error("FileSystemAccess", "the local audio directory"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_transfer() -> Result<Arc<dyn FileTransfer>> {
    Ok(Arc::new(bridge_desktop::ReqwestFileTransfer::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_transfer() -> Result<Arc<dyn FileTransfer>> {
    Err(bridge_missing_error("FileTransfer", "audio downloads"))
}

#[cfg(feature = "desktop-shims")]
async fn provide_default_settings_store(
    settings_path: Option<PathBuf>,
    file_system: &Arc<dyn FileSystemAccess>,
) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;

    let path = match settings_path {
        Some(path) => path,
        None => file_system
            .get_data_directory()
            .await
            .map_err(|e| Error::BridgeInit(format!("data directory: {}", e)))?
            .join("settings.db"),
    };

    let store = SqliteSettingsStore::new(path).await.map_err(|e| {
        Error::BridgeInit(format!("settings store: {}", e))
    })?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
async fn provide_default_settings_store(
    _settings_path: Option<PathBuf>,
    _file_system: &Arc<dyn FileSystemAccess>,
) -> Result<Arc<dyn SettingsStore>> {
    Err(bridge_missing_error("SettingsStore", "the persisted narrator selection"))
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    api_base_url: Option<String>,
    verse_audio_host: Option<String>,
    translation_language: Option<String>,
    page_size: Option<u32>,
    audio_directory: Option<String>,
    default_narrator_id: Option<u32>,
    error_display_duration: Option<Duration>,
    narrator_fetch_retries: Option<u32>,
    event_buffer_size: Option<usize>,
    settings_path: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    file_transfer: Option<Arc<dyn FileTransfer>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    playback_adapter: Option<Arc<dyn PlaybackAdapter>>,
}

impl CoreConfigBuilder {
    /// Sets the content API base URL. A trailing slash is removed.
    ///
    /// Default: `https://api.quran.com/api/v4`
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Sets the host verse audio paths are resolved against.
    ///
    /// Default: `https://verses.quran.com/`
    pub fn verse_audio_host(mut self, host: impl Into<String>) -> Self {
        self.verse_audio_host = Some(host.into());
        self
    }

    /// Default: `ur`
    pub fn translation_language(mut self, language: impl Into<String>) -> Self {
        self.translation_language = Some(language.into());
        self
    }

    /// Sets verses per page. Must be within `1..=50`.
    ///
    /// Default: 10
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Default: `quran_audio`
    pub fn audio_directory(mut self, directory: impl Into<String>) -> Self {
        self.audio_directory = Some(directory.into());
        self
    }

    pub fn default_narrator_id(mut self, narrator_id: u32) -> Self {
        self.default_narrator_id = Some(narrator_id);
        self
    }

    /// Default: 3000 ms
    pub fn error_display_duration(mut self, duration: Duration) -> Self {
        self.error_display_duration = Some(duration);
        self
    }

    pub fn narrator_fetch_retries(mut self, retries: u32) -> Self {
        self.narrator_fetch_retries = Some(retries);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Location of the default SQLite settings database. Only consulted when
    /// no `SettingsStore` is injected.
    pub fn settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn file_transfer(mut self, transfer: Arc<dyn FileTransfer>) -> Self {
        self.file_transfer = Some(transfer);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Sets the audio device adapter (required).
    pub fn playback_adapter(mut self, adapter: Arc<dyn PlaybackAdapter>) -> Self {
        self.playback_adapter = Some(adapter);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Asynchronous because the default settings store opens its database.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when the playback adapter, or a bridge
    ///   without a desktop default, is missing
    /// - [`Error::Config`] when a value fails validation
    pub async fn build(self) -> Result<CoreConfig> {
        let playback_adapter = self
            .playback_adapter
            .ok_or_else(playback_adapter_missing_error)?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let file_transfer = match self.file_transfer {
            Some(transfer) => transfer,
            None => provide_default_file_transfer()?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(self.settings_path, &file_system).await?,
        };

        let config = CoreConfig {
            api_base_url: self
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            verse_audio_host: self
                .verse_audio_host
                .unwrap_or_else(|| DEFAULT_VERSE_AUDIO_HOST.to_string()),
            translation_language: self
                .translation_language
                .unwrap_or_else(|| DEFAULT_TRANSLATION_LANGUAGE.to_string()),
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            audio_directory: self
                .audio_directory
                .unwrap_or_else(|| DEFAULT_AUDIO_DIRECTORY.to_string()),
            default_narrator_id: self.default_narrator_id.unwrap_or(DEFAULT_NARRATOR_ID),
            error_display_duration: self
                .error_display_duration
                .unwrap_or(DEFAULT_ERROR_DISPLAY_DURATION),
            narrator_fetch_retries: self
                .narrator_fetch_retries
                .unwrap_or(DEFAULT_NARRATOR_FETCH_RETRIES),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            http_client,
            file_system,
            file_transfer,
            settings_store,
            playback_adapter,
        };

        config.validate()?;

        Ok(config)
    }
}
