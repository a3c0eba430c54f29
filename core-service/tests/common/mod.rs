//! In-memory bridges for bootstrapping a full [`CoreService`].

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::playback::{
    DeviceStatus, DeviceStatusUpdate, PlaybackAdapter, PlaybackRequest, PlaybackSessionId,
    StatusSender,
};
use bridge_traits::storage::{FileSystemAccess, SettingsStore};
use bridge_traits::transfer::{
    FileTransfer, ProgressCallback, TransferOutcome, TransferProgress, TransferRequest,
};
use core_content::{
    AudioDescriptor, AudioRef, Chapter, ChapterInfo, ContentApi, ContentError, Narrator, PageInfo,
    Result as ContentResult, Verse, VerseKey, VersePage,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, Receiver};
use core_service::CoreService;
use mockall::mock;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

mock! {
    pub Http {}

    #[async_trait]
    impl HttpClient for Http {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
    read_only: AtomicBool,
}

impl MemorySettings {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    /// Make every later write and delete fail.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn check_writable(&self) -> BridgeResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(BridgeError::StorageError("database is read-only".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.check_writable()?;
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.raw(key))
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.check_writable()?;
        self.values.lock().remove(key);
        Ok(())
    }
}

// ============================================================================
// Audio device
// ============================================================================

#[derive(Default)]
pub struct FakeAdapter {
    calls: Mutex<Vec<String>>,
    senders: Mutex<Vec<(PlaybackSessionId, StatusSender)>>,
}

impl FakeAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn finish_current(&self) {
        if let Some((session, sender)) = self.senders.lock().last() {
            let _ = sender.send(DeviceStatusUpdate {
                session: *session,
                status: DeviceStatus::Finished,
            });
        }
    }
}

#[async_trait]
impl PlaybackAdapter for FakeAdapter {
    async fn prepare(
        &self,
        request: PlaybackRequest,
        updates: StatusSender,
    ) -> BridgeResult<PlaybackSessionId> {
        self.calls
            .lock()
            .push(format!("prepare {}", request.source.uri()));
        let session = PlaybackSessionId::new();
        self.senders.lock().push((session, updates));
        Ok(session)
    }

    async fn play(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        self.calls.lock().push("play".into());
        Ok(())
    }

    async fn pause(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        self.calls.lock().push("pause".into());
        Ok(())
    }

    async fn stop(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        self.calls.lock().push("stop".into());
        Ok(())
    }

    async fn set_looping(&self, _session: PlaybackSessionId, _looping: bool) -> BridgeResult<()> {
        Ok(())
    }

    async fn get_position(&self, _session: PlaybackSessionId) -> BridgeResult<Duration> {
        Ok(Duration::ZERO)
    }

    async fn unload(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        self.calls.lock().push("unload".into());
        Ok(())
    }
}

// ============================================================================
// Disk and transfers
// ============================================================================

#[derive(Default)]
pub struct MemoryDisk {
    files: Mutex<HashSet<PathBuf>>,
}

impl MemoryDisk {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_file(&self, path: impl Into<PathBuf>) {
        self.files.lock().insert(path.into());
    }
}

#[async_trait]
impl FileSystemAccess for MemoryDisk {
    async fn get_data_directory(&self) -> BridgeResult<PathBuf> {
        Ok(PathBuf::from("/data"))
    }

    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        Ok(self.files.lock().contains(path))
    }

    async fn create_dir_all(&self, _path: &Path) -> BridgeResult<()> {
        Ok(())
    }
}

/// Completes transfers into a [`MemoryDisk`]; while gated each transfer
/// waits for [`GatedTransfer::release`].
pub struct GatedTransfer {
    disk: Arc<MemoryDisk>,
    gated: AtomicBool,
    gate: Notify,
    pub urls: Mutex<Vec<String>>,
}

impl GatedTransfer {
    pub fn new(disk: Arc<MemoryDisk>) -> Arc<Self> {
        Arc::new(Self {
            disk,
            gated: AtomicBool::new(false),
            gate: Notify::new(),
            urls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_gated(&self, gated: bool) {
        self.gated.store(gated, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl FileTransfer for GatedTransfer {
    async fn download(
        &self,
        request: TransferRequest,
        on_progress: ProgressCallback,
    ) -> BridgeResult<TransferOutcome> {
        self.urls.lock().push(request.url.clone());
        on_progress(TransferProgress {
            bytes_written: 0,
            total_bytes: Some(100),
        });
        if self.gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        self.disk.add_file(&request.destination);
        Ok(TransferOutcome {
            path: request.destination,
            bytes_written: 100,
            resumed_from: 0,
        })
    }
}

// ============================================================================
// Content API
// ============================================================================

pub fn narrator(id: u32, name: &str) -> Narrator {
    Narrator {
        id,
        name: name.to_string(),
        style: Some("Murattal".into()),
        translated_name: None,
    }
}

/// Every chapter has 30 verses, all recorded by every narrator.
pub struct StaticApi {
    pub narrators: Mutex<Vec<Narrator>>,
    pub narrator_fetches: AtomicUsize,
    pub page_requests: Mutex<Vec<(u32, u32, Option<u32>)>>,
    pub fail_pages: AtomicBool,
}

impl StaticApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            narrators: Mutex::new(vec![
                narrator(1, "AbdulBaset AbdulSamad"),
                narrator(7, "Mishari Rashid al-Afasy"),
            ]),
            narrator_fetches: AtomicUsize::new(0),
            page_requests: Mutex::new(Vec::new()),
            fail_pages: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl ContentApi for StaticApi {
    async fn fetch_verses(
        &self,
        chapter_id: u32,
        page: u32,
        narrator_id: Option<u32>,
    ) -> ContentResult<VersePage> {
        self.page_requests
            .lock()
            .push((chapter_id, page, narrator_id));
        if self.fail_pages.load(Ordering::SeqCst) {
            return Err(ContentError::Network("connection reset".into()));
        }
        let narrator = narrator_id.unwrap_or(1);
        let first = (page - 1) * 10 + 1;
        let verses = (first..first + 10)
            .filter(|n| *n <= 30)
            .map(|n| Verse {
                id: (chapter_id * 1000 + n) as u64,
                key: VerseKey::new(chapter_id, n),
                text_uthmani: String::new(),
                page_number: None,
                juz_number: None,
                words: vec![],
                audio: Some(AudioRef {
                    url: format!("{}/{:03}{:03}.mp3", narrator, chapter_id, n),
                }),
            })
            .collect();
        Ok(VersePage {
            verses,
            pagination: PageInfo {
                per_page: 10,
                current_page: page,
                next_page: (page < 3).then_some(page + 1),
                total_pages: 3,
                total_records: 30,
            },
        })
    }

    async fn fetch_chapter_audio(
        &self,
        chapter_id: u32,
        narrator_id: u32,
    ) -> ContentResult<AudioDescriptor> {
        Ok(AudioDescriptor {
            url: format!("https://download.test/{}/{}.mp3", narrator_id, chapter_id),
            byte_size: 100,
        })
    }

    async fn fetch_narrators(&self) -> ContentResult<Vec<Narrator>> {
        self.narrator_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.narrators.lock().clone())
    }

    async fn fetch_random_verse(&self) -> ContentResult<Verse> {
        Err(ContentError::Network("offline".into()))
    }

    async fn fetch_chapters(&self) -> ContentResult<Vec<Chapter>> {
        Ok(vec![])
    }

    async fn fetch_chapter_info(&self, chapter_id: u32) -> ContentResult<ChapterInfo> {
        Err(ContentError::NotFound(format!("chapter {}", chapter_id)))
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub settings: Arc<MemorySettings>,
    pub adapter: Arc<FakeAdapter>,
    pub disk: Arc<MemoryDisk>,
    pub transfer: Arc<GatedTransfer>,
    pub api: Arc<StaticApi>,
}

impl Harness {
    pub fn new() -> Self {
        let disk = MemoryDisk::new();
        Self {
            settings: MemorySettings::new(),
            adapter: FakeAdapter::new(),
            transfer: GatedTransfer::new(disk.clone()),
            disk,
            api: StaticApi::new(),
        }
    }

    pub async fn config(&self) -> CoreConfig {
        CoreConfig::builder()
            .http_client(Arc::new(MockHttp::new()))
            .file_system(self.disk.clone())
            .file_transfer(self.transfer.clone())
            .settings_store(self.settings.clone())
            .playback_adapter(self.adapter.clone())
            .verse_audio_host("https://verses.test/")
            .build()
            .await
            .expect("valid config")
    }

    pub async fn service(&self) -> CoreService {
        CoreService::with_api(self.config().await, self.api.clone())
            .await
            .expect("bootstrap")
    }
}

pub async fn wait_for<F>(rx: &mut Receiver<CoreEvent>, mut predicate: F) -> CoreEvent
where
    F: FnMut(&CoreEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) => continue,
                Err(e) => panic!("event bus error: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
