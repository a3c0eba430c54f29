//! Recording fakes for the host bridges.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::playback::{
    DeviceStatus, DeviceStatusUpdate, PlaybackAdapter, PlaybackRequest, PlaybackSessionId,
    StatusSender,
};
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::transfer::{
    FileTransfer, ProgressCallback, TransferOutcome, TransferProgress, TransferRequest,
};
use core_content::{
    AssetResolver, AudioDescriptor, AudioRef, Chapter, ChapterInfo, ContentApi, ContentError,
    Narrator, PageInfo, Result as ContentResult, Verse, VerseKey, VersePage,
};
use core_runtime::events::{CoreEvent, Receiver};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Audio device
// ============================================================================

#[derive(Default)]
pub struct FakeAdapter {
    calls: Mutex<Vec<String>>,
    senders: Mutex<HashMap<PlaybackSessionId, StatusSender>>,
    sessions: Mutex<Vec<PlaybackSessionId>>,
    failing_uris: Mutex<HashSet<String>>,
}

impl FakeAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_uri(&self, uri: &str) {
        self.failing_uris.lock().insert(uri.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn prepared(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("prepare ").map(str::to_string))
            .collect()
    }

    pub fn session(&self, index: usize) -> PlaybackSessionId {
        self.sessions.lock()[index]
    }

    pub fn last_session(&self) -> PlaybackSessionId {
        *self.sessions.lock().last().expect("no session prepared")
    }

    /// Push a status as the device would.
    pub fn report(&self, session: PlaybackSessionId, status: DeviceStatus) {
        if let Some(sender) = self.senders.lock().get(&session) {
            let _ = sender.send(DeviceStatusUpdate { session, status });
        }
    }

    pub fn finish_current(&self) {
        self.report(self.last_session(), DeviceStatus::Finished);
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl PlaybackAdapter for FakeAdapter {
    async fn prepare(
        &self,
        request: PlaybackRequest,
        updates: StatusSender,
    ) -> BridgeResult<PlaybackSessionId> {
        let uri = request.source.uri();
        self.record(format!("prepare {}", uri));
        if self.failing_uris.lock().contains(&uri) {
            return Err(BridgeError::OperationFailed(format!("cannot open {}", uri)));
        }
        let session = PlaybackSessionId::new();
        self.senders.lock().insert(session, updates);
        self.sessions.lock().push(session);
        Ok(session)
    }

    async fn play(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        self.record("play".into());
        Ok(())
    }

    async fn pause(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        self.record("pause".into());
        Ok(())
    }

    async fn stop(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        self.record("stop".into());
        Ok(())
    }

    async fn set_looping(&self, _session: PlaybackSessionId, looping: bool) -> BridgeResult<()> {
        self.record(format!("set_looping {}", looping));
        Ok(())
    }

    async fn get_position(&self, _session: PlaybackSessionId) -> BridgeResult<Duration> {
        Ok(Duration::ZERO)
    }

    // Senders are kept so tests can replay late callbacks from released
    // sessions.
    async fn unload(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        self.record("unload".into());
        Ok(())
    }
}

// ============================================================================
// File system
// ============================================================================

/// Tracks which files exist; no bytes are stored.
#[derive(Default)]
pub struct FakeFileSystem {
    files: Mutex<HashSet<PathBuf>>,
    stats: AtomicUsize,
}

impl FakeFileSystem {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_file(&self, path: impl Into<PathBuf>) {
        self.files.lock().insert(path.into());
    }

    pub fn stat_count(&self) -> usize {
        self.stats.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileSystemAccess for FakeFileSystem {
    async fn get_data_directory(&self) -> BridgeResult<PathBuf> {
        Ok(PathBuf::from("/data"))
    }

    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        self.stats.fetch_add(1, Ordering::SeqCst);
        Ok(self.files.lock().contains(path))
    }

    async fn create_dir_all(&self, _path: &Path) -> BridgeResult<()> {
        Ok(())
    }
}

// ============================================================================
// Transfers
// ============================================================================

/// Writes the destination into a [`FakeFileSystem`] after reporting progress.
///
/// When gated, each transfer waits for [`FakeTransfer::release`] before it
/// finishes.
pub struct FakeTransfer {
    fs: Arc<FakeFileSystem>,
    bytes: u64,
    gated: AtomicBool,
    gate: Notify,
    fail_next: Mutex<Option<BridgeError>>,
    started: AtomicUsize,
    pub requests: Mutex<Vec<TransferRequest>>,
}

impl FakeTransfer {
    pub fn new(fs: Arc<FakeFileSystem>, bytes: u64) -> Arc<Self> {
        Arc::new(Self {
            fs,
            bytes,
            gated: AtomicBool::new(false),
            gate: Notify::new(),
            fail_next: Mutex::new(None),
            started: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn gated(self: Arc<Self>) -> Arc<Self> {
        self.gated.store(true, Ordering::SeqCst);
        self
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn fail_next(&self, error: BridgeError) {
        *self.fail_next.lock() = Some(error);
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileTransfer for FakeTransfer {
    async fn download(
        &self,
        request: TransferRequest,
        on_progress: ProgressCallback,
    ) -> BridgeResult<TransferOutcome> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        on_progress(TransferProgress {
            bytes_written: 0,
            total_bytes: Some(self.bytes),
        });
        if self.gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }

        if let Some(error) = self.fail_next.lock().take() {
            return Err(error);
        }

        on_progress(TransferProgress {
            bytes_written: self.bytes / 2,
            total_bytes: Some(self.bytes),
        });
        // Servers sometimes send more than the advertised size.
        on_progress(TransferProgress {
            bytes_written: self.bytes + 512,
            total_bytes: Some(self.bytes),
        });

        self.fs.add_file(&request.destination);
        Ok(TransferOutcome {
            path: request.destination,
            bytes_written: self.bytes,
            resumed_from: 0,
        })
    }
}

// ============================================================================
// Event helpers
// ============================================================================

/// Receive events until one matches, panicking after a few seconds.
pub async fn wait_for<F>(rx: &mut Receiver<CoreEvent>, mut predicate: F) -> CoreEvent
where
    F: FnMut(&CoreEvent) -> bool,
{
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
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

/// Drain everything currently buffered.
pub fn drain(rx: &mut Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ============================================================================
// Content API
// ============================================================================

/// Chapters of `verse_count` verses served ten per page. Every verse has
/// audio unless listed in `silent`.
pub struct FakeApi {
    pub verse_count: u32,
    silent: Mutex<HashSet<VerseKey>>,
    missing_chapters: Mutex<HashSet<(u32, u32)>>,
    offline: AtomicBool,
    pub audio_requests: AtomicUsize,
}

impl FakeApi {
    pub fn new(verse_count: u32) -> Arc<Self> {
        Arc::new(Self {
            verse_count,
            silent: Mutex::new(HashSet::new()),
            missing_chapters: Mutex::new(HashSet::new()),
            offline: AtomicBool::new(false),
            audio_requests: AtomicUsize::new(0),
        })
    }

    pub fn without_audio(&self, key: VerseKey) {
        self.silent.lock().insert(key);
    }

    pub fn missing_chapter(&self, chapter_id: u32, narrator_id: u32) {
        self.missing_chapters.lock().insert((chapter_id, narrator_id));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn verse(&self, key: VerseKey) -> Verse {
        let audio = (!self.silent.lock().contains(&key)).then(|| AudioRef {
            url: format!("Alafasy/mp3/{:03}{:03}.mp3", key.chapter, key.verse),
        });
        Verse {
            id: (key.chapter * 1000 + key.verse) as u64,
            key,
            text_uthmani: format!("verse {}", key),
            page_number: None,
            juz_number: None,
            words: vec![],
            audio,
        }
    }

    pub fn verse_url(key: &str) -> String {
        let key: VerseKey = key.parse().expect("valid key");
        format!(
            "https://verses.test/Alafasy/mp3/{:03}{:03}.mp3",
            key.chapter, key.verse
        )
    }
}

#[async_trait]
impl ContentApi for FakeApi {
    async fn fetch_verses(
        &self,
        chapter_id: u32,
        page: u32,
        _narrator_id: Option<u32>,
    ) -> ContentResult<VersePage> {
        let per_page = 10;
        let first = (page - 1) * per_page + 1;
        let last = (page * per_page).min(self.verse_count);
        let total_pages = self.verse_count.div_ceil(per_page);
        Ok(VersePage {
            verses: (first..=last)
                .map(|n| self.verse(VerseKey::new(chapter_id, n)))
                .collect(),
            pagination: PageInfo {
                per_page,
                current_page: page,
                next_page: (page < total_pages).then_some(page + 1),
                total_pages,
                total_records: self.verse_count,
            },
        })
    }

    async fn fetch_chapter_audio(
        &self,
        chapter_id: u32,
        narrator_id: u32,
    ) -> ContentResult<AudioDescriptor> {
        self.audio_requests.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(ContentError::Network("connection refused".into()));
        }
        if self.missing_chapters.lock().contains(&(chapter_id, narrator_id)) {
            return Err(ContentError::NotFound(format!(
                "chapter {} narrator {}",
                chapter_id, narrator_id
            )));
        }
        Ok(AudioDescriptor {
            url: format!("https://download.test/{}/{}.mp3", narrator_id, chapter_id),
            byte_size: 4096,
        })
    }

    async fn fetch_narrators(&self) -> ContentResult<Vec<Narrator>> {
        Err(ContentError::NotFound("narrators".into()))
    }

    async fn fetch_random_verse(&self) -> ContentResult<Verse> {
        Ok(self.verse(VerseKey::new(1, 1)))
    }

    async fn fetch_chapters(&self) -> ContentResult<Vec<Chapter>> {
        Ok(vec![])
    }

    async fn fetch_chapter_info(&self, chapter_id: u32) -> ContentResult<ChapterInfo> {
        Err(ContentError::NotFound(format!("chapter {}", chapter_id)))
    }
}

pub const VERSE_HOST: &str = "https://verses.test";

pub fn resolver(api: Arc<FakeApi>) -> Arc<AssetResolver> {
    Arc::new(AssetResolver::new(api, VERSE_HOST))
}
