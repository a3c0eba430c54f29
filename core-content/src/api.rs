//! Content API client
//!
//! [`ContentApi`] is the seam the rest of the core depends on;
//! [`QuranApiClient`] implements it over any [`HttpClient`] bridge.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use core_runtime::config::{
    CoreConfig, DEFAULT_API_BASE_URL, DEFAULT_NARRATOR_FETCH_RETRIES, DEFAULT_NARRATOR_ID,
    DEFAULT_PAGE_SIZE, DEFAULT_TRANSLATION_LANGUAGE,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::{ContentError, Result};
use crate::models::{AudioDescriptor, Chapter, ChapterInfo, Narrator, Verse, VersePage};
use crate::types::{
    ChapterAudioResponse, ChapterInfoResponse, ChaptersResponse, RandomVerseResponse,
    RecitationsResponse, VersesResponse,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Read-only access to chapters, verses, narrators and audio descriptors.
#[async_trait]
pub trait ContentApi: Send + Sync {
    /// One page of a chapter's verses. `narrator_id` selects which audio
    /// annotations come back with each verse.
    async fn fetch_verses(
        &self,
        chapter_id: u32,
        page: u32,
        narrator_id: Option<u32>,
    ) -> Result<VersePage>;

    /// Download descriptor for a full chapter recitation.
    ///
    /// Fails with [`ContentError::NotFound`] when the narrator has no
    /// recording of the chapter.
    async fn fetch_chapter_audio(&self, chapter_id: u32, narrator_id: u32)
        -> Result<AudioDescriptor>;

    async fn fetch_narrators(&self) -> Result<Vec<Narrator>>;

    async fn fetch_random_verse(&self) -> Result<Verse>;

    async fn fetch_chapters(&self) -> Result<Vec<Chapter>>;

    async fn fetch_chapter_info(&self, chapter_id: u32) -> Result<ChapterInfo>;
}

/// Client for `api.quran.com/api/v4`.
///
/// # Example
///
/// ```ignore
/// use core_content::{ContentApi, QuranApiClient};
///
/// let api = QuranApiClient::from_config(&config);
/// let page = api.fetch_verses(2, 1, Some(7)).await?;
/// ```
pub struct QuranApiClient {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    language: String,
    page_size: u32,
    narrator_retry: RetryPolicy,
}

impl QuranApiClient {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: DEFAULT_API_BASE_URL.to_string(),
            language: DEFAULT_TRANSLATION_LANGUAGE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            narrator_retry: RetryPolicy::default().with_max_retries(DEFAULT_NARRATOR_FETCH_RETRIES),
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(Arc::clone(&config.http_client))
            .with_base_url(&config.api_base_url)
            .with_language(&config.translation_language)
            .with_page_size(config.page_size)
            .with_narrator_retry(
                RetryPolicy::default().with_max_retries(config.narrator_fetch_retries),
            )
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_narrator_retry(mut self, policy: RetryPolicy) -> Self {
        self.narrator_retry = policy;
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn lang(&self) -> std::borrow::Cow<'_, str> {
        urlencoding::encode(&self.language)
    }

    async fn get(&self, url: String) -> Result<HttpResponse> {
        let request = HttpRequest::get(url).accept_json().timeout(REQUEST_TIMEOUT);
        self.http_client
            .execute(request)
            .await
            .map_err(|e| ContentError::Network(e.to_string()))
    }

    /// Non-2xx becomes `Network`, or `NotFound` when `not_found` is set and
    /// the server answered 404.
    fn check_status(response: &HttpResponse, url: &str, not_found: Option<String>) -> Result<()> {
        if response.is_success() {
            return Ok(());
        }
        if response.is_not_found() {
            if let Some(what) = not_found {
                return Err(ContentError::NotFound(what));
            }
        }
        Err(ContentError::Network(format!(
            "HTTP {} for {}",
            response.status, url
        )))
    }

    fn parse<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
        serde_json::from_slice(&response.body).map_err(|e| ContentError::Parse(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String, not_found: Option<String>) -> Result<T> {
        let response = self.get(url.clone()).await?;
        Self::check_status(&response, &url, not_found)?;
        Self::parse(&response)
    }

    async fn fetch_narrators_once(&self) -> Result<Vec<Narrator>> {
        let url = format!("{}/resources/recitations", self.base_url);
        let response: RecitationsResponse = self.get_json(url, None).await?;
        let recitations = response
            .recitations
            .ok_or_else(|| ContentError::Parse("Invalid response format: missing recitations".into()))?;
        Ok(recitations.into_iter().map(Narrator::from).collect())
    }
}

#[async_trait]
impl ContentApi for QuranApiClient {
    #[instrument(skip(self))]
    async fn fetch_verses(
        &self,
        chapter_id: u32,
        page: u32,
        narrator_id: Option<u32>,
    ) -> Result<VersePage> {
        let url = format!(
            "{}/verses/by_chapter/{}?language={}&words=true&fields=text_uthmani&per_page={}&page={}&audio={}",
            self.base_url,
            chapter_id,
            self.lang(),
            self.page_size,
            page,
            narrator_id.unwrap_or(DEFAULT_NARRATOR_ID)
        );
        let response: VersesResponse = self.get_json(url, None).await?;
        let page = VersePage::try_from(response)?;
        debug!(
            verses = page.verses.len(),
            total = page.pagination.total_records,
            "Fetched verse page"
        );
        Ok(page)
    }

    #[instrument(skip(self))]
    async fn fetch_chapter_audio(
        &self,
        chapter_id: u32,
        narrator_id: u32,
    ) -> Result<AudioDescriptor> {
        let url = format!(
            "{}/chapter_recitations/{}/{}",
            self.base_url, narrator_id, chapter_id
        );
        let missing = format!(
            "no audio for chapter {} by narrator {}",
            chapter_id, narrator_id
        );

        let response: ChapterAudioResponse = self.get_json(url, Some(missing.clone())).await?;

        response
            .audio_file
            .ok_or(ContentError::NotFound(missing))?
            .into_descriptor()
            .ok_or_else(|| ContentError::Parse("audio file lacks a usable url or size".into()))
    }

    #[instrument(skip(self))]
    async fn fetch_narrators(&self) -> Result<Vec<Narrator>> {
        let mut retry = 0;
        loop {
            match self.fetch_narrators_once().await {
                Ok(narrators) => {
                    debug!(count = narrators.len(), "Fetched narrators");
                    return Ok(narrators);
                }
                Err(e) if e.is_retryable() && retry < self.narrator_retry.max_retries => {
                    retry += 1;
                    let delay = self.narrator_retry.delay_for(retry);
                    warn!(error = %e, retry, ?delay, "Narrator fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_random_verse(&self) -> Result<Verse> {
        let url = format!(
            "{}/verses/random?language={}&words=true&fields=text_uthmani",
            self.base_url,
            self.lang()
        );
        let response: RandomVerseResponse = self.get_json(url, None).await?;
        Verse::try_from(response.verse)
    }

    async fn fetch_chapters(&self) -> Result<Vec<Chapter>> {
        let url = format!("{}/chapters?language={}", self.base_url, self.lang());
        let response: ChaptersResponse = self.get_json(url, None).await?;
        Ok(response.chapters.into_iter().map(Chapter::from).collect())
    }

    async fn fetch_chapter_info(&self, chapter_id: u32) -> Result<ChapterInfo> {
        let url = format!(
            "{}/chapters/{}/info?language={}",
            self.base_url,
            chapter_id,
            self.lang()
        );
        let response: ChapterInfoResponse = self
            .get_json(url, Some(format!("chapter {} info", chapter_id)))
            .await?;
        Ok(response.chapter_info.into())
    }
}
