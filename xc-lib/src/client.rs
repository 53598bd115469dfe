use crate::cache::ResponseCache;
use crate::error::{Result, XcError};
use crate::query::{id_query, SearchQuery};
use crate::types::{Recording, SearchResponse};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://xeno-canto.org/api/3";
pub const RECORDINGS_ENDPOINT: &str = "recordings";
pub const API_KEY_ENV: &str = "XENO_CANTO_API_KEY";

/// Accepted range for `per_page`.
pub const PER_PAGE_RANGE: std::ops::RangeInclusive<u32> = 50..=500;

/// Client for the xeno-canto API v3.
///
/// Failed requests are returned as errors; nothing is retried here.
#[derive(Clone, Debug)]
pub struct XenoCantoClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
    cache: Option<ResponseCache>,
}

/// An audio file saved to disk by [`XenoCantoClient::download_audio`].
#[derive(Clone, Debug, PartialEq)]
pub struct DownloadedAudio {
    pub path: PathBuf,
    pub bytes: u64,
    /// Hex SHA-256 of the file contents.
    pub sha256: String,
}

impl XenoCantoClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_key, Duration::from_secs(30))
    }

    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(XcError::MissingApiKey);
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("birdcall/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http,
            cache: None,
        })
    }

    /// Read the key from `XENO_CANTO_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(API_KEY_ENV).map_err(|_| XcError::MissingApiKey)?;
        Self::new(key)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    async fn get_json(&self, endpoint: &str, params: Vec<(&str, String)>) -> Result<serde_json::Value> {
        let url = self.endpoint_url(endpoint);
        let cache_key = ResponseCache::key(&url, &params);
        if let Some(cache) = &self.cache {
            if let Some(body) = cache.get(&cache_key) {
                log::debug!("cache hit for {url} {params:?}");
                return Ok(body);
            }
        }

        let mut query = params.clone();
        query.push(("key", self.api_key.clone()));
        log::debug!("GET {url} {params:?}");
        let response = self.http.get(&url).query(&query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(XcError::Status {
                status: status.as_u16(),
                url,
            });
        }
        let body: serde_json::Value = response.json().await?;

        if let Some(cache) = &self.cache {
            let request = format!("{url} {params:?}");
            if let Err(e) = cache.put(&cache_key, &request, &body) {
                log::warn!("could not cache response: {e}");
            }
        }
        Ok(body)
    }

    /// One page of search results.
    ///
    /// `per_page` must lie in 50..=500 when given; it is checked before any
    /// request is made.
    pub async fn search(
        &self,
        query: &SearchQuery,
        page: u32,
        per_page: Option<u32>,
    ) -> Result<SearchResponse> {
        let query_string = query.to_query_string()?;
        let params = search_params(query_string, page, per_page)?;
        let body = self.get_json(RECORDINGS_ENDPOINT, params).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Every recording matching `query`, following pagination.
    ///
    /// Stops at an empty page, at the last page, or once `max_recordings`
    /// have been collected.
    pub async fn all_recordings(
        &self,
        query: &SearchQuery,
        max_recordings: Option<usize>,
        per_page: u32,
    ) -> Result<Vec<Recording>> {
        // Validate up front so a bad query fails before the first request.
        query.to_query_string()?;
        check_per_page(per_page)?;
        collect_pages(|page| self.search(query, page, Some(per_page)), max_recordings).await
    }

    /// Look up a single recording by catalogue number (`12345` or `XC12345`).
    pub async fn recording_by_id(&self, id: &str) -> Result<Option<Recording>> {
        let params = vec![("query", id_query(id))];
        let body = self.get_json(RECORDINGS_ENDPOINT, params).await?;
        let page: SearchResponse = serde_json::from_value(body)?;
        Ok(page.recordings.into_iter().next())
    }

    /// First page of results for a species, which carries the totals.
    pub async fn species_info(&self, scientific_name: &str) -> Result<SearchResponse> {
        let query = SearchQuery::new().scientific_name(scientific_name);
        self.search(&query, 1, None).await
    }

    /// Download the audio file of `recording` to `dest`, creating parent
    /// directories as needed.
    pub async fn download_audio(&self, recording: &Recording, dest: &Path) -> Result<DownloadedAudio> {
        let url = recording
            .audio_url()
            .ok_or_else(|| XcError::NoAudioUrl(recording.id.clone()))?;
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(XcError::Status {
                status: status.as_u16(),
                url,
            });
        }
        let bytes = response.bytes().await?;

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| XcError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        std::fs::write(dest, &bytes).map_err(|source| XcError::Io {
            path: dest.display().to_string(),
            source,
        })?;

        let sha256 = hex(&Sha256::digest(&bytes));
        log::info!("XC{}: {} bytes -> {}", recording.id, bytes.len(), dest.display());
        Ok(DownloadedAudio {
            path: dest.to_path_buf(),
            bytes: bytes.len() as u64,
            sha256,
        })
    }
}

fn check_per_page(per_page: u32) -> Result<()> {
    if PER_PAGE_RANGE.contains(&per_page) {
        Ok(())
    } else {
        Err(XcError::InvalidPerPage(per_page))
    }
}

fn search_params(query: String, page: u32, per_page: Option<u32>) -> Result<Vec<(&'static str, String)>> {
    let mut params = vec![("query", query), ("page", page.max(1).to_string())];
    if let Some(per_page) = per_page {
        check_per_page(per_page)?;
        params.push(("per_page", per_page.to_string()));
    }
    Ok(params)
}

/// Drive `fetch_page` from page 1 until the results run out.
pub(crate) async fn collect_pages<F, Fut>(mut fetch_page: F, max_recordings: Option<usize>) -> Result<Vec<Recording>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<SearchResponse>>,
{
    let mut all = Vec::new();
    let mut page = 1u32;
    loop {
        let response = fetch_page(page).await?;
        if response.recordings.is_empty() {
            break;
        }
        all.extend(response.recordings);

        if let Some(max) = max_recordings {
            if all.len() >= max {
                all.truncate(max);
                break;
            }
        }
        if page >= response.num_pages {
            break;
        }
        page += 1;
    }
    Ok(all)
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
