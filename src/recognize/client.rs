use super::parser::parse_season_episode;
use crate::config::UploaderConfig;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Wire value the recognition service uses for episodic content
const SERIES_TYPE: &str = "电视剧";

#[derive(Error, Debug)]
pub enum RecognizeClientError {
    #[error("HTTP client error: {0}")]
    Http(String),
}

/// Digested answer from the recognition service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognizedMedia {
    pub is_series: bool,
    /// Cross-referencing catalog ID, when the service knows one
    pub external_id: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    /// Best title candidate: primary title, then original title, then
    /// metadata name
    pub title: Option<String>,
}

/// Filename-understanding collaborator (allows mocking for tests).
///
/// Recognition is best-effort: a `None` answer means the resolver falls
/// through to its filename heuristics, it is never a hard failure.
#[async_trait::async_trait]
pub trait RecognitionService: Send + Sync {
    async fn recognize(&self, filename: &str) -> Option<RecognizedMedia>;
}

#[derive(Debug, Deserialize, Default)]
struct MediaInfo {
    #[serde(rename = "type", default)]
    media_type: Option<String>,
    #[serde(default)]
    tmdb_id: Option<serde_json::Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    original_title: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct MetaInfo {
    #[serde(rename = "type", default)]
    meta_type: Option<String>,
    #[serde(default)]
    season_episode: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    media_info: Option<MediaInfo>,
    #[serde(default)]
    meta_info: Option<MetaInfo>,
}

/// HTTP client for the external recognition service. Carries its own
/// bounded retry loop (fixed backoff) and request timeout, independent of
/// the transfer-side retry policy.
pub struct HttpRecognizeService {
    http: reqwest::Client,
    url: String,
    max_attempts: u32,
    retry_delay: Duration,
}

impl HttpRecognizeService {
    pub fn new(config: &UploaderConfig) -> Result<Self, RecognizeClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.recognize_timeout)
            .build()
            .map_err(|e| RecognizeClientError::Http(e.to_string()))?;

        Ok(Self {
            http,
            url: config.recognize_url.clone(),
            max_attempts: config.max_retry_attempts,
            retry_delay: config.retry_base_delay,
        })
    }

    async fn fetch(&self, filename: &str) -> Result<RecognizeResponse, String> {
        let url = format!("{}?path={}", self.url, urlencoding::encode(filename));
        let mut attempt = 1;

        loop {
            debug!(
                "RecognizeService: attempt {}/{} for '{}'",
                attempt, self.max_attempts, filename
            );

            let error = match self.http.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    match response.json::<RecognizeResponse>().await {
                        Ok(parsed) => return Ok(parsed),
                        Err(e) => format!("malformed recognition response: {}", e),
                    }
                }
                Ok(response) => format!("recognition HTTP {}", response.status()),
                Err(e) => format!("recognition request failed: {}", e),
            };

            if attempt < self.max_attempts {
                warn!(
                    "RecognizeService: attempt {}/{} failed: {}",
                    attempt, self.max_attempts, error
                );
                tokio::time::sleep(self.retry_delay).await;
                attempt += 1;
            } else {
                return Err(error);
            }
        }
    }

    /// A response without `media_info` is not a definitive answer; the
    /// resolver's filename heuristics must decide instead
    fn digest(response: RecognizeResponse) -> Option<RecognizedMedia> {
        let media = response.media_info?;
        let meta = response.meta_info.unwrap_or_default();

        let season_episode = meta.season_episode.as_deref().unwrap_or("");
        let is_series = media.media_type.as_deref() == Some(SERIES_TYPE)
            || meta.meta_type.as_deref() == Some(SERIES_TYPE)
            || season_episode.contains('S');

        let (season, episode) = if is_series {
            match parse_season_episode(season_episode) {
                Some((season, episode)) => (Some(season), Some(episode)),
                None => (None, None),
            }
        } else {
            (None, None)
        };

        let external_id = media.tmdb_id.and_then(|id| match id {
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        let title = [media.title, media.original_title, meta.name]
            .into_iter()
            .flatten()
            .find(|t| !t.trim().is_empty());

        Some(RecognizedMedia {
            is_series,
            external_id,
            season,
            episode,
            title,
        })
    }
}

#[async_trait::async_trait]
impl RecognitionService for HttpRecognizeService {
    async fn recognize(&self, filename: &str) -> Option<RecognizedMedia> {
        match self.fetch(filename).await {
            Ok(response) => match Self::digest(response) {
                Some(media) => {
                    info!(
                        "RecognizeService: '{}' -> series={} external_id={:?}",
                        filename, media.is_series, media.external_id
                    );
                    Some(media)
                }
                None => {
                    debug!("RecognizeService: no media info for '{}'", filename);
                    None
                }
            },
            Err(e) => {
                warn!("RecognizeService: recognition unavailable: {}", e);
                None
            }
        }
    }
}
