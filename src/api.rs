use crate::auth::AuthProvider;
use crate::cache::{CacheConfig, ResponseCache};
use crate::config::UploaderConfig;
use crate::models::{CatalogEntry, ExactLookupResult, SaveRequest, SlotRequest, UploadSlot};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from backend API calls. The kind is determined once from the HTTP
/// status or the transport failure, never re-derived from message text.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("authentication required")]
    Auth,
    #[error("server error (HTTP {0})")]
    Server(u16),
    #[error("request rejected (HTTP {status}): {message}")]
    Validation { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl ApiError {
    fn from_status(status: u16, message: Option<String>) -> Self {
        match status {
            401 => ApiError::Auth,
            422 => ApiError::Validation {
                status,
                message: message
                    .unwrap_or_else(|| "the video is still being composed".to_string()),
            },
            400..=499 => ApiError::Validation {
                status,
                message: message.unwrap_or_else(|| format!("HTTP {}", status)),
            },
            500..=599 => ApiError::Server(status),
            _ => ApiError::Unexpected(format!("HTTP {}", status)),
        }
    }

    fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(error.to_string())
        }
    }

    /// Transient failures eligible for local retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::Network(_) | ApiError::Timeout | ApiError::Server(_)
        )
    }

    /// Single classified message shown to the user
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => {
                "Network connection failed, please check your network".to_string()
            }
            ApiError::Timeout => "Request timed out, please try again later".to_string(),
            ApiError::Auth => "Authentication failed, please sign in again".to_string(),
            ApiError::Server(_) => "Server error, please try again later".to_string(),
            ApiError::Validation { status: 403, .. } => {
                "Insufficient permissions for this operation".to_string()
            }
            ApiError::Validation { status: 404, .. } => {
                "The requested resource does not exist".to_string()
            }
            ApiError::Validation { status: 422, .. } => {
                "The video is still being composed, please try again later".to_string()
            }
            ApiError::Validation { message, .. } => message.clone(),
            ApiError::Unexpected(_) => "Upload failed, please try again later".to_string(),
        }
    }
}

/// Catalog operations the resolver depends on (allows mocking for tests)
#[async_trait::async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Paginated title search; first page only, fixed page size
    async fn search_by_title(&self, title: &str) -> Result<Vec<CatalogEntry>, ApiError>;

    /// Exact lookup by external cross-reference ID, optionally narrowed to a
    /// specific season/episode
    async fn lookup_by_external_id(
        &self,
        id_type: &str,
        id_value: &str,
        episode: Option<(u32, u32)>,
    ) -> Result<ExactLookupResult, ApiError>;
}

/// Upload-facing backend operations (allows mocking for tests)
#[async_trait::async_trait]
pub trait UploadBackend: Send + Sync {
    /// Precheck that the catalog target can accept an upload
    async fn upload_base(&self, item_type: &str, item_id: &str) -> Result<(), ApiError>;

    /// Request a single-use upload slot for a file
    async fn request_slot(&self, request: &SlotRequest) -> Result<UploadSlot, ApiError>;

    async fn save_video(&self, request: &SaveRequest) -> Result<serde_json::Value, ApiError>;

    async fn save_subtitle(&self, request: &SaveRequest) -> Result<serde_json::Value, ApiError>;
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct SlotResponse {
    file_id: String,
    data: SlotData,
}

#[derive(Debug, Deserialize)]
struct SlotData {
    upload_url: String,
}

/// JSON-over-HTTPS client for the backend API.
///
/// Every call carries the bearer token from the injected [`AuthProvider`],
/// a bounded wall-clock timeout, and an explicit retry loop for transient
/// failures. Idempotent GET responses go through a bounded in-memory cache.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<dyn AuthProvider>,
    cache: ResponseCache,
    max_attempts: u32,
    retry_base_delay: Duration,
    page_size: u32,
}

impl ApiClient {
    pub fn new(config: &UploaderConfig, auth: Arc<dyn AuthProvider>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.api_timeout)
            .build()
            .map_err(|e| ApiError::Unexpected(format!("failed to create HTTP client: {}", e)))?;

        Ok(ApiClient {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth,
            cache: ResponseCache::new(CacheConfig {
                expiry: config.cache_expiry,
                capacity: config.cache_capacity,
            }),
            max_attempts: config.max_retry_attempts,
            retry_base_delay: config.retry_base_delay,
            page_size: config.search_page_size,
        })
    }

    /// Invalidate the whole response cache. Must be called whenever
    /// session/auth state changes.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Invalidate cached responses for one endpoint
    pub async fn clear_cache_for(&self, endpoint: &str) {
        self.cache.clear_prefix(endpoint).await;
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header("X-API-Client", "emos-uploader");
        match self.auth.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// GET with response caching
    async fn get_json(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, ApiError> {
        let cache_key = Self::cache_key(endpoint, query);
        if let Some(cached) = self.cache.get(&cache_key).await {
            return Ok(cached);
        }

        let url = format!("{}{}", self.base_url, endpoint);
        let value = self
            .send_with_retry(|| self.authorize(self.http.get(&url).query(query)))
            .await?;

        self.cache.put(&cache_key, value.clone()).await;
        Ok(value)
    }

    /// POST, never cached
    async fn post_json(
        &self,
        endpoint: &str,
        body: &impl serde::Serialize,
    ) -> Result<serde_json::Value, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        self.send_with_retry(|| self.authorize(self.http.post(&url).json(body)))
            .await
    }

    fn cache_key(endpoint: &str, query: &[(&str, String)]) -> String {
        let mut key = endpoint.to_string();
        for (name, value) in query {
            key.push_str(&format!("&{}={}", name, value));
        }
        key
    }

    /// Explicit retry loop with attempt counter and exponential backoff.
    /// Only network errors, timeouts and 5xx responses are retried.
    async fn send_with_retry<F>(&self, make_request: F) -> Result<serde_json::Value, ApiError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            debug!("ApiClient: request attempt {}/{}", attempt, self.max_attempts);

            let result = match make_request().send().await {
                Ok(response) => Self::parse_response(response).await,
                Err(e) => Err(ApiError::from_reqwest(e)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.retry_base_delay * 2u32.pow(attempt - 1);
                    warn!(
                        "ApiClient: attempt {}/{} failed ({}), retrying in {:?}",
                        attempt, self.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn parse_response(response: reqwest::Response) -> Result<serde_json::Value, ApiError> {
        let status = response.status();
        if status.is_success() {
            let text = response.text().await.map_err(ApiError::from_reqwest)?;
            if text.trim().is_empty() {
                return Ok(serde_json::Value::Null);
            }
            match serde_json::from_str(&text) {
                Ok(value) => Ok(value),
                Err(_) => Ok(serde_json::Value::String(text)),
            }
        } else {
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| {
                    body.get("message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                });
            Err(ApiError::from_status(status.as_u16(), message))
        }
    }
}

#[async_trait::async_trait]
impl CatalogLookup for ApiClient {
    async fn search_by_title(&self, title: &str) -> Result<Vec<CatalogEntry>, ApiError> {
        info!("ApiClient: searching catalog for '{}'", title);

        let value = self
            .get_json(
                "/api/video/list",
                &[
                    ("title", title.to_string()),
                    ("page", "1".to_string()),
                    ("page_size", self.page_size.to_string()),
                ],
            )
            .await?;

        let list: ListResponse = serde_json::from_value(value)
            .map_err(|e| ApiError::Unexpected(format!("malformed search response: {}", e)))?;
        Ok(list.items)
    }

    async fn lookup_by_external_id(
        &self,
        id_type: &str,
        id_value: &str,
        episode: Option<(u32, u32)>,
    ) -> Result<ExactLookupResult, ApiError> {
        let mut query = vec![
            ("video_id_type", id_type.to_string()),
            ("video_id_value", id_value.to_string()),
        ];
        if let Some((season, episode)) = episode {
            query.push(("season_number", season.to_string()));
            query.push(("episode_number", episode.to_string()));
        }

        let value = self.get_json("/api/video/getVideoId", &query).await?;
        serde_json::from_value(value)
            .map_err(|e| ApiError::Unexpected(format!("malformed lookup response: {}", e)))
    }
}

#[async_trait::async_trait]
impl UploadBackend for ApiClient {
    async fn upload_base(&self, item_type: &str, item_id: &str) -> Result<(), ApiError> {
        self.get_json(
            "/api/upload/video/base",
            &[
                ("item_type", item_type.to_string()),
                ("item_id", item_id.to_string()),
            ],
        )
        .await?;
        Ok(())
    }

    async fn request_slot(&self, request: &SlotRequest) -> Result<UploadSlot, ApiError> {
        info!(
            "ApiClient: requesting upload slot for '{}' ({} bytes)",
            request.file_name, request.file_size
        );

        let value = self.post_json("/api/upload/getUploadToken", request).await?;
        let slot: SlotResponse = serde_json::from_value(value)
            .map_err(|e| ApiError::Unexpected(format!("malformed slot response: {}", e)))?;

        Ok(UploadSlot {
            file_id: slot.file_id,
            upload_url: slot.data.upload_url,
        })
    }

    async fn save_video(&self, request: &SaveRequest) -> Result<serde_json::Value, ApiError> {
        self.post_json("/api/upload/video/save", request).await
    }

    async fn save_subtitle(&self, request: &SaveRequest) -> Result<serde_json::Value, ApiError> {
        self.post_json("/api/upload/subtitle/save", request).await
    }
}
