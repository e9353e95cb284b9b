use super::progress::ProgressEmitter;
use crate::config::UploaderConfig;
use crate::resume::{FileIdentity, ResumeStore, ResumeStoreError};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("destination returned server error (HTTP {0})")]
    Server(u16),
    #[error("destination rejected the request (HTTP {0})")]
    Validation(u16),
    #[error("resume record does not match the issued upload session")]
    SessionMismatch,
    #[error("upload cancelled")]
    Cancelled,
    #[error("chunk {chunk_index} failed after {attempts} attempts: {source}")]
    TransferFailed {
        chunk_index: u64,
        attempts: u32,
        source: Box<TransferError>,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("resume store error: {0}")]
    Store(#[from] ResumeStoreError),
}

impl TransferError {
    fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransferError::Timeout
        } else {
            TransferError::Network(error.to_string())
        }
    }

    /// Transient failures eligible for per-chunk retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransferError::Network(_) | TransferError::Timeout | TransferError::Server(_)
        )
    }

    /// Single classified message shown to the user
    pub fn user_message(&self) -> String {
        match self {
            TransferError::Network(_) => {
                "Network connection failed, please check your network".to_string()
            }
            TransferError::Timeout => "Request timed out, please try again later".to_string(),
            TransferError::Server(_) => "Server error, please try again later".to_string(),
            TransferError::Validation(403) => {
                "Insufficient permissions to upload this file".to_string()
            }
            TransferError::Validation(404) => {
                "Upload destination is invalid, please request a new one".to_string()
            }
            TransferError::Validation(422) => {
                "The video is still being composed, please try again later".to_string()
            }
            TransferError::Validation(_) => "Upload failed, please try again later".to_string(),
            TransferError::SessionMismatch => {
                "The previous upload session expired, starting over".to_string()
            }
            TransferError::Cancelled => "Upload cancelled".to_string(),
            TransferError::TransferFailed { .. } => {
                "Upload failed - progress was saved, you can resume".to_string()
            }
            TransferError::Io(_) | TransferError::Store(_) => {
                "Upload failed, please try again later".to_string()
            }
        }
    }
}

/// Destination-facing range upload (allows mocking for tests)
#[async_trait::async_trait]
pub trait RangeUpload: Send + Sync {
    /// PUT one contiguous byte range to the destination URL, returning the
    /// acknowledgement body
    async fn put_range(
        &self,
        url: &str,
        start: u64,
        end: u64,
        total: u64,
        body: &[u8],
    ) -> Result<serde_json::Value, TransferError>;
}

/// Production range upload against a pre-signed destination URL
pub struct HttpRangeUpload {
    http: reqwest::Client,
}

impl HttpRangeUpload {
    pub fn new(timeout: Duration) -> Result<Self, TransferError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransferError::Network(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl RangeUpload for HttpRangeUpload {
    async fn put_range(
        &self,
        url: &str,
        start: u64,
        end: u64,
        total: u64,
        body: &[u8],
    ) -> Result<serde_json::Value, TransferError> {
        let response = self
            .http
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .header(
                reqwest::header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, end, total),
            )
            .body(body.to_vec())
            .send()
            .await
            .map_err(TransferError::from_reqwest)?;

        let status = response.status();
        if status.is_success() {
            let text = response.text().await.map_err(TransferError::from_reqwest)?;
            if text.trim().is_empty() {
                return Ok(serde_json::Value::Null);
            }
            match serde_json::from_str(&text) {
                Ok(value) => Ok(value),
                Err(_) => Ok(serde_json::Value::String(text)),
            }
        } else if status.is_server_error() {
            Err(TransferError::Server(status.as_u16()))
        } else {
            Err(TransferError::Validation(status.as_u16()))
        }
    }
}

/// Number of chunks needed to cover `size` bytes
pub fn chunk_count(size: u64, chunk_size: u64) -> u64 {
    size.div_ceil(chunk_size)
}

/// Inclusive byte range of chunk `index`
pub fn chunk_range(index: u64, size: u64, chunk_size: u64) -> (u64, u64) {
    let start = index * chunk_size;
    let end = (start + chunk_size).min(size) - 1;
    (start, end)
}

/// Human-readable byte count (rounded to two decimals)
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let exp = ((bytes as f64).log2() / 10.0).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exp as i32);
    format!("{} {}", (value * 100.0).round() / 100.0, UNITS[exp])
}

/// Uploads a file to a single-use destination, either whole or as fixed-size
/// ranges with durable per-chunk checkpoints.
///
/// Chunks are strictly sequential: chunk i+1 is never started before chunk i
/// is acknowledged and checkpointed, so at most one chunk is ever in flight
/// and unconfirmed.
pub struct ChunkTransport {
    uploader: Arc<dyn RangeUpload>,
    resume: Arc<ResumeStore>,
    chunk_size: u64,
    min_chunk_size: u64,
    max_attempts: u32,
    retry_base_delay: Duration,
    cancel: CancellationToken,
}

impl ChunkTransport {
    pub fn new(config: &UploaderConfig, resume: Arc<ResumeStore>) -> Result<Self, TransferError> {
        let uploader = Arc::new(HttpRangeUpload::new(config.api_timeout)?);
        Ok(Self::with_uploader(config, resume, uploader))
    }

    /// Build the transport over a custom range uploader
    pub fn with_uploader(
        config: &UploaderConfig,
        resume: Arc<ResumeStore>,
        uploader: Arc<dyn RangeUpload>,
    ) -> Self {
        Self {
            uploader,
            resume,
            chunk_size: config.chunk_size,
            min_chunk_size: config.min_chunk_size,
            max_attempts: config.max_retry_attempts,
            retry_base_delay: config.retry_base_delay,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort handle for the in-flight request. Aborting never rolls back a
    /// checkpointed chunk.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether a file of this size goes through the chunked path
    pub fn is_chunked(&self, size: u64) -> bool {
        size > self.min_chunk_size
    }

    /// Transfer the file to the destination, resuming from `resume_from`
    /// when a prior checkpoint exists. Returns the last acknowledgement body.
    pub async fn transfer(
        &self,
        path: &Path,
        identity: &FileIdentity,
        upload_url: &str,
        resume_from: u64,
        progress: &ProgressEmitter,
    ) -> Result<serde_json::Value, TransferError> {
        if self.is_chunked(identity.size) {
            self.transfer_chunked(path, identity, upload_url, resume_from, progress)
                .await
        } else {
            self.transfer_whole(path, identity, upload_url, progress)
                .await
        }
    }

    /// Single-request transfer for small files; no resumability.
    ///
    /// Progress is request-granular: the body goes out in one buffered PUT,
    /// so only start and completion are observable.
    // TODO: stream the body (reqwest::Body::wrap_stream over a counting
    // reader) to restore intermediate percentages for single-request uploads
    async fn transfer_whole(
        &self,
        path: &Path,
        identity: &FileIdentity,
        upload_url: &str,
        progress: &ProgressEmitter,
    ) -> Result<serde_json::Value, TransferError> {
        let total = identity.size;
        info!(
            "ChunkTransport: whole-file upload of {} ({})",
            identity.name,
            format_size(total)
        );
        progress.uploading(
            format!("Uploading {} in a single request...", format_size(total)),
            Some(0),
        );

        let body = tokio::fs::read(path).await?;
        let end = total.saturating_sub(1);

        let response = tokio::select! {
            _ = self.cancel.cancelled() => return Err(TransferError::Cancelled),
            result = self.uploader.put_range(upload_url, 0, end, total, &body) => result?,
        };

        progress.uploading("Upload finished", Some(100));
        Ok(response)
    }

    async fn transfer_chunked(
        &self,
        path: &Path,
        identity: &FileIdentity,
        upload_url: &str,
        resume_from: u64,
        progress: &ProgressEmitter,
    ) -> Result<serde_json::Value, TransferError> {
        let size = identity.size;
        let chunks = chunk_count(size, self.chunk_size);

        if resume_from > 0 {
            // Re-validate the checkpoint at the moment of use; destinations
            // are single-use, so a missing or mismatched record means the
            // old session is dead and this transfer must not resume
            if self.resume.load(identity, upload_url).await?.is_none() {
                return Err(TransferError::SessionMismatch);
            }
            info!(
                "ChunkTransport: resuming {} at chunk {}/{}",
                identity.name,
                resume_from + 1,
                chunks
            );
        }

        info!(
            "ChunkTransport: chunked upload of {} ({}, {} chunks of {})",
            identity.name,
            format_size(size),
            chunks,
            format_size(self.chunk_size)
        );

        let mut file = tokio::fs::File::open(path).await?;
        file.seek(std::io::SeekFrom::Start(resume_from * self.chunk_size))
            .await?;

        let started = Instant::now();
        let resumed_offset = resume_from * self.chunk_size;
        let mut last_response = serde_json::Value::Null;

        for index in resume_from..chunks {
            let (start, end) = chunk_range(index, size, self.chunk_size);
            let len = (end - start + 1) as usize;
            let mut body = vec![0u8; len];
            file.read_exact(&mut body).await?;

            progress.uploading(
                format!("Uploading chunk {}/{}...", index + 1, chunks),
                Some((start * 100 / size) as u8),
            );
            debug!(
                "ChunkTransport: chunk {}/{}: bytes {}-{}/{}",
                index + 1,
                chunks,
                start,
                end,
                size
            );

            // Only the last chunk's acknowledgement body is retained
            last_response = self
                .send_chunk(upload_url, start, end, size, &body, index)
                .await?;

            // Durable checkpoint before the next chunk begins
            self.resume
                .save(identity, index, chunks, upload_url)
                .await?;

            let uploaded = end + 1;
            let percent = (uploaded * 100 / size) as u8;
            let elapsed = started.elapsed().as_secs_f64().max(0.001);
            let rate = ((uploaded - resumed_offset) as f64 / elapsed) as u64;
            progress.uploading(
                format!(
                    "Uploaded chunk {}/{} ({}/s)",
                    index + 1,
                    chunks,
                    format_size(rate)
                ),
                Some(percent),
            );
        }

        // Full completion clears the checkpoint
        self.resume.clear(identity).await?;
        info!(
            "ChunkTransport: completed {} chunks for {}",
            chunks, identity.name
        );
        Ok(last_response)
    }

    /// Send one chunk with an explicit bounded retry loop; retries apply to
    /// network errors, timeouts and 5xx responses with exponential backoff.
    async fn send_chunk(
        &self,
        url: &str,
        start: u64,
        end: u64,
        total: u64,
        body: &[u8],
        chunk_index: u64,
    ) -> Result<serde_json::Value, TransferError> {
        let mut attempt = 1;
        loop {
            if self.cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }

            let result = tokio::select! {
                _ = self.cancel.cancelled() => return Err(TransferError::Cancelled),
                result = self.uploader.put_range(url, start, end, total, body) => result,
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.retry_base_delay * 2u32.pow(attempt - 1);
                    warn!(
                        "ChunkTransport: chunk {} attempt {}/{} failed ({}), retrying in {:?}",
                        chunk_index + 1,
                        attempt,
                        self.max_attempts,
                        e,
                        delay
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(TransferError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    return Err(TransferError::TransferFailed {
                        chunk_index,
                        attempts: attempt,
                        source: Box::new(e),
                    })
                }
                Err(e) => return Err(e),
            }
        }
    }
}
