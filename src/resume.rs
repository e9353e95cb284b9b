use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ResumeStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Deterministic identity of a local file, derived from name, byte size and
/// last-modified time. Any change to size or mtime produces a different
/// identity and therefore invalidates prior upload progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    pub name: String,
    pub size: u64,
    pub modified_ms: i64,
}

impl FileIdentity {
    pub fn new(name: impl Into<String>, size: u64, modified_ms: i64) -> Self {
        Self {
            name: name.into(),
            size,
            modified_ms,
        }
    }

    /// Derive the identity from filesystem metadata
    pub async fn for_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path).await?;
        let modified: DateTime<Utc> = metadata.modified()?.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            name,
            size: metadata.len(),
            modified_ms: modified.timestamp_millis(),
        })
    }

    /// Stable store key for this identity
    pub fn key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}_{}_{}", self.name, self.size, self.modified_ms));
        hex::encode(hasher.finalize())
    }
}

/// Durable checkpoint for a chunked transfer. The expiry is carried inside
/// the payload (`recorded_at` plus the staleness window), not by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResumeRecord {
    pub file_key: String,
    /// Last chunk index confirmed by the destination
    pub chunk_index: u64,
    pub chunk_count: u64,
    /// Destination the progress was made against; single-use, so any
    /// mismatch means the progress is dead
    pub upload_url: String,
    pub recorded_at: DateTime<Utc>,
}

/// Durable store mapping file identity to last-confirmed chunk progress.
///
/// One JSON file per identity key, so unrelated concurrent uploads never
/// collide. `load` enforces the three-way validity check (identity,
/// destination, freshness) and discards the record on any violation rather
/// than returning a partially-valid one.
pub struct ResumeStore {
    dir: PathBuf,
    max_age: chrono::Duration,
}

impl ResumeStore {
    pub fn new(dir: impl Into<PathBuf>, max_age: chrono::Duration) -> Result<Self, ResumeStoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, max_age })
    }

    fn record_path(&self, identity: &FileIdentity) -> PathBuf {
        self.dir.join(format!("{}.resume.json", identity.key()))
    }

    /// Persist a checkpoint. Must complete before the next chunk begins.
    pub async fn save(
        &self,
        identity: &FileIdentity,
        chunk_index: u64,
        chunk_count: u64,
        upload_url: &str,
    ) -> Result<(), ResumeStoreError> {
        let record = ResumeRecord {
            file_key: identity.key(),
            chunk_index,
            chunk_count,
            upload_url: upload_url.to_string(),
            recorded_at: Utc::now(),
        };

        let bytes = serde_json::to_vec(&record)?;
        fs::write(self.record_path(identity), bytes).await?;
        debug!(
            "ResumeStore: checkpointed chunk {}/{} for {}",
            chunk_index + 1,
            chunk_count,
            identity.name
        );
        Ok(())
    }

    /// Load a usable checkpoint, or `None` when no valid one exists.
    pub async fn load(
        &self,
        identity: &FileIdentity,
        upload_url: &str,
    ) -> Result<Option<ResumeRecord>, ResumeStoreError> {
        let path = self.record_path(identity);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: ResumeRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                warn!("ResumeStore: discarding corrupt record: {}", e);
                self.clear(identity).await?;
                return Ok(None);
            }
        };

        if record.file_key != identity.key() {
            warn!("ResumeStore: record key does not match file, discarding");
            self.clear(identity).await?;
            return Ok(None);
        }

        if Utc::now() - record.recorded_at >= self.max_age {
            info!("ResumeStore: record for {} is stale, discarding", identity.name);
            self.clear(identity).await?;
            return Ok(None);
        }

        if record.upload_url != upload_url {
            warn!("ResumeStore: upload destination changed, discarding stale progress");
            self.clear(identity).await?;
            return Ok(None);
        }

        Ok(Some(record))
    }

    /// Remove any checkpoint for this file
    pub async fn clear(&self, identity: &FileIdentity) -> Result<(), ResumeStoreError> {
        match fs::remove_file(self.record_path(identity)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
