pub mod progress;
pub mod transport;

use crate::api::{ApiClient, ApiError, CatalogLookup, UploadBackend};
use crate::auth::AuthProvider;
use crate::config::UploaderConfig;
use crate::models::{
    mime_for_extension, RecognitionResult, SaveRequest, SlotRequest, UploadKind,
};
use crate::recognize::client::{HttpRecognizeService, RecognitionService, RecognizeClientError};
use crate::recognize::overrides::{ManualOverrideMap, OverrideEntry, OverrideError};
use crate::recognize::{ResolveError, Resolver};
use crate::resume::{FileIdentity, ResumeStore, ResumeStoreError};
use progress::ProgressEmitter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use transport::{ChunkTransport, TransferError};

#[derive(Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error("resume store error: {0}")]
    Store(#[from] ResumeStoreError),
    #[error("override store error: {0}")]
    Overrides(#[from] OverrideError),
    #[error("recognition client error: {0}")]
    Recognize(#[from] RecognizeClientError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("'{}' has no file name", .0.display())]
    InvalidPath(PathBuf),
}

impl UploadError {
    /// Single classified message shown to the user
    pub fn user_message(&self) -> String {
        match self {
            UploadError::Resolve(e) => e.user_message(),
            UploadError::Api(e) => e.user_message(),
            UploadError::Transfer(e) => e.user_message(),
            UploadError::Store(_) | UploadError::Overrides(_) | UploadError::Recognize(_) => {
                "Upload failed, please try again later".to_string()
            }
            UploadError::Io(_) => "Could not read the file, please check it exists".to_string(),
            UploadError::InvalidPath(_) => "The selected path is not a file".to_string(),
        }
    }
}

/// Result of a completed upload: the catalog target it was bound to plus
/// the server's save acknowledgement
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub item_id: String,
    pub kind: UploadKind,
    pub title: String,
    pub response: serde_json::Value,
}

/// Drives a single file from filename to registered catalog media:
/// resolve the target, precheck it, obtain a slot, transfer the bytes
/// (resuming when a fresh checkpoint matches the issued destination),
/// then bind the file to the target.
pub struct Uploader {
    resolver: Resolver,
    backend: Arc<dyn UploadBackend>,
    transport: ChunkTransport,
    overrides: Arc<ManualOverrideMap>,
    resume: Arc<ResumeStore>,
}

impl Uploader {
    pub async fn new(
        config: &UploaderConfig,
        auth: Arc<dyn AuthProvider>,
    ) -> Result<Self, UploadError> {
        let api = Arc::new(ApiClient::new(config, auth.clone())?);
        let recognition = Arc::new(HttpRecognizeService::new(config)?);
        let overrides = Arc::new(ManualOverrideMap::load(&config.state_dir).await?);
        let resume = Arc::new(ResumeStore::new(
            config.state_dir.join("resume"),
            config.resume_max_age,
        )?);
        let transport = ChunkTransport::new(config, resume.clone())?;

        Ok(Self::from_parts(
            auth,
            recognition,
            api.clone(),
            api,
            overrides,
            resume,
            transport,
        ))
    }

    /// Assemble the uploader from individual seams, for tests and embedders
    pub fn from_parts(
        auth: Arc<dyn AuthProvider>,
        recognition: Arc<dyn RecognitionService>,
        catalog: Arc<dyn CatalogLookup>,
        backend: Arc<dyn UploadBackend>,
        overrides: Arc<ManualOverrideMap>,
        resume: Arc<ResumeStore>,
        transport: ChunkTransport,
    ) -> Self {
        Self {
            resolver: Resolver::new(auth, recognition, catalog, overrides.clone()),
            backend,
            transport,
            overrides,
            resume,
        }
    }

    /// Abort handle for the in-flight transfer; checkpointed chunks survive
    pub fn cancellation_token(&self) -> CancellationToken {
        self.transport.cancellation_token()
    }

    /// Resolve a filename to its catalog target without uploading anything
    pub async fn resolve(&self, filename: &str) -> Result<RecognitionResult, ResolveError> {
        self.resolver.resolve(filename).await
    }

    /// Pin a filename to a catalog target, bypassing recognition on the
    /// next upload
    pub async fn add_manual_override(
        &self,
        filename: &str,
        entry: OverrideEntry,
    ) -> Result<(), UploadError> {
        self.overrides.insert(filename, entry).await?;
        Ok(())
    }

    pub async fn remove_manual_override(&self, filename: &str) -> Result<(), UploadError> {
        self.overrides.remove(filename).await?;
        Ok(())
    }

    pub async fn upload(&self, path: &Path) -> Result<SaveOutcome, UploadError> {
        self.upload_with_progress(path, &ProgressEmitter::disabled())
            .await
    }

    /// Upload with live progress updates. The final update always reflects
    /// the outcome: Success on completion, Error with the classified
    /// message otherwise.
    pub async fn upload_with_progress(
        &self,
        path: &Path,
        progress: &ProgressEmitter,
    ) -> Result<SaveOutcome, UploadError> {
        let result = self.run_upload(path, progress).await;
        match &result {
            Ok(outcome) => progress.success(format!("'{}' uploaded", outcome.title)),
            Err(e) => progress.error(e.user_message()),
        }
        result
    }

    async fn run_upload(
        &self,
        path: &Path,
        progress: &ProgressEmitter,
    ) -> Result<SaveOutcome, UploadError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| UploadError::InvalidPath(path.to_path_buf()))?;
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let kind = UploadKind::from_extension(&extension);

        progress.uploading(format!("Recognizing '{}'...", file_name), None);
        let target = self.resolver.resolve(&file_name).await?;
        info!(
            "Uploader: '{}' resolved to {} item {} ('{}')",
            file_name,
            target.kind.as_wire(),
            target.item_id,
            target.title
        );

        // Precheck before touching any bytes; a rejected target fails fast
        progress.uploading(format!("Preparing upload for '{}'...", target.title), None);
        self.backend
            .upload_base(target.kind.as_wire(), &target.item_id)
            .await?;

        let identity = FileIdentity::for_path(path).await?;
        let slot = self
            .backend
            .request_slot(&SlotRequest {
                upload_type: kind.as_wire().to_string(),
                file_type: mime_for_extension(&extension).to_string(),
                file_name: file_name.clone(),
                file_size: identity.size,
                file_storage: "default".to_string(),
            })
            .await?;

        // A checkpoint is only honored when it names the destination the
        // server just issued; anything else starts over from chunk zero
        let resume_from = match self.resume.load(&identity, &slot.upload_url).await? {
            Some(record) => {
                info!(
                    "Uploader: resuming '{}' after chunk {}/{}",
                    file_name,
                    record.chunk_index + 1,
                    record.chunk_count
                );
                progress.uploading(
                    format!(
                        "Resuming from chunk {}/{}...",
                        record.chunk_index + 2,
                        record.chunk_count
                    ),
                    None,
                );
                record.chunk_index + 1
            }
            None => 0,
        };

        let ack = self
            .transport
            .transfer(path, &identity, &slot.upload_url, resume_from, progress)
            .await?;
        debug!("Uploader: destination acknowledged with {}", ack);

        progress.uploading("Registering the upload...", Some(100));
        let save = SaveRequest {
            item_type: target.kind.as_wire().to_string(),
            item_id: target.item_id.clone(),
            file_id: slot.file_id.clone(),
            media_uuid: match kind {
                UploadKind::Subtitle => target.grouping_id.clone(),
                _ => None,
            },
        };
        let response = match kind {
            UploadKind::Subtitle => self.backend.save_subtitle(&save).await?,
            _ => self.backend.save_video(&save).await?,
        };

        Ok(SaveOutcome {
            item_id: target.item_id,
            kind,
            title: target.title,
            response,
        })
    }
}
