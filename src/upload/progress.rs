use tokio::sync::mpsc;

/// Pipeline phase carried with every progress update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Uploading,
    Success,
    Error,
}

/// One progress update published during an upload
#[derive(Debug, Clone)]
pub struct UploadProgress {
    pub message: String,
    pub phase: UploadPhase,
    /// Transfer completion percentage, when known
    pub percent: Option<u8>,
}

/// Publisher half of the progress channel. Consumers subscribe for the
/// duration of one upload call; a dropped receiver is never an error.
#[derive(Clone)]
pub struct ProgressEmitter {
    tx: Option<mpsc::UnboundedSender<UploadProgress>>,
}

impl ProgressEmitter {
    /// Create an emitter together with its subscriber side
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UploadProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Emitter that drops every update, for callers that don't subscribe
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn uploading(&self, message: impl Into<String>, percent: Option<u8>) {
        self.send(UploadProgress {
            message: message.into(),
            phase: UploadPhase::Uploading,
            percent,
        });
    }

    pub fn success(&self, message: impl Into<String>) {
        self.send(UploadProgress {
            message: message.into(),
            phase: UploadPhase::Success,
            percent: Some(100),
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(UploadProgress {
            message: message.into(),
            phase: UploadPhase::Error,
            percent: None,
        });
    }

    fn send(&self, progress: UploadProgress) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(progress);
        }
    }
}
