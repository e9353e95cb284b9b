// In-memory doubles for the network-facing seams, so the resolver and
// uploader can be exercised without any real endpoints.
// Each test binary uses its own subset of these.
#![allow(dead_code)]

use emos_uploader::api::{ApiError, CatalogLookup, UploadBackend};
use emos_uploader::auth::AuthProvider;
use emos_uploader::models::{
    CatalogEntry, ExactLookupResult, SaveRequest, SlotRequest, UploadSlot,
};
use emos_uploader::recognize::client::{RecognitionService, RecognizedMedia};
use emos_uploader::upload::transport::{RangeUpload, TransferError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Auth provider with a fixed token state and a call counter, used to
/// assert that unauthenticated flows never reach the network
pub struct MockAuth {
    token: Option<String>,
}

impl MockAuth {
    pub fn signed_in() -> Self {
        Self {
            token: Some("test-token".to_string()),
        }
    }

    pub fn signed_out() -> Self {
        Self { token: None }
    }
}

impl AuthProvider for MockAuth {
    fn token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Recognition service returning a canned answer
pub struct MockRecognition {
    answer: Option<RecognizedMedia>,
    pub calls: AtomicUsize,
}

impl MockRecognition {
    pub fn with_answer(answer: RecognizedMedia) -> Self {
        Self {
            answer: Some(answer),
            calls: AtomicUsize::new(0),
        }
    }

    /// Service that never recognizes anything
    pub fn unavailable() -> Self {
        Self {
            answer: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RecognitionService for MockRecognition {
    async fn recognize(&self, _filename: &str) -> Option<RecognizedMedia> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

/// Catalog with canned search results and exact-lookup answers
pub struct MockCatalog {
    search_results: Vec<CatalogEntry>,
    lookup_result: Option<ExactLookupResult>,
    fail_lookup: bool,
    pub search_calls: AtomicUsize,
    pub lookup_calls: AtomicUsize,
}

impl MockCatalog {
    pub fn empty() -> Self {
        Self {
            search_results: Vec::new(),
            lookup_result: None,
            fail_lookup: false,
            search_calls: AtomicUsize::new(0),
            lookup_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_search_results(entries: Vec<CatalogEntry>) -> Self {
        Self {
            search_results: entries,
            ..Self::empty()
        }
    }

    pub fn with_lookup(mut self, result: ExactLookupResult) -> Self {
        self.lookup_result = Some(result);
        self
    }

    /// Make every exact lookup fail with a server error
    pub fn failing_lookup(mut self) -> Self {
        self.fail_lookup = true;
        self
    }

    pub fn search_count(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_count(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::empty()
    }
}

#[async_trait::async_trait]
impl CatalogLookup for MockCatalog {
    async fn search_by_title(&self, _title: &str) -> Result<Vec<CatalogEntry>, ApiError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.search_results.clone())
    }

    async fn lookup_by_external_id(
        &self,
        _id_type: &str,
        _id_value: &str,
        _episode: Option<(u32, u32)>,
    ) -> Result<ExactLookupResult, ApiError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookup {
            return Err(ApiError::Server(500));
        }
        match &self.lookup_result {
            Some(result) => Ok(result.clone()),
            None => Ok(ExactLookupResult::default()),
        }
    }
}

/// Range uploader that assembles received bytes in memory.
///
/// Failure injection is keyed by range start offset: each configured
/// offset rejects that many attempts with a retryable server error
/// before any bytes are recorded.
pub struct MockRangeUpload {
    received: Mutex<Vec<(u64, u64, Vec<u8>)>>,
    failures: Mutex<HashMap<u64, u32>>,
    pub calls: AtomicUsize,
}

impl MockRangeUpload {
    pub fn new() -> Self {
        Self {
            received: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail `times` attempts against the range starting at `offset`
    pub fn failing_at(offset: u64, times: u32) -> Self {
        let mock = Self::new();
        mock.failures.lock().unwrap().insert(offset, times);
        mock
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Ranges acknowledged so far, in arrival order
    pub fn ranges(&self) -> Vec<(u64, u64)> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .map(|(start, end, _)| (*start, *end))
            .collect()
    }

    /// Reassemble the acknowledged ranges into one buffer
    pub fn assembled(&self, total: usize) -> Vec<u8> {
        let mut out = vec![0u8; total];
        for (start, _end, body) in self.received.lock().unwrap().iter() {
            let start = *start as usize;
            out[start..start + body.len()].copy_from_slice(body);
        }
        out
    }
}

impl Default for MockRangeUpload {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RangeUpload for MockRangeUpload {
    async fn put_range(
        &self,
        _url: &str,
        start: u64,
        end: u64,
        _total: u64,
        body: &[u8],
    ) -> Result<serde_json::Value, TransferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(remaining) = self.failures.lock().unwrap().get_mut(&start) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TransferError::Server(502));
            }
        }

        self.received
            .lock()
            .unwrap()
            .push((start, end, body.to_vec()));
        Ok(serde_json::json!({ "received": end + 1 }))
    }
}

/// Upload backend recording every call it sees
pub struct MockBackend {
    slot: UploadSlot,
    fail_base: bool,
    pub base_calls: AtomicUsize,
    pub slot_calls: AtomicUsize,
    pub slot_requests: Mutex<Vec<SlotRequest>>,
    pub saved_videos: Mutex<Vec<SaveRequest>>,
    pub saved_subtitles: Mutex<Vec<SaveRequest>>,
}

impl MockBackend {
    pub fn new(file_id: &str, upload_url: &str) -> Self {
        Self {
            slot: UploadSlot {
                file_id: file_id.to_string(),
                upload_url: upload_url.to_string(),
            },
            fail_base: false,
            base_calls: AtomicUsize::new(0),
            slot_calls: AtomicUsize::new(0),
            slot_requests: Mutex::new(Vec::new()),
            saved_videos: Mutex::new(Vec::new()),
            saved_subtitles: Mutex::new(Vec::new()),
        }
    }

    /// Make the upload precheck reject the target
    pub fn rejecting_base(mut self) -> Self {
        self.fail_base = true;
        self
    }
}

#[async_trait::async_trait]
impl UploadBackend for MockBackend {
    async fn upload_base(&self, _item_type: &str, _item_id: &str) -> Result<(), ApiError> {
        self.base_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_base {
            return Err(ApiError::Validation {
                status: 404,
                message: "target not found".to_string(),
            });
        }
        Ok(())
    }

    async fn request_slot(&self, request: &SlotRequest) -> Result<UploadSlot, ApiError> {
        self.slot_calls.fetch_add(1, Ordering::SeqCst);
        self.slot_requests.lock().unwrap().push(request.clone());
        Ok(self.slot.clone())
    }

    async fn save_video(&self, request: &SaveRequest) -> Result<serde_json::Value, ApiError> {
        self.saved_videos.lock().unwrap().push(request.clone());
        Ok(serde_json::json!({ "status": "ok" }))
    }

    async fn save_subtitle(&self, request: &SaveRequest) -> Result<serde_json::Value, ApiError> {
        self.saved_subtitles.lock().unwrap().push(request.clone());
        Ok(serde_json::json!({ "status": "ok" }))
    }
}
