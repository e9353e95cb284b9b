use std::path::PathBuf;
use std::time::Duration;

/// Client configuration
/// In debug builds: loads overrides from a .env file
/// In release builds: environment variables only
#[derive(Clone, Debug)]
pub struct UploaderConfig {
    /// Backend API base URL
    pub base_url: String,
    /// Recognition service endpoint
    pub recognize_url: String,
    /// Size of each upload chunk in bytes (default: 100MiB)
    pub chunk_size: u64,
    /// Files at or below this size are uploaded in a single request (default: 50MiB)
    pub min_chunk_size: u64,
    /// Wall-clock timeout for backend API calls
    pub api_timeout: Duration,
    /// Wall-clock timeout for recognition service calls
    pub recognize_timeout: Duration,
    /// Maximum attempts for retryable network operations
    pub max_retry_attempts: u32,
    /// Base delay before the first retry (doubles per attempt)
    pub retry_base_delay: Duration,
    /// Per-entry expiry for cached GET responses
    pub cache_expiry: Duration,
    /// Maximum number of cached GET responses before oldest-entry eviction
    pub cache_capacity: usize,
    /// Resume records older than this are discarded
    pub resume_max_age: chrono::Duration,
    /// Page size for catalog title searches
    pub search_page_size: u32,
    /// Directory for durable client-side state (resume records, manual overrides)
    pub state_dir: PathBuf,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir().expect("Failed to get home directory");
        UploaderConfig {
            base_url: "https://emos.best".to_string(),
            recognize_url: "https://emos.prlo.de/api/recognize".to_string(),
            chunk_size: 100 * 1024 * 1024,
            min_chunk_size: 50 * 1024 * 1024,
            api_timeout: Duration::from_secs(30),
            recognize_timeout: Duration::from_secs(5),
            max_retry_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
            cache_expiry: Duration::from_secs(5 * 60),
            cache_capacity: 50,
            resume_max_age: chrono::Duration::hours(24),
            search_page_size: 15,
            state_dir: home_dir.join(".emos-uploader"),
        }
    }
}

impl UploaderConfig {
    /// Load configuration from the environment
    pub fn load() -> Self {
        #[cfg(debug_assertions)]
        {
            if dotenvy::dotenv().is_ok() {
                tracing::info!("Config: Dev mode activated - loaded .env file");
            }
        }

        Self::from_env()
    }

    /// Load configuration from environment variables, falling back to defaults
    fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("EMOS_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(url) = std::env::var("EMOS_RECOGNIZE_URL") {
            config.recognize_url = url;
        }
        if let Ok(dir) = std::env::var("EMOS_STATE_DIR") {
            config.state_dir = PathBuf::from(dir);
        }
        if let Ok(size) = std::env::var("EMOS_CHUNK_SIZE") {
            if let Ok(size) = size.parse() {
                config.chunk_size = size;
            }
        }

        config
    }
}
