// Library exports for integration tests and embedders

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod recognize;
pub mod resume;
pub mod upload;

// Re-export the main entry points at crate root for easier access
pub use config::UploaderConfig;
pub use recognize::{ResolveError, Resolver};
pub use upload::progress::{ProgressEmitter, UploadPhase, UploadProgress};
pub use upload::{SaveOutcome, UploadError, Uploader};
