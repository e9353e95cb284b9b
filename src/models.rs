use serde::{Deserialize, Serialize};

/// Kind of catalog item an upload is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    /// A standalone item (movie / single video list entry)
    #[serde(rename = "vl")]
    Single,
    /// A specific episode of a series
    #[serde(rename = "ve")]
    Episode,
}

impl ItemKind {
    /// Wire value used in API payloads
    pub fn as_wire(&self) -> &'static str {
        match self {
            ItemKind::Single => "vl",
            ItemKind::Episode => "ve",
        }
    }
}

/// Result of resolving a filename to a catalog target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    /// Catalog item ID the file belongs to
    pub item_id: String,
    pub kind: ItemKind,
    /// Display title for progress messages
    pub title: String,
    /// Grouping ID carried through subtitle saves when available
    pub grouping_id: Option<String>,
}

/// Server-issued upload slot: single-use destination plus file identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSlot {
    pub file_id: String,
    pub upload_url: String,
}

/// One entry from a catalog title search
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub video_id: String,
    pub video_title: String,
    /// "vl" for standalone items, "tv" for series
    pub video_type: String,
    #[serde(default)]
    pub tmdb_id: Option<String>,
    #[serde(default)]
    pub todb_id: Option<String>,
}

/// Episode details returned by an exact catalog lookup
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EpisodeInfo {
    pub item_id: String,
    #[serde(default)]
    pub episode_title: Option<String>,
}

/// Response of an exact catalog lookup by external ID
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct ExactLookupResult {
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub video_title: Option<String>,
    #[serde(default)]
    pub episode_info: Option<EpisodeInfo>,
}

/// Upload category inferred from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Video,
    Subtitle,
    Image,
}

impl UploadKind {
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.to_lowercase();
        match ext.as_str() {
            "srt" | "ass" | "ssa" | "vtt" => UploadKind::Subtitle,
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" => UploadKind::Image,
            _ => UploadKind::Video,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            UploadKind::Video => "video",
            UploadKind::Subtitle => "subtitle",
            UploadKind::Image => "image",
        }
    }
}

/// MIME type sent with slot requests, keyed by file extension
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "mp4" | "mkv" | "avi" => "video/mp4",
        "mov" => "video/quicktime",
        "srt" => "application/x-subrip",
        "ass" => "text/x-ssa",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Payload for requesting an upload slot
#[derive(Debug, Clone, Serialize)]
pub struct SlotRequest {
    #[serde(rename = "type")]
    pub upload_type: String,
    pub file_type: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_storage: String,
}

/// Payload binding an uploaded file to its catalog target
#[derive(Debug, Clone, Serialize)]
pub struct SaveRequest {
    pub item_type: String,
    pub item_id: String,
    pub file_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_uuid: Option<String>,
}
