use chrono::{DateTime, Utc};

/// A blob as shown in the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobSummary {
    /// The blob key, used both as identifier and display name.
    pub name: String,
    /// The size of the blob in bytes.
    pub size: u64,
    /// When the blob was last written.
    pub last_modified: DateTime<Utc>,
}

/// The stored properties needed to serve a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobProperties {
    /// The content type recorded at upload.
    pub content_type: String,
    /// The `filename` metadata recorded at upload.
    pub file_name: Option<String>,
}
