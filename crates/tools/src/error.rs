//! Error types for downloads, archives and tool provisioning.

use std::path::PathBuf;

/// Errors from HTTP file downloads.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("download of {url} failed with status {status}")]
    Status { status: u16, url: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive entry escapes destination: {0}")]
    UnsafeEntry(String),
}

/// A packaging dependency could not be made available.
#[derive(Debug, thiserror::Error)]
pub enum ToolProvisioningError {
    #[error("download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("extraction failed: {0}")]
    Archive(#[from] ArchiveError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("required tool still missing after provisioning: {}", .0.display())]
    Missing(PathBuf),

    #[error("background task failed: {0}")]
    Join(String),
}
