use intunepack_graph::ApiError;
use intunepack_packager::PackagingError;
use intunepack_protocol::JobValidationError;
use intunepack_tools::{DownloadError, ToolProvisioningError};
use intunepack_transfer::{IntegrityError, TransferError};
use intunepack_uploader::UploadError;

/// Why a job did not reach `deployed`.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Invalid(#[from] JobValidationError),

    #[error("working directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("tool provisioning failed: {0}")]
    Tools(#[from] ToolProvisioningError),

    #[error("installer download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("installer rejected: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("installer verification failed: {0}")]
    Transfer(TransferError),

    #[error("packaging failed: {0}")]
    Packaging(#[from] PackagingError),

    #[error("graph connection failed: {0}")]
    Graph(#[from] ApiError),

    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),

    /// The app was uploaded but the control plane never heard `deployed`.
    #[error("failed to report deployment: {0}")]
    Report(ApiError),

    #[error("cancelled")]
    Cancelled,

    #[error("background task failed: {0}")]
    Join(String),
}

impl From<TransferError> for JobError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Integrity(e) => Self::Integrity(e),
            other => Self::Transfer(other),
        }
    }
}
