use intunepack_graph::ApiError;
use intunepack_transfer::TransferError;

use crate::stage::UploadStage;

/// Errors that abort an upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{stage} gave up after {attempts} attempts")]
    Timeout { stage: UploadStage, attempts: u32 },

    #[error("{stage} failed: server reported {state}")]
    ServerState { stage: UploadStage, state: String },

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("{stage}: response has no {field}")]
    MissingField {
        stage: UploadStage,
        field: &'static str,
    },
}
