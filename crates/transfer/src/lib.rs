//! Installer integrity checks and block-blob chunking.
//!
//! The verifier streams a file through SHA-256; the block helpers split an
//! artifact into fixed-size blocks with stable ids for a block-blob upload.

mod blocklist;
mod chunked;
mod types;

pub use blocklist::{block_id, block_list_xml};
pub use chunked::{BlockReader, calculate_file_checksum, checksum_bytes, verify_file_checksum};
pub use types::{Block, BlockPlan};

/// Block size for block-blob uploads: 6 MiB.
pub const DEFAULT_BLOCK_SIZE: usize = 6 * 1024 * 1024;

/// Installer bytes do not hash to the expected digest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("checksum mismatch: expected {expected}, got {actual}")]
pub struct IntegrityError {
    pub expected: String,
    pub actual: String,
}

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error("block {index} out of range ({count} blocks)")]
    BlockOutOfRange { index: usize, count: usize },
}
