use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::types::{Block, BlockPlan};
use crate::{IntegrityError, TransferError, blocklist::block_id};

const HASH_BUFFER_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes SHA-256 of an entire file and returns the hex-encoded digest.
///
/// The file is streamed so memory use stays flat for large installers.
pub fn calculate_file_checksum(path: &Path) -> Result<String, TransferError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Verifies `path` against an expected hex SHA-256, ignoring case.
///
/// `None` or a blank string skips verification.
pub fn verify_file_checksum(path: &Path, expected: Option<&str>) -> Result<(), TransferError> {
    let Some(expected) = expected.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(());
    };

    let actual = calculate_file_checksum(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(IntegrityError {
            expected: expected.to_ascii_lowercase(),
            actual,
        }
        .into())
    }
}

// ---------------------------------------------------------------------------
// BlockReader
// ---------------------------------------------------------------------------

/// Reads a file in fixed-size blocks by index.
pub struct BlockReader {
    file: std::fs::File,
    plan: BlockPlan,
}

impl BlockReader {
    /// Opens `path` for block reading.
    ///
    /// If `block_size` is 0, [`DEFAULT_BLOCK_SIZE`](crate::DEFAULT_BLOCK_SIZE) is used.
    pub fn new(path: &Path, block_size: usize) -> Result<Self, TransferError> {
        let file = std::fs::File::open(path)?;
        let file_size = file.metadata()?.len();
        Ok(Self {
            file,
            plan: BlockPlan::new(file_size, block_size),
        })
    }

    /// Reads block `index`.
    pub fn read_block(&mut self, index: usize) -> Result<Block, TransferError> {
        let (offset, len) = self
            .plan
            .range(index)
            .ok_or(TransferError::BlockOutOfRange {
                index,
                count: self.plan.block_count(),
            })?;

        self.file.seek(SeekFrom::Start(offset))?;
        let mut data = vec![0u8; len];
        self.file.read_exact(&mut data)?;

        Ok(Block {
            index,
            offset,
            data,
            id: block_id(index),
        })
    }

    pub fn plan(&self) -> BlockPlan {
        self.plan
    }
}
