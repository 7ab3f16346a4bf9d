use crate::{DEFAULT_BLOCK_SIZE, blocklist::block_id};

/// One block of an artifact, ready to PUT.
#[derive(Debug, Clone)]
pub struct Block {
    /// Zero-based position in the artifact.
    pub index: usize,
    /// Byte offset within the file.
    pub offset: u64,
    /// Raw block data.
    pub data: Vec<u8>,
    /// Base64 block id; equal length for every block of one upload.
    pub id: String,
}

/// How a file of a given size splits into blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPlan {
    pub file_size: u64,
    pub block_size: usize,
}

impl BlockPlan {
    /// If `block_size` is 0, [`DEFAULT_BLOCK_SIZE`] is used.
    pub fn new(file_size: u64, block_size: usize) -> Self {
        let block_size = if block_size == 0 {
            DEFAULT_BLOCK_SIZE
        } else {
            block_size
        };
        Self {
            file_size,
            block_size,
        }
    }

    /// `ceil(file_size / block_size)`.
    pub fn block_count(&self) -> usize {
        self.file_size.div_ceil(self.block_size as u64) as usize
    }

    /// Offset and length of block `index`, or `None` past the end.
    pub fn range(&self, index: usize) -> Option<(u64, usize)> {
        if index >= self.block_count() {
            return None;
        }
        let offset = index as u64 * self.block_size as u64;
        let len = std::cmp::min(self.block_size as u64, self.file_size - offset) as usize;
        Some((offset, len))
    }

    /// Block ids in ascending order.
    pub fn block_ids(&self) -> Vec<String> {
        (0..self.block_count()).map(block_id).collect()
    }
}
