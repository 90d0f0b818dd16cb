//! Error types for root file parsing

use thiserror::Error;

/// Errors that can occur when parsing root files
#[derive(Error, Debug)]
pub enum RootError {
    /// Extended header declares a size smaller than its own fields
    #[error("Invalid root header size: {0}")]
    InvalidHeaderSize(u32),

    /// Truncated root block at specified offset
    #[error("Truncated root block at offset {0}")]
    TruncatedBlock(u64),

    /// Block declares more records than the remaining data can hold
    #[error("Corrupted block header at offset {offset}: {records} records")]
    CorruptedBlockHeader {
        /// Offset of the block header
        offset: u64,
        /// Declared record count
        records: u32,
    },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `BinRW` parsing error
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Type alias for root file operation results
pub type Result<T> = std::result::Result<T, RootError>;
