//! Error types for encoding file operations

use thiserror::Error;

/// Errors that can occur when working with encoding files
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum EncodingError {
    #[error("Invalid magic: expected 'EN', got {0:?}")]
    InvalidMagic([u8; 2]),

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("Page {page} checksum mismatch")]
    ChecksumMismatch { page: usize },

    #[error("Truncated {structure}: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        structure: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),

    #[error("Invalid page size: {0}")]
    InvalidPageSize(usize),

    #[error("Invalid key size: expected {expected}, got {actual}")]
    InvalidKeySize { expected: usize, actual: usize },

    #[error("Invalid flags: unk_11 must be 0, got {0}")]
    InvalidFlags(u8),

    #[error("Invalid {field} hash size: expected 1..=16, got {value}")]
    InvalidHashSize {
        /// Which hash size field is invalid
        field: &'static str,
        /// The invalid value
        value: u8,
    },

    #[error("Invalid {field} page count: must be > 0, got {value}")]
    InvalidPageCount {
        /// Which page count field is invalid
        field: &'static str,
        /// The invalid value
        value: u32,
    },

    #[error("Page {page} entry at offset {offset} overruns the page")]
    EntryOverrun { page: usize, offset: usize },
}
