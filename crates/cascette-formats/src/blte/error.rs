//! BLTE error types

use thiserror::Error;

/// BLTE-specific error type
#[derive(Debug, Error)]
pub enum BlteError {
    /// Invalid BLTE magic bytes
    #[error("invalid BLTE magic: expected [42 4C 54 45], got {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// Input ends before a declared structure
    #[error("truncated {structure}: need {needed} bytes, have {available}")]
    Truncated {
        /// Structure being read
        structure: &'static str,
        /// Bytes required
        needed: usize,
        /// Bytes available
        available: usize,
    },

    /// Invalid header format
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Empty block encountered
    #[error("block {0} is empty")]
    EmptyChunk(usize),

    /// Unsupported block mode, including frame blocks
    #[error("unsupported block mode: 0x{0:02X}")]
    UnsupportedCompressionMode(u8),

    /// Unsupported encryption type
    #[error("unsupported encryption type: 0x{0:02X}")]
    UnsupportedEncryption(u8),

    /// Nested encrypted or frame block inside an encrypted block
    #[error("block {0}: encrypted payload contains another encrypted or frame block")]
    NestedEncryption(usize),

    /// Block checksum mismatch
    #[error("block {block} checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Block index
        block: usize,
        /// Expected checksum
        expected: String,
        /// Actual checksum
        actual: String,
    },

    /// Decoded block size differs from the chunk table
    #[error("block {block} decoded to {actual} bytes, expected {expected}")]
    SizeMismatch {
        /// Block index
        block: usize,
        /// Size from the chunk table
        expected: usize,
        /// Decoded size
        actual: usize,
    },

    /// Decompression failed
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    /// Malformed encryption header
    #[error("invalid encryption header: {0}")]
    InvalidEncryptionHeader(String),

    /// Cipher setup failed
    #[error("crypto error: {0}")]
    Crypto(#[from] cascette_crypto::CryptoError),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for BLTE operations
pub type BlteResult<T> = Result<T, BlteError>;
