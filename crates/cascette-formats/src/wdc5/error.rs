//! WDC5 error types

use thiserror::Error;

/// Classification of a [`Wdc5Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input: bad magic, truncation, inconsistent sizes
    Corrupt,
    /// A valid but unsupported layout variant
    Unsupported,
    /// The caller passed an argument outside the accepted range
    InvalidArgument,
}

/// Errors raised while parsing or decoding a WDC5 table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Wdc5Error {
    /// File does not start with `WDC5`
    #[error("invalid WDC5 magic: expected [57 44 43 35], got {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// A structure extends past the end of the buffer
    #[error("truncated {structure}: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        /// Structure being read
        structure: &'static str,
        /// Byte offset the read started at
        offset: usize,
        /// Bytes required
        needed: usize,
        /// Bytes available in the buffer
        available: usize,
    },

    /// Structurally inconsistent data
    #[error("corrupt {structure}: {detail}")]
    Corrupt {
        /// Structure that failed validation
        structure: &'static str,
        /// Description of the inconsistency
        detail: String,
    },

    /// Sparse section record data does not end at its declared end offset
    #[error("sparse section {section} desynced: stream at {actual}, expected {expected}")]
    SparseDesync {
        /// Section index
        section: usize,
        /// Declared end offset
        expected: usize,
        /// Position the stream actually reached
        actual: usize,
    },

    /// Sparse offset table is unsorted or points outside the section
    #[error("invalid sparse offset table in section {section}: {detail}")]
    InvalidSparseOffsets {
        /// Section index
        section: usize,
        /// Description of the violation
        detail: String,
    },

    /// Column uses a compression tag this reader does not know
    #[error("unknown column compression type {compression} for field {field}")]
    UnknownCompression {
        /// Field index
        field: usize,
        /// Raw compression tag
        compression: u32,
    },

    /// Valid data that this reader cannot decode
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Bit count above 64
    #[error("invalid bit count {0}, must be at most 64")]
    InvalidBitCount(u32),

    /// Field index outside the table's field list
    #[error("field index {field} out of range, table has {count} fields")]
    FieldOutOfRange {
        /// Requested field
        field: usize,
        /// Number of fields in the table
        count: usize,
    },
}

impl Wdc5Error {
    /// Classify the error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMagic(_)
            | Self::Truncated { .. }
            | Self::Corrupt { .. }
            | Self::SparseDesync { .. }
            | Self::InvalidSparseOffsets { .. } => ErrorKind::Corrupt,
            Self::UnknownCompression { .. } | Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::InvalidBitCount(_) | Self::FieldOutOfRange { .. } => ErrorKind::InvalidArgument,
        }
    }

    pub(crate) fn corrupt(structure: &'static str, detail: impl Into<String>) -> Self {
        Self::Corrupt {
            structure,
            detail: detail.into(),
        }
    }

    pub(crate) fn from_binrw(structure: &'static str, err: &binrw::Error) -> Self {
        Self::corrupt(structure, err.to_string())
    }
}

/// Result type for WDC5 operations
pub type Result<T> = std::result::Result<T, Wdc5Error>;
