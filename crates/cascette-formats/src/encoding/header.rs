use crate::encoding::error::EncodingError;
use binrw::BinRead;

/// Size of the fixed header
pub const ENCODING_HEADER_SIZE: usize = 22;

/// Encoding file header (22 bytes)
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(big)] // Big-endian for all fields
pub struct EncodingHeader {
    /// Magic bytes: 'EN'
    pub magic: [u8; 2],

    /// Version (typically 1)
    pub version: u8,

    /// Size of content key hashes (16 for MD5)
    pub ckey_hash_size: u8,

    /// Size of encoding key hashes (16 for MD5)
    pub ekey_hash_size: u8,

    /// Content key page size in KB
    pub ckey_page_size_kb: u16,

    /// Encoding key page size in KB
    pub ekey_page_size_kb: u16,

    /// Number of content key pages
    pub ckey_page_count: u32,

    /// Number of encoding key pages
    pub ekey_page_count: u32,

    /// Flags field at offset 0x11 (must be 0)
    pub flags: u8,

    /// Size of the `ESpec` block following the header
    pub espec_block_size: u32,
}

impl EncodingHeader {
    /// Validate the fields the content key lookup depends on
    pub fn validate(&self) -> Result<(), EncodingError> {
        if self.magic != *b"EN" {
            return Err(EncodingError::InvalidMagic(self.magic));
        }

        if self.version != 1 {
            return Err(EncodingError::UnsupportedVersion(self.version));
        }

        if self.flags != 0 {
            return Err(EncodingError::InvalidFlags(self.flags));
        }

        if self.ckey_hash_size == 0 || self.ckey_hash_size > 16 {
            return Err(EncodingError::InvalidHashSize {
                field: "ckey_hash_size",
                value: self.ckey_hash_size,
            });
        }

        if self.ekey_hash_size == 0 || self.ekey_hash_size > 16 {
            return Err(EncodingError::InvalidHashSize {
                field: "ekey_hash_size",
                value: self.ekey_hash_size,
            });
        }

        // Lookups work on full 16-byte MD5 keys
        if self.ckey_hash_size != 16 || self.ekey_hash_size != 16 {
            return Err(EncodingError::InvalidKeySize {
                expected: 16,
                actual: usize::from(self.ckey_hash_size.min(self.ekey_hash_size)),
            });
        }

        if self.ckey_page_size_kb == 0 {
            return Err(EncodingError::InvalidPageSize(0));
        }

        if self.ckey_page_count == 0 {
            return Err(EncodingError::InvalidPageCount {
                field: "ckey_page_count",
                value: self.ckey_page_count,
            });
        }

        Ok(())
    }

    /// Get content key page size in bytes
    pub fn ckey_page_size(&self) -> usize {
        self.ckey_page_size_kb as usize * 1024
    }

    /// Offset of the content key page index
    pub fn ckey_index_offset(&self) -> usize {
        ENCODING_HEADER_SIZE + self.espec_block_size as usize
    }
}
