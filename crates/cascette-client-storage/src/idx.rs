//! Index journal (.idx) parsing
//!
//! Journals map encoding keys to locations within data archives. Each of
//! the 16 buckets has its own journal; the bucket of a key is derived from
//! its first 9 bytes. A journal holds:
//!
//! ```text
//! [guarded block header: u32 size, u32 hash]
//! [IdxHeader: 16 bytes]
//! [padding to 16-byte alignment]
//! [guarded block header: u32 size, u32 hash]
//! [entries: key (keyLen) | location (offsetLen, BE) | size (sizeLen, LE)]
//! ```
//!
//! Entries are kept sorted by key so lookups are a binary search.

use binrw::BinRead;
use binrw::io::Cursor;
use cascette_crypto::EncodingKey;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::{Result, StorageError};

/// Expected journal version
pub const IDX_VERSION: u16 = 7;

/// Number of journal buckets
pub const BUCKET_COUNT: usize = 16;

/// Guarded block header (size + hash)
#[derive(Debug, Clone, Copy, BinRead)]
#[br(little)]
struct GuardedBlockHeader {
    /// Size of the block data
    block_size: u32,
    /// Jenkins hash of the block data
    #[allow(dead_code)]
    block_hash: u32,
}

/// Journal header
///
/// Unlike most NGDP formats the journal header is little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct IdxHeader {
    /// Journal version (7 on current clients)
    pub version: u16,
    /// Bucket id (0x00-0x0F)
    pub bucket: u8,
    /// Extra bytes (0)
    pub extra_bytes: u8,
    /// Size field bytes
    pub encoded_size_length: u8,
    /// Location field bytes
    pub storage_offset_length: u8,
    /// Key field bytes (usually 9)
    pub ekey_length: u8,
    /// Bits of the location holding the archive offset
    pub file_offset_bits: u8,
    /// Maximum size of one archive file
    pub segment_size: u64,
}

const HEADER_SIZE: usize = 16;

impl IdxHeader {
    fn validate(&self) -> Result<()> {
        if self.version != IDX_VERSION {
            warn!("unexpected index version: {}", self.version);
        }
        if self.ekey_length == 0 || self.ekey_length > 16 {
            return Err(StorageError::corrupt(
                "index header",
                format!("key length {}", self.ekey_length),
            ));
        }
        if self.storage_offset_length == 0 || self.storage_offset_length > 8 {
            return Err(StorageError::corrupt(
                "index header",
                format!("location length {}", self.storage_offset_length),
            ));
        }
        if self.encoded_size_length == 0 || self.encoded_size_length > 4 {
            return Err(StorageError::corrupt(
                "index header",
                format!("size length {}", self.encoded_size_length),
            ));
        }
        let location_bits = u32::from(self.storage_offset_length) * 8;
        if u32::from(self.file_offset_bits) >= location_bits.min(64) {
            return Err(StorageError::corrupt(
                "index header",
                format!(
                    "{} offset bits in a {}-byte location",
                    self.file_offset_bits, self.storage_offset_length
                ),
            ));
        }
        Ok(())
    }

    /// Bytes per entry record
    pub fn record_len(&self) -> usize {
        usize::from(self.ekey_length)
            + usize::from(self.storage_offset_length)
            + usize::from(self.encoded_size_length)
    }
}

/// Archive location data combining archive id and offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLocation {
    /// Archive file number (data.XXX)
    pub archive_index: u16,
    /// Offset of the entry's local header within the archive
    pub offset: u64,
}

/// Entry in an index journal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdxEntry {
    key: [u8; 16],
    key_len: u8,
    /// Where the entry is stored
    pub location: ArchiveLocation,
    /// Size of the entry including its local header
    pub size: u32,
}

impl IdxEntry {
    /// Truncated encoding key as stored in the journal
    pub fn key(&self) -> &[u8] {
        &self.key[..usize::from(self.key_len)]
    }

    /// Archive file number
    pub const fn archive_index(&self) -> u16 {
        self.location.archive_index
    }

    /// Offset within the archive
    pub const fn offset(&self) -> u64 {
        self.location.offset
    }

    fn parse(record: &[u8], header: &IdxHeader) -> Result<Self> {
        let key_len = usize::from(header.ekey_length);
        let location_len = usize::from(header.storage_offset_length);

        let mut key = [0u8; 16];
        key[..key_len].copy_from_slice(&record[..key_len]);

        let location = record[key_len..key_len + location_len]
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
        let size = record[key_len + location_len..]
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));

        let bits = u32::from(header.file_offset_bits);
        let archive_index = u16::try_from(location >> bits).map_err(|_| {
            StorageError::corrupt("index entry", format!("archive index {}", location >> bits))
        })?;

        Ok(Self {
            key,
            key_len: header.ekey_length,
            location: ArchiveLocation {
                archive_index,
                offset: location & ((1u64 << bits) - 1),
            },
            size,
        })
    }
}

/// A parsed index journal
#[derive(Debug, Clone)]
pub struct CascIdxIndex {
    header: IdxHeader,
    version: Option<u32>,
    entries: Vec<IdxEntry>,
}

impl CascIdxIndex {
    /// Parse a journal from its bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let header_block = GuardedBlockHeader::read(&mut cursor)
            .map_err(|e| StorageError::corrupt("index header", e.to_string()))?;
        let header = IdxHeader::read(&mut cursor)
            .map_err(|e| StorageError::corrupt("index header", e.to_string()))?;
        header.validate()?;

        let header_size = (header_block.block_size as usize).max(HEADER_SIZE);
        let entries_start = (8 + header_size + 15) & !15;
        let block = data
            .get(entries_start..entries_start + 8)
            .ok_or_else(|| StorageError::corrupt("index entry block", "missing block header"))?;
        let block_size = u32::from_le_bytes([block[0], block[1], block[2], block[3]]) as usize;

        let entry_data = data
            .get(entries_start + 8..entries_start + 8 + block_size)
            .ok_or_else(|| {
                StorageError::corrupt(
                    "index entry block",
                    format!(
                        "{block_size} bytes declared, {} available",
                        data.len().saturating_sub(entries_start + 8)
                    ),
                )
            })?;

        let mut entries = entry_data
            .chunks_exact(header.record_len())
            .filter(|record| record[..usize::from(header.ekey_length)].iter().any(|&b| b != 0))
            .map(|record| IdxEntry::parse(record, &header))
            .collect::<Result<Vec<_>>>()?;
        entries.sort_by(|a, b| a.key().cmp(b.key()));

        debug!(
            "parsed index bucket {:02x}: {} entries",
            header.bucket,
            entries.len()
        );

        Ok(Self {
            header,
            version: None,
            entries,
        })
    }

    /// Read and parse a journal file
    ///
    /// The journal version is taken from the file name when it follows the
    /// `{bucket:02x}{version:08x}.idx` pattern.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let mut index = Self::parse(&data)?;
        index.version = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_idx_filename)
            .map(|(_, version)| version);

        info!(
            "Loaded index {} ({} entries)",
            path.display(),
            index.entries.len()
        );
        Ok(index)
    }

    /// Look up an encoding key
    ///
    /// Only the leading key bytes stored by the journal are compared.
    pub fn lookup(&self, key: &EncodingKey) -> Option<&IdxEntry> {
        let len = usize::from(self.header.ekey_length);
        let probe = &key.as_bytes()[..len];
        self.entries
            .binary_search_by(|entry| entry.key().cmp(probe))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Journal header
    pub const fn header(&self) -> &IdxHeader {
        &self.header
    }

    /// Bucket this journal belongs to
    pub const fn bucket(&self) -> u8 {
        self.header.bucket
    }

    /// Journal version from the file name, if loaded from disk
    pub const fn version(&self) -> Option<u32> {
        self.version
    }

    /// Entries in key order
    pub fn entries(&self) -> impl Iterator<Item = &IdxEntry> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the journal has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Bucket index for a key
///
/// XOR of the first 9 key bytes, folded to a nibble.
pub fn bucket_for_key(key: &[u8]) -> u8 {
    let hash = key.iter().take(9).fold(0u8, |acc, &b| acc ^ b);
    (hash & 0x0F) ^ (hash >> 4)
}

/// Journal file name for a bucket and version
pub fn idx_filename(bucket: u8, version: u32) -> String {
    format!("{bucket:02x}{version:08x}.idx")
}

/// Parse bucket and version from a journal file name
pub fn parse_idx_filename(filename: &str) -> Option<(u8, u32)> {
    if filename.len() != 14
        || !Path::new(filename)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("idx"))
    {
        return None;
    }

    let bucket = u8::from_str_radix(filename.get(0..2)?, 16).ok()?;
    let version = u32::from_str_radix(filename.get(2..10)?, 16).ok()?;
    Some((bucket, version))
}
