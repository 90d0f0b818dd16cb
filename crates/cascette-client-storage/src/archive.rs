//! Data archive (.data) reads
//!
//! Archives are memory-mapped on first use and shared for the lifetime of
//! the [`ArchiveSet`]. Each stored entry starts with a 30-byte local header
//! followed by the BLTE-encoded bytes.
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x00   | 16   | Encoding key (reversed byte order) |
//! | 0x10   | 4    | Size including this 30-byte header (BE) |
//! | 0x14   | 2    | Flags |
//! | 0x16   | 4    | ChecksumA |
//! | 0x1A   | 4    | ChecksumB |

use cascette_crypto::EncodingKey;
use dashmap::DashMap;
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::idx::IdxEntry;
use crate::{Result, StorageError};

/// Size of the local header in bytes.
pub const LOCAL_HEADER_SIZE: usize = 0x1E;

/// 30-byte local header preceding each BLTE entry in `.data` archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalHeader {
    /// Encoding key (16 bytes, reversed byte order).
    pub encoding_key: [u8; 16],
    /// Total size including this 30-byte header (big-endian on disk).
    pub size_with_header: u32,
    /// Flags (2 bytes).
    pub flags: u16,
    /// Checksum A (4 bytes).
    pub checksum_a: u32,
    /// Checksum B (4 bytes).
    pub checksum_b: u32,
}

impl LocalHeader {
    /// Parse a local header from the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let data = data.get(..LOCAL_HEADER_SIZE).ok_or_else(|| {
            StorageError::corrupt(
                "local header",
                format!("{} of {LOCAL_HEADER_SIZE} bytes", data.len()),
            )
        })?;

        let mut encoding_key = [0u8; 16];
        encoding_key.copy_from_slice(&data[0x00..0x10]);

        Ok(Self {
            encoding_key,
            size_with_header: u32::from_be_bytes([data[0x10], data[0x11], data[0x12], data[0x13]]),
            flags: u16::from_le_bytes([data[0x14], data[0x15]]),
            checksum_a: u32::from_le_bytes([data[0x16], data[0x17], data[0x18], data[0x19]]),
            checksum_b: u32::from_le_bytes([data[0x1A], data[0x1B], data[0x1C], data[0x1D]]),
        })
    }

    /// Get the original (non-reversed) encoding key.
    pub fn original_encoding_key(&self) -> [u8; 16] {
        let mut key = self.encoding_key;
        key.reverse();
        key
    }
}

/// Memory-mapped `data.NNN` archives of one installation
#[derive(Debug)]
pub struct ArchiveSet {
    base_path: PathBuf,
    archives: DashMap<u16, Arc<Mmap>>,
}

impl ArchiveSet {
    /// Archives in `base_path`, opened on demand
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            archives: DashMap::new(),
        }
    }

    /// Path of an archive file
    pub fn archive_path(&self, index: u16) -> PathBuf {
        self.base_path.join(format!("data.{index:03}"))
    }

    /// Number of archives mapped so far
    pub fn open_count(&self) -> usize {
        self.archives.len()
    }

    fn archive(&self, index: u16) -> Result<Arc<Mmap>> {
        if let Some(mmap) = self.archives.get(&index) {
            return Ok(Arc::clone(&mmap));
        }

        let path = self.archive_path(index);
        let file = File::open(&path).map_err(|e| {
            StorageError::corrupt("archive", format!("{}: {e}", path.display()))
        })?;

        // Archives are only read; the client appends to them but never
        // rewrites committed entries.
        #[allow(unsafe_code)]
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        debug!("mapped {} ({} bytes)", path.display(), mmap.len());

        let mmap = Arc::new(mmap);
        self.archives.insert(index, Arc::clone(&mmap));
        Ok(mmap)
    }

    /// Read the raw bytes of an archive range, local header included
    pub fn read_raw(&self, index: u16, offset: u64, size: usize) -> Result<Vec<u8>> {
        let archive = self.archive(index)?;
        let start = usize::try_from(offset)
            .map_err(|_| StorageError::corrupt("archive range", format!("offset {offset}")))?;

        archive
            .get(start..start.saturating_add(size))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                StorageError::corrupt(
                    "archive range",
                    format!(
                        "data.{index:03}: {start} + {size} > {}",
                        archive.len()
                    ),
                )
            })
    }

    /// Read the BLTE bytes of a journal entry
    ///
    /// The local header is checked against `ekey` and the journal size; a
    /// mismatch is logged but does not fail the read.
    pub fn read_entry(&self, ekey: &EncodingKey, entry: &IdxEntry) -> Result<Vec<u8>> {
        let size = entry.size as usize;
        if size < LOCAL_HEADER_SIZE {
            return Err(StorageError::corrupt(
                "archive entry",
                format!("size {size} smaller than local header"),
            ));
        }

        let mut data = self.read_raw(entry.archive_index(), entry.offset(), size)?;
        let header = LocalHeader::parse(&data)?;

        let stored = header.original_encoding_key();
        if stored[..entry.key().len()] != *entry.key() {
            warn!(
                "local header key {} does not match {ekey} in data.{:03}",
                hex::encode(stored),
                entry.archive_index()
            );
        }
        if header.size_with_header as usize != size {
            warn!(
                "local header size {} differs from index size {size} for {ekey}",
                header.size_with_header
            );
        }

        data.drain(..LOCAL_HEADER_SIZE);
        Ok(data)
    }
}
