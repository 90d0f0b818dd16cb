//! Shared memory version file
//!
//! The client keeps a `shmem` file next to the journals. Its first block
//! names the data path and the active journal version of each bucket:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x00   | 4    | Block type (4 or 5) |
//! | 0x04   | 4    | Next block offset |
//! | 0x08   | 256  | Data path, NUL padded |
//! | 0x108  | 4    | Free space table size (type 5 only) |
//! |        | 64   | 16 journal versions |
//!
//! A journal version is only trusted when the matching `.idx` file exists.
//! Buckets without a usable entry fall back to the newest journal on disk.

use binrw::BinRead;
use binrw::io::Cursor;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::idx::{BUCKET_COUNT, idx_filename, parse_idx_filename};
use crate::{Result, SHMEM_FILE, StorageError};

#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct RawShmemHeader {
    block_type: u32,
    next_block: u32,
    data_path: [u8; 256],
    #[br(if(block_type == 5))]
    free_space_size: Option<u32>,
    versions: [u32; 16],
}

/// Parsed shared memory version file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShmemFile {
    /// Block type (4 or 5)
    pub block_type: u32,
    /// Offset of the next block
    pub next_block: u32,
    /// Data path recorded by the client
    pub data_path: String,
    /// Free space table size (type 5 only)
    pub free_space_size: Option<u32>,
    /// Active journal version per bucket
    pub versions: [u32; 16],
}

impl ShmemFile {
    /// Parse the version block
    pub fn parse(data: &[u8]) -> Result<Self> {
        let raw = RawShmemHeader::read(&mut Cursor::new(data))
            .map_err(|e| StorageError::corrupt("shmem", e.to_string()))?;

        if raw.block_type != 4 && raw.block_type != 5 {
            return Err(StorageError::corrupt(
                "shmem",
                format!("block type {}", raw.block_type),
            ));
        }

        let path_len = raw.data_path.iter().position(|&b| b == 0).unwrap_or(256);
        Ok(Self {
            block_type: raw.block_type,
            next_block: raw.next_block,
            data_path: String::from_utf8_lossy(&raw.data_path[..path_len]).into_owned(),
            free_space_size: raw.free_space_size,
            versions: raw.versions,
        })
    }

    /// Read and parse a `shmem` file
    pub fn load(path: &Path) -> Result<Self> {
        Self::parse(&std::fs::read(path)?)
    }

    /// Active journal version for a bucket
    pub fn version(&self, bucket: u8) -> Option<u32> {
        self.versions.get(usize::from(bucket)).copied()
    }
}

/// Journal versions present on disk, per bucket
fn journals_on_disk(dir: &Path) -> Result<BTreeMap<u8, BTreeSet<u32>>> {
    let mut found: BTreeMap<u8, BTreeSet<u32>> = BTreeMap::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if let Some((bucket, version)) = entry.file_name().to_str().and_then(parse_idx_filename)
            && usize::from(bucket) < BUCKET_COUNT
        {
            found.entry(bucket).or_default().insert(version);
        }
    }
    Ok(found)
}

/// Pick the active journal of every bucket in `dir`
///
/// Uses the `shmem` file in the same directory when it exists and parses.
/// Buckets without any journal are left out.
pub fn select_journals(dir: &Path) -> Result<Vec<(u8, PathBuf)>> {
    let shmem_path = dir.join(SHMEM_FILE);
    let shmem = if shmem_path.is_file() {
        match ShmemFile::load(&shmem_path) {
            Ok(shmem) => Some(shmem),
            Err(e) => {
                warn!("ignoring unreadable {}: {e}", shmem_path.display());
                None
            }
        }
    } else {
        None
    };

    let on_disk = journals_on_disk(dir)?;
    let mut selected = Vec::with_capacity(BUCKET_COUNT);

    for bucket in 0..BUCKET_COUNT as u8 {
        let Some(versions) = on_disk.get(&bucket) else {
            warn!("no journal for bucket {bucket:02x}");
            continue;
        };

        let preferred = shmem
            .as_ref()
            .and_then(|s| s.version(bucket))
            .filter(|v| versions.contains(v));
        let Some(version) = preferred.or_else(|| versions.last().copied()) else {
            continue;
        };

        if preferred.is_none() && shmem.is_some() {
            debug!("bucket {bucket:02x}: shmem version not on disk, using {version:08x}");
        }
        selected.push((bucket, dir.join(idx_filename(bucket, version))));
    }

    Ok(selected)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn shmem_bytes(block_type: u32, versions: [u32; 16]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&block_type.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        let mut path = [0u8; 256];
        path[..11].copy_from_slice(b"Global\\data");
        data.extend_from_slice(&path);
        if block_type == 5 {
            data.extend_from_slice(&0x2AB8u32.to_le_bytes());
        }
        for v in versions {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_parse_type_4() {
        let mut versions = [0u32; 16];
        versions[3] = 0x42;
        let shmem = ShmemFile::parse(&shmem_bytes(4, versions)).unwrap();
        assert_eq!(shmem.block_type, 4);
        assert_eq!(shmem.data_path, "Global\\data");
        assert_eq!(shmem.free_space_size, None);
        assert_eq!(shmem.version(3), Some(0x42));
        assert_eq!(shmem.version(16), None);
    }

    #[test]
    fn test_parse_type_5_skips_free_space_size() {
        let versions = std::array::from_fn(|i| i as u32 + 1);
        let shmem = ShmemFile::parse(&shmem_bytes(5, versions)).unwrap();
        assert_eq!(shmem.free_space_size, Some(0x2AB8));
        assert_eq!(shmem.versions, versions);
    }

    #[test]
    fn test_rejects_unknown_block_type() {
        assert!(matches!(
            ShmemFile::parse(&shmem_bytes(3, [0; 16])),
            Err(StorageError::Corrupt { .. })
        ));
        assert!(ShmemFile::parse(&[4, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_select_prefers_shmem_version() {
        let dir = tempfile::tempdir().unwrap();
        for (bucket, version) in [(0, 1), (0, 2), (0, 3), (1, 5), (2, 7)] {
            std::fs::write(dir.path().join(idx_filename(bucket, version)), b"").unwrap();
        }
        let mut versions = [0u32; 16];
        versions[0] = 2;
        versions[1] = 9;
        std::fs::write(dir.path().join(SHMEM_FILE), shmem_bytes(4, versions)).unwrap();

        let selected = select_journals(dir.path()).unwrap();
        let names: Vec<_> = selected
            .iter()
            .map(|(b, p)| (*b, p.file_name().unwrap().to_str().unwrap().to_string()))
            .collect();
        assert_eq!(
            names,
            vec![
                (0, idx_filename(0, 2)),
                (1, idx_filename(1, 5)),
                (2, idx_filename(2, 7)),
            ]
        );
    }

    #[test]
    fn test_select_without_shmem_uses_highest() {
        let dir = tempfile::tempdir().unwrap();
        for version in [0x10, 0x2, 0xFF] {
            std::fs::write(dir.path().join(idx_filename(0x0F, version)), b"").unwrap();
        }
        std::fs::write(dir.path().join("data.000"), b"").unwrap();

        let selected = select_journals(dir.path()).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].1, dir.path().join(idx_filename(0x0F, 0xFF)));
    }

    #[test]
    fn test_corrupt_shmem_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(idx_filename(0, 1)), b"").unwrap();
        std::fs::write(dir.path().join(idx_filename(0, 4)), b"").unwrap();
        std::fs::write(dir.path().join(SHMEM_FILE), b"junk").unwrap();

        let selected = select_journals(dir.path()).unwrap();
        assert_eq!(selected[0].1, dir.path().join(idx_filename(0, 4)));
    }
}
