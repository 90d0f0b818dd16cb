//! Root file header detection
//!
//! ```text
//! V1:    no header, the file starts with the first block
//! V2:    magic(4) + total_files(4) + named_files(4)
//! V3/V4: magic(4) + header_size(4) + version(4) + total_files(4)
//!        + named_files(4) + padding(4)
//! ```
//!
//! `MFST` headers are big-endian, `TSFM` headers little-endian. Blocks are
//! always little-endian.

use crate::root::{error::Result, version::RootVersion};
use binrw::io::{Read, Seek, SeekFrom};

/// Size of the extended (V3/V4) header fields
const EXTENDED_HEADER_SIZE: u64 = 24;

/// Parsed root file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootHeader {
    /// Block format version
    pub version: RootVersion,
    /// Declared total file count (0 for V1)
    pub total_files: u32,
    /// Declared named file count (0 for V1)
    pub named_files: u32,
    /// Bytes consumed by the header
    pub size: u64,
}

impl RootHeader {
    /// Detect the version and consume the header
    ///
    /// Leaves the reader positioned at the first block.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let start = reader.stream_position()?;
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(start))?;

        let mut magic = [0u8; 4];
        let little_endian = if end - start < 12 {
            None
        } else {
            reader.read_exact(&mut magic)?;
            match &magic {
                b"MFST" => Some(false),
                b"TSFM" => Some(true),
                _ => None,
            }
        };

        let Some(little_endian) = little_endian else {
            reader.seek(SeekFrom::Start(start))?;
            return Ok(Self {
                version: RootVersion::V1,
                total_files: 0,
                named_files: 0,
                size: 0,
            });
        };

        let read_u32 = |r: &mut R| -> Result<u32> {
            let mut bytes = [0u8; 4];
            r.read_exact(&mut bytes)?;
            Ok(if little_endian {
                u32::from_le_bytes(bytes)
            } else {
                u32::from_be_bytes(bytes)
            })
        };

        let value1 = read_u32(reader)?;
        let value2 = read_u32(reader)?;

        // Extended: value1 = header_size, value2 = version
        // Classic V2: value1 = total_files, value2 = named_files
        let extended = (16..100).contains(&value1) && value2 < 10 && value2 < value1;
        if !extended {
            return Ok(Self {
                version: RootVersion::V2,
                total_files: value1,
                named_files: value2,
                size: 12,
            });
        }

        let total_files = read_u32(reader)?;
        let named_files = read_u32(reader)?;
        let _padding = read_u32(reader)?;

        let size = EXTENDED_HEADER_SIZE.max(u64::from(value1));
        reader.seek(SeekFrom::Start(start + size))?;

        Ok(Self {
            version: RootVersion::from_extended(value2),
            total_files,
            named_files,
            size,
        })
    }
}
