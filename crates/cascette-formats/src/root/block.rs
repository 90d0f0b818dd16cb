//! Root file blocks
//!
//! Every block shares one set of content/locale flags and lists its file
//! ids as deltas: `id += delta; emit id; id += 1`. V1 interleaves
//! `(ckey, name_hash)` after the deltas; V2+ store all content keys, then
//! all name hashes unless the block carries `NO_NAME_HASH`.

use crate::root::{
    error::{Result, RootError},
    flags::{ContentFlags, LocaleFlags},
    version::RootVersion,
};
use binrw::BinRead;
use binrw::io::{Read, Seek, SeekFrom};
use cascette_crypto::ContentKey;

/// A file record inside a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootRecord {
    /// File data id
    pub file_data_id: u32,
    /// Content key of the file
    pub content_key: ContentKey,
}

/// One block of a root file
#[derive(Debug, Clone)]
pub struct RootBlock {
    /// Content flags shared by all records
    pub content_flags: ContentFlags,
    /// Locale flags shared by all records
    pub locale_flags: LocaleFlags,
    /// Records in file order
    pub records: Vec<RootRecord>,
}

impl RootBlock {
    /// Parse one block
    ///
    /// `remaining` is the number of bytes left in the file; it bounds the
    /// declared record count before anything is allocated.
    pub fn parse<R: Read + Seek>(
        reader: &mut R,
        version: RootVersion,
        remaining: u64,
    ) -> Result<Self> {
        let offset = reader.stream_position()?;
        if remaining < version.block_header_size() as u64 {
            return Err(RootError::TruncatedBlock(offset));
        }

        let num_records = u32::read_le(reader)?;
        let (content_flags, locale_flags) = match version {
            RootVersion::V1 => {
                let content = ContentFlags::read_v1_v3(reader)?;
                let locale = LocaleFlags::new(u32::read_le(reader)?);
                (content, locale)
            }
            RootVersion::V2 | RootVersion::V3 | RootVersion::V4 => {
                let locale = LocaleFlags::new(u32::read_le(reader)?);
                let content = if version == RootVersion::V4 {
                    ContentFlags::read_v4(reader)?
                } else {
                    ContentFlags::read_v1_v3(reader)?
                };
                let _unk2 = u32::read_le(reader)?;
                let _unk3 = u8::read_le(reader)?;
                (content, locale)
            }
        };

        let has_name_hashes =
            !version.uses_separated_arrays() || content_flags.has_name_hashes();
        let record_size: u64 = 4 + 16 + if has_name_hashes { 8 } else { 0 };
        let body = remaining - version.block_header_size() as u64;
        if u64::from(num_records) * record_size > body {
            return Err(RootError::CorruptedBlockHeader {
                offset,
                records: num_records,
            });
        }

        let count = num_records as usize;
        let mut ids = Vec::with_capacity(count);
        let mut current: u32 = 0;
        for _ in 0..count {
            let delta = u32::read_le(reader)?;
            current = current.wrapping_add(delta);
            ids.push(current);
            current = current.wrapping_add(1);
        }

        let mut records = Vec::with_capacity(count);
        if version.uses_separated_arrays() {
            for &file_data_id in &ids {
                records.push(RootRecord {
                    file_data_id,
                    content_key: read_key(reader)?,
                });
            }
            if has_name_hashes {
                reader.seek(SeekFrom::Current(8 * count as i64))?;
            }
        } else {
            for &file_data_id in &ids {
                let content_key = read_key(reader)?;
                let _name_hash = u64::read_le(reader)?;
                records.push(RootRecord {
                    file_data_id,
                    content_key,
                });
            }
        }

        Ok(Self {
            content_flags,
            locale_flags,
            records,
        })
    }

    /// Size of the block in bytes
    pub fn size(&self, version: RootVersion) -> usize {
        let hashes = !version.uses_separated_arrays() || self.content_flags.has_name_hashes();
        let per_record = 4 + 16 + if hashes { 8 } else { 0 };
        version.block_header_size() + self.records.len() * per_record
    }
}

fn read_key<R: Read>(reader: &mut R) -> Result<ContentKey> {
    let mut key = [0u8; 16];
    reader.read_exact(&mut key)?;
    Ok(ContentKey::from_bytes(key))
}
