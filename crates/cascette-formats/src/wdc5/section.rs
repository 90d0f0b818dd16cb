//! Section loading
//!
//! Each section is read from its own file offset: record data first, then
//! (for dense tables) its string table, then a fixed sequence of trailing
//! blocks. The order of those blocks depends on the `SecondaryKey` flag.

use binrw::io::Cursor;
use binrw::{BinRead, BinWrite, Endian, VecArgs};
use cascette_crypto::TactKeyProvider;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use super::error::{Result, Wdc5Error};
use super::header::{SectionHeader, Wdc5Header};

/// Dense record buffers are padded so unaligned 8-byte loads stay in bounds
pub const RECORD_PADDING: usize = 8;

/// Entry of a sparse section's offset map
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct SparseEntry {
    /// Absolute file offset of the record, or 0 for packed records
    pub offset: u32,
    /// Record size in bytes
    pub size: u16,
}

#[derive(Debug, Clone, Copy, BinRead)]
#[br(little)]
struct CopyEntry {
    id: u32,
    source_id: u32,
}

#[derive(Debug, Clone, Copy, BinRead)]
#[br(little)]
struct ParentLookupHeader {
    record_count: u32,
    _min_id: u32,
    _max_id: u32,
}

#[derive(Debug, Clone, Copy, BinRead)]
#[br(little)]
struct ParentLookupEntry {
    parent_id: u32,
    record_index: u32,
}

/// Why a section was left out of the readable set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No TACT key is available for the section
    MissingKey,
    /// The encrypted record data is all zero
    Placeholder,
    /// Ids would have to be read from the encrypted records, but they are
    /// also the decryption nonce
    EncryptedIds,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey => write!(f, "missing key"),
            Self::Placeholder => write!(f, "zero-filled placeholder"),
            Self::EncryptedIds => write!(f, "ids stored in encrypted records"),
        }
    }
}

/// A section excluded from enumeration and lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedSection {
    /// Section index in file order
    pub index: usize,
    /// TACT key name of the section
    pub key_lookup: u64,
    /// Number of records the section declared
    pub record_count: usize,
    /// Reason for skipping
    pub reason: SkipReason,
}

/// A readable section
#[derive(Debug)]
pub(crate) struct Section {
    pub index: usize,
    pub header: SectionHeader,
    /// Global index of the section's first record
    pub first_global_record: usize,
    /// Record bytes plus padding
    pub records: Vec<u8>,
    /// Explicit ids, empty when the section has none
    pub ids: Vec<u32>,
    /// (id, source id) pairs
    pub copy_table: Vec<(u32, u32)>,
    /// Record index → parent id
    pub parent_lookup: HashMap<usize, u32>,
    pub sparse_entries: Vec<SparseEntry>,
    /// Starting bit of each record for sparse sections
    pub record_starts: Vec<usize>,
    /// Resolved key for encrypted sections
    pub key: Option<[u8; 16]>,
}

impl Section {
    pub fn record_count(&self) -> usize {
        self.header.record_count as usize
    }

    /// Bit offset and byte length of a record
    pub fn record_span(&self, local: usize, record_size: usize) -> (usize, usize) {
        if self.record_starts.is_empty() {
            (local * record_size * 8, record_size)
        } else {
            (
                self.record_starts[local],
                self.sparse_entries[local].size as usize,
            )
        }
    }
}

pub(crate) enum SectionLoad {
    Loaded(Section),
    Skipped(SkippedSection),
}

/// Read one section
///
/// Dense string tables are appended to `strings` even when the section is
/// skipped, so string offsets of later sections stay valid.
pub(crate) fn load_section(
    data: &[u8],
    table: &Wdc5Header,
    index: usize,
    header: SectionHeader,
    first_global_record: usize,
    keys: &dyn TactKeyProvider,
    strings: &mut Vec<u8>,
) -> Result<SectionLoad> {
    let file_offset = header.file_offset as usize;
    let record_count = header.record_count as usize;

    let (record_bytes, mut position) = if table.is_sparse() {
        let end = header.offset_records_end as usize;
        if end < file_offset {
            return Err(Wdc5Error::SparseDesync {
                section: index,
                expected: end,
                actual: file_offset,
            });
        }
        if end > data.len() {
            return Err(Wdc5Error::SparseDesync {
                section: index,
                expected: end,
                actual: data.len(),
            });
        }
        (&data[file_offset..end], end)
    } else {
        let len = record_count
            .checked_mul(table.record_size as usize)
            .ok_or_else(|| Wdc5Error::corrupt("section records", "record data size overflows"))?;
        let records = slice(data, file_offset, len, "section records")?;
        let string_table = slice(
            data,
            file_offset + len,
            header.string_table_size as usize,
            "section string table",
        )?;
        strings.extend_from_slice(string_table);
        (records, file_offset + len + string_table.len())
    };

    let mut key = None;
    if header.is_encrypted() {
        let ids_in_records = header.id_list_size == 0
            && header.offset_map_id_count == 0
            && u32::from(table.id_index) < table.field_count;
        let reason = if record_bytes.iter().all(|&b| b == 0) {
            Some(SkipReason::Placeholder)
        } else {
            key = keys.get_key(header.tact_key_lookup);
            if key.is_none() {
                Some(SkipReason::MissingKey)
            } else if ids_in_records {
                Some(SkipReason::EncryptedIds)
            } else {
                None
            }
        };

        if let Some(reason) = reason {
            warn!(
                "skipping encrypted section {} ({} records, key {:016X}): {}",
                index, record_count, header.tact_key_lookup, reason
            );
            return Ok(SectionLoad::Skipped(SkippedSection {
                index,
                key_lookup: header.tact_key_lookup,
                record_count,
                reason,
            }));
        }
    }

    let mut records = Vec::with_capacity(record_bytes.len() + RECORD_PADDING);
    records.extend_from_slice(record_bytes);
    records.resize(record_bytes.len() + RECORD_PADDING, 0);

    let mut cursor = Cursor::new(data);
    cursor.set_position(position as u64);

    let mut ids: Vec<u32> = read_array(&mut cursor, header.id_list_size as usize / 4, 4, "id list")?;
    if !ids.is_empty() && ids.iter().all(|&id| id == 0) {
        let first = table.min_id as usize + first_global_record;
        ids = (0..record_count).map(|i| (first + i) as u32).collect();
    }

    let copy_table = read_array::<CopyEntry>(
        &mut cursor,
        header.copy_table_count as usize,
        8,
        "copy table",
    )?
    .into_iter()
    .filter(|entry| entry.id != entry.source_id)
    .map(|entry| (entry.id, entry.source_id))
    .collect();

    let map_count = header.offset_map_id_count as usize;
    let sparse_entries: Vec<SparseEntry> = read_array(&mut cursor, map_count, 6, "offset map")?;

    if map_count > 0 && table.flags.has_secondary_key() {
        read_secondary_keys(&mut cursor, &header, map_count, &mut ids)?;
    }

    let mut parent_lookup = HashMap::new();
    if header.parent_lookup_data_size > 0 {
        let lookup = read_one::<ParentLookupHeader>(&mut cursor, 12, "parent lookup header")?;
        let entries: Vec<ParentLookupEntry> = read_array(
            &mut cursor,
            lookup.record_count as usize,
            8,
            "parent lookup table",
        )?;
        parent_lookup.extend(
            entries
                .into_iter()
                .map(|e| (e.record_index as usize, e.parent_id)),
        );
    }

    if map_count > 0 && !table.flags.has_secondary_key() {
        read_secondary_keys(&mut cursor, &header, map_count, &mut ids)?;
    }

    position = cursor.position() as usize;

    let record_starts = if table.is_sparse() {
        let starts = sparse_record_starts(index, &sparse_entries, file_offset, record_bytes.len())?;
        if starts.len() < record_count {
            return Err(Wdc5Error::corrupt(
                "offset map",
                format!(
                    "section {index} has {record_count} records but {} offset entries",
                    starts.len()
                ),
            ));
        }
        starts
    } else {
        Vec::new()
    };

    if !ids.is_empty() && ids.len() < record_count {
        return Err(Wdc5Error::corrupt(
            "id list",
            format!(
                "section {index} has {record_count} records but {} ids",
                ids.len()
            ),
        ));
    }

    debug!(
        "loaded section {}: {} records, {} ids, {} copies, trailer ends at {}",
        index,
        record_count,
        ids.len(),
        header.copy_table_count,
        position
    );

    Ok(SectionLoad::Loaded(Section {
        index,
        header,
        first_global_record,
        records,
        ids,
        copy_table,
        parent_lookup,
        sparse_entries,
        record_starts,
        key,
    }))
}

/// The secondary key array replaces the id list
fn read_secondary_keys(
    cursor: &mut Cursor<&[u8]>,
    header: &SectionHeader,
    count: usize,
    ids: &mut Vec<u32>,
) -> Result<()> {
    let keys: Vec<u32> = read_array(cursor, count, 4, "secondary key list")?;
    if header.id_list_size > 0 && ids.len() != keys.len() {
        return Err(Wdc5Error::corrupt(
            "secondary key list",
            format!("{} keys for {} ids", keys.len(), ids.len()),
        ));
    }
    *ids = keys;
    Ok(())
}

/// Compute the starting bit of each sparse record
///
/// With every offset zero, records are packed back to back. Otherwise the
/// offsets are absolute file offsets; they must be non-decreasing and each
/// record must lie within the section's `data_len` bytes.
pub fn sparse_record_starts(
    section: usize,
    entries: &[SparseEntry],
    file_offset: usize,
    data_len: usize,
) -> Result<Vec<usize>> {
    let mut starts = Vec::with_capacity(entries.len());

    if entries.iter().all(|e| e.offset == 0) {
        let mut bytes = 0usize;
        for entry in entries {
            starts.push(bytes * 8);
            bytes += entry.size as usize;
        }
        if bytes > data_len {
            return Err(Wdc5Error::InvalidSparseOffsets {
                section,
                detail: format!("records need {bytes} bytes, section has {data_len}"),
            });
        }
        return Ok(starts);
    }

    let mut previous = 0usize;
    for (i, entry) in entries.iter().enumerate() {
        let offset = entry.offset as usize;
        if offset < previous {
            return Err(Wdc5Error::InvalidSparseOffsets {
                section,
                detail: format!("entry {i} offset {offset} precedes {previous}"),
            });
        }
        let Some(relative) = offset.checked_sub(file_offset) else {
            return Err(Wdc5Error::InvalidSparseOffsets {
                section,
                detail: format!("entry {i} offset {offset} before section start {file_offset}"),
            });
        };
        if relative + entry.size as usize > data_len {
            return Err(Wdc5Error::InvalidSparseOffsets {
                section,
                detail: format!(
                    "entry {i} spans {}..{} past section end {data_len}",
                    relative,
                    relative + entry.size as usize
                ),
            });
        }
        starts.push(relative * 8);
        previous = offset;
    }

    Ok(starts)
}

pub(crate) fn slice<'d>(
    data: &'d [u8],
    offset: usize,
    len: usize,
    structure: &'static str,
) -> Result<&'d [u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or(Wdc5Error::Truncated {
            structure,
            offset,
            needed: len,
            available: data.len().saturating_sub(offset),
        })
}

fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    cursor
        .get_ref()
        .len()
        .saturating_sub(cursor.position() as usize)
}

/// Read `count` little-endian items of `item_size` bytes
pub(crate) fn read_array<T>(
    cursor: &mut Cursor<&[u8]>,
    count: usize,
    item_size: usize,
    structure: &'static str,
) -> Result<Vec<T>>
where
    T: for<'a> BinRead<Args<'a> = ()> + 'static,
{
    let needed = count.saturating_mul(item_size);
    if needed > remaining(cursor) {
        return Err(Wdc5Error::Truncated {
            structure,
            offset: cursor.position() as usize,
            needed,
            available: remaining(cursor),
        });
    }
    Vec::<T>::read_options(cursor, Endian::Little, VecArgs { count, inner: () })
        .map_err(|e| Wdc5Error::from_binrw(structure, &e))
}

pub(crate) fn read_one<T>(
    cursor: &mut Cursor<&[u8]>,
    size: usize,
    structure: &'static str,
) -> Result<T>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    if size > remaining(cursor) {
        return Err(Wdc5Error::Truncated {
            structure,
            offset: cursor.position() as usize,
            needed: size,
            available: remaining(cursor),
        });
    }
    T::read_options(cursor, Endian::Little, ()).map_err(|e| Wdc5Error::from_binrw(structure, &e))
}
