//! WDC5 table loading and record lookup

use binrw::BinRead;
use binrw::io::Cursor;
use cascette_crypto::TactKeyProvider;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use tracing::{debug, trace};

use super::bit_cursor::BitCursor;
use super::error::{Result, Wdc5Error};
use super::field::FieldDecoder;
use super::header::{
    COLUMN_META_SIZE, ColumnCompression, ColumnMeta, FieldMeta, HEADER_SIZE, RawColumnMeta,
    SECTION_HEADER_SIZE, SectionHeader, WDC5_MAGIC, Wdc5Header,
};
use super::row::{NonceSource, ScratchPool, Wdc5Row};
use super::section::{
    Section, SectionLoad, SkippedSection, load_section, read_array, read_one,
};

/// Options for [`Wdc5Table::parse_with_options`]
#[derive(Debug, Clone, Default)]
pub struct Wdc5Options {
    /// Id used to derive per-record nonces in encrypted sections
    pub nonce_source: NonceSource,
    /// Fields stored as inline strings in sparse tables
    pub string_columns: HashSet<usize>,
}

impl Wdc5Options {
    /// Set the nonce source
    #[must_use]
    pub const fn with_nonce_source(mut self, nonce_source: NonceSource) -> Self {
        self.nonce_source = nonce_source;
        self
    }

    /// Set the inline string columns
    #[must_use]
    pub fn with_string_columns(mut self, columns: impl IntoIterator<Item = usize>) -> Self {
        self.string_columns = columns.into_iter().collect();
        self
    }
}

#[derive(Debug, Clone, Copy, BinRead)]
#[br(little)]
struct CommonEntry {
    id: u32,
    value: u32,
}

#[derive(Debug, Clone, Copy)]
struct RecordRef {
    section: usize,
    local: usize,
}

#[derive(Debug, Default)]
struct IdIndex {
    records: HashMap<u32, RecordRef>,
    copies: HashMap<u32, u32>,
}

/// A parsed WDC5 table
///
/// Parsing reads all metadata and section data up front. Field values are
/// decoded lazily through [`Wdc5Row`]. The id index is built on the first
/// id lookup and shared by all later lookups.
#[derive(Debug)]
pub struct Wdc5Table {
    header: Wdc5Header,
    field_meta: Vec<FieldMeta>,
    columns: Vec<ColumnMeta>,
    pallets: Vec<Vec<u32>>,
    commons: Vec<HashMap<u32, u32>>,
    sections: Vec<Section>,
    skipped: Vec<SkippedSection>,
    strings: Vec<u8>,
    total_records: usize,
    options: Wdc5Options,
    id_index: OnceLock<Result<IdIndex>>,
    scratch: ScratchPool,
}

impl Wdc5Table {
    /// Parse a table with default options
    pub fn parse(data: &[u8], keys: &dyn TactKeyProvider) -> Result<Self> {
        Self::parse_with_options(data, keys, Wdc5Options::default())
    }

    /// Parse a table
    pub fn parse_with_options(
        data: &[u8],
        keys: &dyn TactKeyProvider,
        options: Wdc5Options,
    ) -> Result<Self> {
        if data.len() < 4 {
            return Err(Wdc5Error::Truncated {
                structure: "header",
                offset: 0,
                needed: HEADER_SIZE,
                available: data.len(),
            });
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&data[..4]);
        if magic != WDC5_MAGIC {
            return Err(Wdc5Error::InvalidMagic(magic));
        }

        let mut cursor = Cursor::new(data);
        let header: Wdc5Header = read_one(&mut cursor, HEADER_SIZE, "header")?;

        debug!(
            "WDC5 table {:08X}: {} records, {} fields, {} sections, flags {}",
            header.table_hash,
            header.record_count,
            header.field_count,
            header.section_count,
            header.flags
        );

        let section_headers: Vec<SectionHeader> = read_array(
            &mut cursor,
            header.section_count as usize,
            SECTION_HEADER_SIZE,
            "section headers",
        )?;
        let field_meta: Vec<FieldMeta> =
            read_array(&mut cursor, header.field_count as usize, 4, "field metadata")?;
        let raw_columns: Vec<RawColumnMeta> = read_array(
            &mut cursor,
            header.column_meta_size as usize / COLUMN_META_SIZE,
            COLUMN_META_SIZE,
            "column metadata",
        )?;

        if raw_columns.len() < field_meta.len() {
            return Err(Wdc5Error::corrupt(
                "column metadata",
                format!(
                    "{} columns for {} fields",
                    raw_columns.len(),
                    field_meta.len()
                ),
            ));
        }

        let columns = raw_columns
            .iter()
            .enumerate()
            .map(|(field, raw)| ColumnMeta::from_raw(field, raw))
            .collect::<Result<Vec<_>>>()?;

        let pallet_start = cursor.position();
        let mut pallets = Vec::with_capacity(columns.len());
        for column in &columns {
            let values = match column.compression {
                ColumnCompression::Pallet(_) | ColumnCompression::PalletArray(_) => read_array(
                    &mut cursor,
                    column.additional_data_size as usize / 4,
                    4,
                    "pallet data",
                )?,
                _ => Vec::new(),
            };
            pallets.push(values);
        }

        cursor.set_position(pallet_start + u64::from(header.pallet_data_size));
        let mut commons = Vec::with_capacity(columns.len());
        for column in &columns {
            let map = match column.compression {
                ColumnCompression::Common { .. } => read_array::<CommonEntry>(
                    &mut cursor,
                    column.additional_data_size as usize / 8,
                    8,
                    "common data",
                )?
                .into_iter()
                .map(|e| (e.id, e.value))
                .collect(),
                _ => HashMap::new(),
            };
            commons.push(map);
        }

        let mut sections = Vec::new();
        let mut skipped = Vec::new();
        let mut strings = Vec::with_capacity(header.string_table_size as usize);
        let mut first_global_record = 0usize;

        for (index, section_header) in section_headers.into_iter().enumerate() {
            let record_count = section_header.record_count as usize;
            match load_section(
                data,
                &header,
                index,
                section_header,
                first_global_record,
                keys,
                &mut strings,
            )? {
                SectionLoad::Loaded(section) => sections.push(section),
                SectionLoad::Skipped(skip) => skipped.push(skip),
            }
            first_global_record += record_count;
        }

        Ok(Self {
            header,
            field_meta,
            columns,
            pallets,
            commons,
            sections,
            skipped,
            strings,
            total_records: first_global_record,
            options,
            id_index: OnceLock::new(),
            scratch: ScratchPool::default(),
        })
    }

    /// Table header
    pub const fn header(&self) -> &Wdc5Header {
        &self.header
    }

    /// Number of declared fields
    pub fn field_count(&self) -> usize {
        self.field_meta.len()
    }

    /// Column metadata of every field
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// Number of readable records, copies excluded
    pub fn len(&self) -> usize {
        self.sections.iter().map(Section::record_count).sum()
    }

    /// Whether no record is readable
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sections left out because they could not be decrypted
    pub fn skipped_sections(&self) -> &[SkippedSection] {
        &self.skipped
    }

    /// All (id, source id) copy pairs, in section order
    pub fn copy_table(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.sections.iter().flat_map(|s| s.copy_table.iter().copied())
    }

    /// Readable records in file order
    pub fn rows(&self) -> impl Iterator<Item = Result<Wdc5Row<'_>>> + '_ {
        self.sections.iter().flat_map(move |section| {
            (0..section.record_count()).map(move |local| {
                let id = self.record_id(section, local)?;
                Ok(Wdc5Row::new(self, section, local, id, id))
            })
        })
    }

    /// Look up a record by id, following the copy table
    pub fn get(&self, id: u32) -> Result<Option<Wdc5Row<'_>>> {
        let index = self.id_index()?;
        let source_id = index.copies.get(&id).copied().unwrap_or(id);
        Ok(index.records.get(&source_id).map(|r| {
            Wdc5Row::new(self, &self.sections[r.section], r.local, id, source_id)
        }))
    }

    /// Whether `id` resolves to a record, directly or as a copy
    pub fn contains(&self, id: u32) -> Result<bool> {
        Ok(self.get(id)?.is_some())
    }

    /// Every resolvable id, copies included, sorted
    pub fn ids(&self) -> Result<Vec<u32>> {
        let index = self.id_index()?;
        let mut ids: Vec<u32> = index
            .records
            .keys()
            .copied()
            .chain(
                index
                    .copies
                    .iter()
                    .filter(|(_, source)| index.records.contains_key(source))
                    .map(|(&id, _)| id),
            )
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn id_index(&self) -> Result<&IdIndex> {
        match self.id_index.get_or_init(|| self.build_id_index()) {
            Ok(index) => Ok(index),
            Err(e) => Err(e.clone()),
        }
    }

    fn build_id_index(&self) -> Result<IdIndex> {
        let mut index = IdIndex::default();
        for (position, section) in self.sections.iter().enumerate() {
            for local in 0..section.record_count() {
                let id = self.record_id(section, local)?;
                index.records.entry(id).or_insert(RecordRef {
                    section: position,
                    local,
                });
            }
            for &(id, source) in &section.copy_table {
                index.copies.entry(id).or_insert(source);
            }
        }
        trace!(
            "built id index: {} records, {} copies",
            index.records.len(),
            index.copies.len()
        );
        Ok(index)
    }

    /// Virtual id of a record
    fn record_id(&self, section: &Section, local: usize) -> Result<u32> {
        if !section.ids.is_empty() {
            return section.ids.get(local).copied().ok_or_else(|| {
                Wdc5Error::corrupt("id list", format!("no id for record {local}"))
            });
        }

        let field = self.header.id_index as usize;
        if field >= self.field_meta.len() {
            return Ok((section.first_global_record + local) as u32);
        }

        let decoder = self.decoder(field)?;
        if matches!(decoder.column().compression, ColumnCompression::Common { .. }) {
            return Err(Wdc5Error::Unsupported(format!(
                "id field {field} uses common compression"
            )));
        }
        let width = decoder.scalar_width();
        if width > 32 {
            return Err(Wdc5Error::Unsupported(format!(
                "id field {field} is {width} bits wide"
            )));
        }

        let (start, _) = section.record_span(local, self.record_size());
        let mut cursor = BitCursor::at(
            &section.records,
            start + decoder.column().record_offset as usize,
        );
        Ok(decoder.decode(0, &mut cursor)? as u32)
    }

    pub(crate) fn decoder(&self, field: usize) -> Result<FieldDecoder<'_>> {
        let count = self.field_meta.len();
        let out_of_range = || Wdc5Error::FieldOutOfRange { field, count };
        let meta = self.field_meta.get(field).ok_or_else(out_of_range)?;
        let column = self.columns.get(field).ok_or_else(out_of_range)?;
        Ok(FieldDecoder::new(
            meta,
            column,
            &self.pallets[field],
            &self.commons[field],
        ))
    }

    pub(crate) const fn is_sparse(&self) -> bool {
        self.header.is_sparse()
    }

    pub(crate) fn has_string_columns(&self) -> bool {
        !self.options.string_columns.is_empty()
    }

    pub(crate) fn is_string_column(&self, field: usize) -> bool {
        self.options.string_columns.contains(&field)
    }

    pub(crate) const fn record_size(&self) -> usize {
        self.header.record_size as usize
    }

    /// Records over all sections, skipped ones included
    pub(crate) const fn total_records(&self) -> usize {
        self.total_records
    }

    pub(crate) fn strings(&self) -> &[u8] {
        &self.strings
    }

    pub(crate) const fn nonce_source(&self) -> NonceSource {
        self.options.nonce_source
    }

    pub(crate) const fn scratch(&self) -> &ScratchPool {
        &self.scratch
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use cascette_crypto::TactKeyStore;

    #[test]
    fn test_bad_magic() {
        let mut data = vec![0u8; HEADER_SIZE];
        data[..4].copy_from_slice(b"WDC3");
        let err = Wdc5Table::parse(&data, &TactKeyStore::empty()).unwrap_err();
        assert_eq!(err, Wdc5Error::InvalidMagic(*b"WDC3"));
    }

    #[test]
    fn test_short_header() {
        let mut data = vec![0u8; 100];
        data[..4].copy_from_slice(b"WDC5");
        let err = Wdc5Table::parse(&data, &TactKeyStore::empty()).unwrap_err();
        assert!(matches!(err, Wdc5Error::Truncated { structure: "header", .. }));
    }

    #[test]
    fn test_empty_table() {
        let mut data = vec![0u8; HEADER_SIZE];
        data[..4].copy_from_slice(b"WDC5");
        data[4] = 5;
        let table = Wdc5Table::parse(&data, &TactKeyStore::empty()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.field_count(), 0);
        assert!(table.get(1).unwrap().is_none());
        assert_eq!(table.rows().count(), 0);
    }
}
