//! WDC5 table decoding against synthetic tables
//!
//! Tables are assembled with the public header types so every layout
//! variant (dense, sparse, pallet, common, encrypted) can be exercised
//! without shipping game data.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use binrw::BinWrite;
use binrw::io::Cursor;
use cascette_crypto::{Salsa20Cipher, TactKey, TactKeyStore};
use cascette_formats::wdc5::{
    COLUMN_META_SIZE, ElementWidth, FieldMeta, FieldRead, HEADER_SIZE, NonceSource,
    RawColumnMeta, ReadTrace, SECTION_HEADER_SIZE, SectionHeader, SkipReason, SkippedSection,
    Wdc5Error, Wdc5Flags, Wdc5Header, Wdc5Options, Wdc5Table,
};
use pretty_assertions::assert_eq;

const KEY_NAME: u64 = 0xFA50_5078_126A_CB3E;
const KEY: [u8; 16] = [
    0xBD, 0xC5, 0x18, 0x62, 0xAB, 0xED, 0x79, 0xB2, 0xDE, 0x48, 0xC8, 0xE7, 0xE6, 0x6C, 0x62,
    0x00,
];

#[derive(Debug, Clone, Default)]
struct SectionSpec {
    key_lookup: u64,
    record_count: u32,
    records: Vec<u8>,
    strings: Vec<u8>,
    ids: Vec<u32>,
    copies: Vec<(u32, u32)>,
    sparse: Vec<(u32, u16)>,
    secondary_keys: Vec<u32>,
    parents: Vec<(u32, u32)>,
}

#[derive(Debug, Clone, Default)]
struct TableSpec {
    flags: u16,
    id_index: u16,
    record_size: u32,
    min_id: u32,
    max_id: u32,
    fields: Vec<FieldMeta>,
    columns: Vec<RawColumnMeta>,
    pallet: Vec<u32>,
    common: Vec<(u32, u32)>,
    sections: Vec<SectionSpec>,
}

impl TableSpec {
    fn build(&self) -> Vec<u8> {
        let sparse = self.flags & Wdc5Flags::SPARSE != 0;
        let secondary_first = self.flags & Wdc5Flags::SECONDARY_KEY != 0;

        let mut offset = HEADER_SIZE
            + self.sections.len() * SECTION_HEADER_SIZE
            + self.fields.len() * 4
            + self.columns.len() * COLUMN_META_SIZE
            + self.pallet.len() * 4
            + self.common.len() * 8;

        let mut section_headers = Vec::new();
        let mut body = Vec::new();
        for s in &self.sections {
            let file_offset = offset;
            let mut bytes = s.records.clone();
            let records_end = offset + bytes.len();
            bytes.extend_from_slice(&s.strings);
            for id in &s.ids {
                bytes.extend_from_slice(&id.to_le_bytes());
            }
            for (id, source) in &s.copies {
                bytes.extend_from_slice(&id.to_le_bytes());
                bytes.extend_from_slice(&source.to_le_bytes());
            }
            for (entry_offset, size) in &s.sparse {
                bytes.extend_from_slice(&entry_offset.to_le_bytes());
                bytes.extend_from_slice(&size.to_le_bytes());
            }

            let mut secondary = Vec::new();
            for key in &s.secondary_keys {
                secondary.extend_from_slice(&key.to_le_bytes());
            }
            if secondary_first {
                bytes.extend_from_slice(&secondary);
            }
            let parent_size = if s.parents.is_empty() {
                0
            } else {
                12 + 8 * s.parents.len()
            };
            if !s.parents.is_empty() {
                bytes.extend_from_slice(&(s.parents.len() as u32).to_le_bytes());
                bytes.extend_from_slice(&0u32.to_le_bytes());
                bytes.extend_from_slice(&0u32.to_le_bytes());
                for (parent, index) in &s.parents {
                    bytes.extend_from_slice(&parent.to_le_bytes());
                    bytes.extend_from_slice(&index.to_le_bytes());
                }
            }
            if !secondary_first {
                bytes.extend_from_slice(&secondary);
            }

            section_headers.push(SectionHeader {
                tact_key_lookup: s.key_lookup,
                file_offset: file_offset as u32,
                record_count: s.record_count,
                string_table_size: s.strings.len() as u32,
                offset_records_end: if sparse { records_end as u32 } else { 0 },
                id_list_size: (s.ids.len() * 4) as u32,
                parent_lookup_data_size: parent_size as u32,
                offset_map_id_count: s.sparse.len() as u32,
                copy_table_count: s.copies.len() as u32,
            });
            offset += bytes.len();
            body.extend(bytes);
        }

        let header = Wdc5Header {
            version: 5,
            schema_string: [0; 128],
            record_count: self.sections.iter().map(|s| s.record_count).sum(),
            field_count: self.fields.len() as u32,
            record_size: self.record_size,
            string_table_size: self.sections.iter().map(|s| s.strings.len() as u32).sum(),
            table_hash: 0x1234_5678,
            layout_hash: 0x9ABC_DEF0,
            min_id: self.min_id,
            max_id: self.max_id,
            locale: 0,
            flags: Wdc5Flags::new(self.flags),
            id_index: self.id_index,
            total_field_count: self.fields.len() as u32,
            bitpacked_data_offset: 0,
            lookup_column_count: 0,
            column_meta_size: (self.columns.len() * COLUMN_META_SIZE) as u32,
            common_data_size: (self.common.len() * 8) as u32,
            pallet_data_size: (self.pallet.len() * 4) as u32,
            section_count: self.sections.len() as u32,
        };

        let mut cursor = Cursor::new(Vec::new());
        header.write(&mut cursor).unwrap();
        for section in &section_headers {
            section.write(&mut cursor).unwrap();
        }
        for field in &self.fields {
            field.write(&mut cursor).unwrap();
        }
        for column in &self.columns {
            column.write(&mut cursor).unwrap();
        }
        let mut data = cursor.into_inner();
        for value in &self.pallet {
            data.extend_from_slice(&value.to_le_bytes());
        }
        for (id, value) in &self.common {
            data.extend_from_slice(&id.to_le_bytes());
            data.extend_from_slice(&value.to_le_bytes());
        }
        data.extend(body);
        data
    }
}

fn field(bits: i16, offset: u16) -> FieldMeta {
    FieldMeta { bits, offset }
}

fn column(record_offset: u16, size: u16, compression: u32, data: [u32; 3]) -> RawColumnMeta {
    RawColumnMeta {
        record_offset,
        size,
        additional_data_size: 0,
        compression,
        data,
    }
}

/// Write `width` bits of `value` LSB-first at `bit`
fn put_bits(record: &mut [u8], bit: usize, width: usize, value: u64) {
    for i in 0..width {
        if (value >> i) & 1 == 1 {
            record[(bit + i) / 8] |= 1 << ((bit + i) % 8);
        }
    }
}

/// Stored offset that resolves to `blob_pos` in the concatenated string blob
fn string_offset(global: u32, field_byte: u32, record_size: u32, total: u32, blob_pos: u32) -> u32 {
    total * record_size + blob_pos - global * record_size - field_byte
}

/// u32 id, u16 immediate, i16 signed immediate in 8-byte records
fn dense_table() -> TableSpec {
    let values: [(u32, u64, i16); 3] = [(100, 7, -5), (200, 65_535, 300), (300, 0, i16::MIN)];
    let mut records = Vec::new();
    for (a, b, c) in values {
        let mut record = [0u8; 8];
        put_bits(&mut record, 0, 32, u64::from(a));
        put_bits(&mut record, 32, 16, b);
        put_bits(&mut record, 48, 16, u64::from(c as u16));
        records.extend_from_slice(&record);
    }

    TableSpec {
        flags: Wdc5Flags::INDEX,
        record_size: 8,
        min_id: 10,
        max_id: 30,
        fields: vec![field(0, 0), field(16, 4), field(16, 6)],
        columns: vec![
            column(0, 32, 0, [0, 0, 0]),
            column(32, 16, 1, [0, 16, 0]),
            column(48, 16, 5, [16, 16, 0]),
        ],
        sections: vec![SectionSpec {
            record_count: 3,
            records,
            ids: vec![10, 20, 30],
            copies: vec![(40, 20), (50, 50)],
            parents: vec![(7, 0), (8, 2)],
            ..SectionSpec::default()
        }],
        ..TableSpec::default()
    }
}

#[test]
fn id_and_immediate_pairs_in_file_order() {
    let mut records = Vec::new();
    for (id, value) in [(3u64, 0xA1u64), (1, 0xB2), (2, 0xC3)] {
        let mut record = [0u8; 5];
        put_bits(&mut record, 0, 32, id);
        put_bits(&mut record, 32, 8, value);
        records.extend_from_slice(&record);
    }

    let spec = TableSpec {
        record_size: 5,
        min_id: 1,
        max_id: 3,
        fields: vec![field(0, 0), field(24, 4)],
        columns: vec![column(0, 32, 0, [0, 0, 0]), column(32, 8, 1, [0, 8, 0])],
        sections: vec![SectionSpec {
            record_count: 3,
            records,
            ..SectionSpec::default()
        }],
        ..TableSpec::default()
    };
    let data = spec.build();
    let table = Wdc5Table::parse(&data, &TactKeyStore::empty()).unwrap();

    let pairs: Vec<(u32, u64)> = table
        .rows()
        .map(|row| {
            let row = row.unwrap();
            (row.id(), row.field(1).unwrap())
        })
        .collect();
    assert_eq!(pairs, vec![(3, 0xA1), (1, 0xB2), (2, 0xC3)]);
    assert_eq!(table.get(2).unwrap().unwrap().field(1).unwrap(), 0xC3);
}

#[test]
fn dense_table_fields_ids_and_copies() {
    let data = dense_table().build();
    let table = Wdc5Table::parse(&data, &TactKeyStore::empty()).unwrap();

    assert_eq!(table.len(), 3);
    assert_eq!(table.field_count(), 3);
    assert_eq!(table.header().min_id, 10);

    let ids: Vec<u32> = table.rows().map(|r| r.unwrap().id()).collect();
    assert_eq!(ids, vec![10, 20, 30]);

    let row = table.get(20).unwrap().unwrap();
    assert_eq!(row.field(0).unwrap(), 200);
    assert_eq!(row.field(1).unwrap(), 65_535);
    assert_eq!(row.field_signed(2).unwrap(), 300);

    let first = table.get(10).unwrap().unwrap();
    assert_eq!(first.field_i32(0).unwrap(), 100);
    assert_eq!(first.field_signed(2).unwrap(), -5);
    assert_eq!(
        table.get(30).unwrap().unwrap().field_signed(2).unwrap(),
        i64::from(i16::MIN)
    );
}

#[test]
fn dense_table_copy_table_and_parents() {
    let data = dense_table().build();
    let table = Wdc5Table::parse(&data, &TactKeyStore::empty()).unwrap();

    let copy = table.get(40).unwrap().unwrap();
    assert!(copy.is_copy());
    assert_eq!(copy.id(), 40);
    assert_eq!(copy.source_id(), 20);
    assert_eq!(copy.field(0).unwrap(), 200);

    // Self-referencing pairs are dropped
    assert!(table.get(50).unwrap().is_none());
    assert!(!table.contains(50).unwrap());
    assert_eq!(table.copy_table().collect::<Vec<_>>(), vec![(40, 20)]);
    assert_eq!(table.ids().unwrap(), vec![10, 20, 30, 40]);
    assert!(table.get(99).unwrap().is_none());

    assert_eq!(table.get(10).unwrap().unwrap().parent_id(), Some(7));
    assert_eq!(table.get(20).unwrap().unwrap().parent_id(), None);
    assert_eq!(table.get(30).unwrap().unwrap().parent_id(), Some(8));
}

#[test]
fn field_index_out_of_range() {
    let data = dense_table().build();
    let table = Wdc5Table::parse(&data, &TactKeyStore::empty()).unwrap();
    let row = table.get(10).unwrap().unwrap();

    assert_eq!(
        row.field(3),
        Err(Wdc5Error::FieldOutOfRange { field: 3, count: 3 })
    );
}

#[test]
fn truncated_section_is_corrupt() {
    let data = dense_table().build();
    let err = Wdc5Table::parse(&data[..data.len() - 4], &TactKeyStore::empty()).unwrap_err();
    assert!(matches!(err, Wdc5Error::Truncated { .. }));
}

#[test]
fn pallet_common_and_id_field() {
    // f0: u32 id, f1: pallet (2 bits), f2: common, f3: pallet array (2 bits, cardinality 2)
    let mut records = Vec::new();
    for (id, pallet, array) in [(11u64, 2u64, 1u64), (12, 0, 0)] {
        let mut record = [0u8; 8];
        put_bits(&mut record, 0, 32, id);
        put_bits(&mut record, 32, 2, pallet);
        put_bits(&mut record, 34, 2, array);
        records.extend_from_slice(&record);
    }

    let mut columns = vec![
        column(0, 32, 0, [0, 0, 0]),
        column(32, 2, 3, [0, 2, 1]),
        column(34, 0, 2, [9, 0, 0]),
        column(34, 2, 4, [2, 2, 2]),
    ];
    columns[1].additional_data_size = 12;
    columns[2].additional_data_size = 8;
    columns[3].additional_data_size = 16;

    let spec = TableSpec {
        record_size: 8,
        min_id: 11,
        max_id: 12,
        fields: vec![field(0, 0), field(0, 4), field(0, 4), field(0, 4)],
        columns,
        pallet: vec![1000, 2000, 3000, 1, 2, 3, 4],
        common: vec![(11, 77)],
        sections: vec![SectionSpec {
            record_count: 2,
            records,
            ..SectionSpec::default()
        }],
        ..TableSpec::default()
    };
    let data = spec.build();
    let table = Wdc5Table::parse(&data, &TactKeyStore::empty()).unwrap();

    assert_eq!(table.ids().unwrap(), vec![11, 12]);

    let a = table.get(11).unwrap().unwrap();
    let b = table.get(12).unwrap().unwrap();
    assert_eq!(a.field(1).unwrap(), 3000);
    assert_eq!(b.field(1).unwrap(), 1000);
    assert_eq!(a.field(2).unwrap(), 77);
    assert_eq!(b.field(2).unwrap(), 9);
    assert_eq!(a.array(3, ElementWidth::U32).unwrap(), vec![3, 4]);
    assert_eq!(b.array(3, ElementWidth::U32).unwrap(), vec![1, 2]);

    // Scalar reads of multi-value pallet arrays consume the index and yield 0
    assert_eq!(a.field(3).unwrap(), 0);
    assert!(matches!(
        a.array(1, ElementWidth::U32),
        Err(Wdc5Error::Unsupported(_))
    ));
}

#[test]
fn signed_reads_follow_value_width() {
    // f0: u32 id, f1: pallet (2 bits), f2: common, f3: unsigned immediate (8 bits)
    let mut records = Vec::new();
    for (id, pallet, immediate) in [(11u64, 1u64, 0xFFu64), (12, 0, 0x7F)] {
        let mut record = [0u8; 8];
        put_bits(&mut record, 0, 32, id);
        put_bits(&mut record, 32, 2, pallet);
        put_bits(&mut record, 34, 8, immediate);
        records.extend_from_slice(&record);
    }

    let mut columns = vec![
        column(0, 32, 0, [0, 0, 0]),
        column(32, 2, 3, [0, 2, 1]),
        column(34, 0, 2, [0xFFFF_FFF6, 0, 0]),
        column(34, 8, 1, [2, 8, 0]),
    ];
    columns[1].additional_data_size = 8;
    columns[2].additional_data_size = 8;

    let spec = TableSpec {
        record_size: 8,
        min_id: 11,
        max_id: 12,
        fields: vec![field(0, 0), field(0, 4), field(0, 4), field(24, 4)],
        columns,
        pallet: vec![1000, 0xFFFF_FFFB],
        common: vec![(11, 0xFFFF_FFFE)],
        sections: vec![SectionSpec {
            record_count: 2,
            records,
            ..SectionSpec::default()
        }],
        ..TableSpec::default()
    };
    let data = spec.build();
    let table = Wdc5Table::parse(&data, &TactKeyStore::empty()).unwrap();

    let a = table.get(11).unwrap().unwrap();
    let b = table.get(12).unwrap().unwrap();

    assert_eq!(a.field(1).unwrap(), 0xFFFF_FFFB);
    assert_eq!(a.field_signed(1).unwrap(), -5);
    assert_eq!(a.field_i32(1).unwrap(), -5);
    assert_eq!(b.field_signed(1).unwrap(), 1000);

    assert_eq!(a.field_signed(2).unwrap(), -2);
    assert_eq!(b.field_signed(2).unwrap(), -10);

    assert_eq!(a.field_signed(3).unwrap(), 255);
    assert_eq!(b.field_signed(3).unwrap(), 127);

    assert_eq!(a.field_signed(0).unwrap(), 11);
}

#[test]
fn zero_id_list_becomes_sequential() {
    let one = |value: u32| value.to_le_bytes().to_vec();
    let spec = TableSpec {
        record_size: 4,
        min_id: 500,
        max_id: 502,
        fields: vec![field(0, 0)],
        columns: vec![column(0, 32, 0, [0, 0, 0])],
        sections: vec![
            SectionSpec {
                record_count: 2,
                records: [one(1), one(2)].concat(),
                ids: vec![0, 0],
                ..SectionSpec::default()
            },
            SectionSpec {
                record_count: 1,
                records: one(3),
                ids: vec![0],
                ..SectionSpec::default()
            },
        ],
        ..TableSpec::default()
    };
    let data = spec.build();
    let table = Wdc5Table::parse(&data, &TactKeyStore::empty()).unwrap();

    assert_eq!(table.ids().unwrap(), vec![500, 501, 502]);
    let last = table.get(502).unwrap().unwrap();
    assert_eq!(last.field(0).unwrap(), 3);
    assert_eq!(last.global_index(), 2);
    assert_eq!(last.section_index(), 1);
}

#[test]
fn dense_strings_span_sections() {
    // Blob: "alpha\0" at 0, "beta\0" at 6, "gamma\0" at 11
    let total = 3;
    let offset = |global, pos| string_offset(global, 0, 4, total, pos).to_le_bytes().to_vec();

    let spec = TableSpec {
        record_size: 4,
        fields: vec![field(0, 0)],
        columns: vec![column(0, 32, 0, [0, 0, 0])],
        sections: vec![
            SectionSpec {
                record_count: 1,
                records: offset(0, 0),
                strings: b"alpha\0".to_vec(),
                ids: vec![1],
                ..SectionSpec::default()
            },
            SectionSpec {
                record_count: 2,
                records: [offset(1, 6), 0u32.to_le_bytes().to_vec()].concat(),
                strings: b"beta\0gamma\0".to_vec(),
                ids: vec![2, 3],
                ..SectionSpec::default()
            },
        ],
        ..TableSpec::default()
    };
    let data = spec.build();
    let table = Wdc5Table::parse(&data, &TactKeyStore::empty()).unwrap();

    assert_eq!(table.get(1).unwrap().unwrap().string(0).unwrap(), "alpha");
    assert_eq!(table.get(2).unwrap().unwrap().string(0).unwrap(), "beta");
    // A zero offset is the empty string
    assert_eq!(table.get(3).unwrap().unwrap().string(0).unwrap(), "");
}

/// Three single-record sections; the middle one is encrypted
///
/// Blob: "first\0" at 0, "secret\0" at 6, "after\0" at 13. The encrypted
/// record is encrypted with the nonce of id 2 and copied to id 4.
fn encrypted_table(placeholder: bool) -> Vec<u8> {
    encrypted_spec(placeholder).build()
}

fn encrypted_spec(placeholder: bool) -> TableSpec {
    let total = 3;
    let offset = |global, pos| string_offset(global, 0, 4, total, pos).to_le_bytes();

    let mut secret = offset(1, 6);
    if placeholder {
        secret = [0; 4];
    } else {
        Salsa20Cipher::for_record(&KEY, 2).apply_keystream(&mut secret);
    }

    TableSpec {
        record_size: 4,
        fields: vec![field(0, 0)],
        columns: vec![column(0, 32, 0, [0, 0, 0])],
        sections: vec![
            SectionSpec {
                record_count: 1,
                records: offset(0, 0).to_vec(),
                strings: b"first\0".to_vec(),
                ids: vec![1],
                ..SectionSpec::default()
            },
            SectionSpec {
                key_lookup: KEY_NAME,
                record_count: 1,
                records: secret.to_vec(),
                strings: b"secret\0".to_vec(),
                ids: vec![2],
                copies: vec![(4, 2)],
                ..SectionSpec::default()
            },
            SectionSpec {
                record_count: 1,
                records: offset(2, 13).to_vec(),
                strings: b"after\0".to_vec(),
                ids: vec![3],
                ..SectionSpec::default()
            },
        ],
        ..TableSpec::default()
    }
}

fn keys() -> TactKeyStore {
    let mut store = TactKeyStore::empty();
    store.add(TactKey::new(KEY_NAME, KEY));
    store
}

#[test]
fn encrypted_section_without_key_is_skipped() {
    let data = encrypted_table(false);
    let table = Wdc5Table::parse(&data, &TactKeyStore::empty()).unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(
        table.skipped_sections(),
        &[SkippedSection {
            index: 1,
            key_lookup: KEY_NAME,
            record_count: 1,
            reason: SkipReason::MissingKey,
        }]
    );
    assert!(table.get(2).unwrap().is_none());
    assert!(table.get(4).unwrap().is_none());

    // Later sections keep their global numbering and string positions
    let after = table.get(3).unwrap().unwrap();
    assert_eq!(after.global_index(), 2);
    assert_eq!(after.string(0).unwrap(), "after");
    assert_eq!(table.get(1).unwrap().unwrap().string(0).unwrap(), "first");
}

#[test]
fn zero_filled_encrypted_section_is_placeholder() {
    let data = encrypted_table(true);
    let table = Wdc5Table::parse(&data, &keys()).unwrap();

    assert_eq!(table.skipped_sections().len(), 1);
    assert_eq!(table.skipped_sections()[0].reason, SkipReason::Placeholder);
    assert_eq!(table.ids().unwrap(), vec![1, 3]);
}

#[test]
fn encrypted_section_with_key_decrypts_per_record() {
    let data = encrypted_table(false);
    let table = Wdc5Table::parse(&data, &keys()).unwrap();

    assert!(table.skipped_sections().is_empty());
    assert_eq!(table.len(), 3);

    let row = table.get(2).unwrap().unwrap();
    assert_eq!(row.string(0).unwrap(), "secret");

    let mut reads = Vec::new();
    let mut trace = |read: &FieldRead| reads.push(*read);
    let value = row.field_traced(0, Some(&mut trace)).unwrap();
    assert_eq!(
        reads,
        vec![FieldRead {
            field: 0,
            bit_offset: 0,
            bit_width: 32,
            value,
        }]
    );
    assert_eq!(value, u64::from(string_offset(1, 0, 4, 3, 6)));

    // The copy is decrypted with its own id by default
    let copy = table.get(4).unwrap().unwrap();
    assert_eq!(copy.source_id(), 2);
    assert_ne!(copy.field(0).unwrap(), value);
}

#[test]
fn encrypted_section_without_id_list_is_skipped() {
    // Ids would come from field 0 of the ciphertext
    let mut spec = encrypted_spec(false);
    spec.sections[1].ids.clear();
    spec.sections[1].copies.clear();
    let data = spec.build();
    let table = Wdc5Table::parse(&data, &keys()).unwrap();

    assert_eq!(
        table.skipped_sections(),
        &[SkippedSection {
            index: 1,
            key_lookup: KEY_NAME,
            record_count: 1,
            reason: SkipReason::EncryptedIds,
        }]
    );
    assert_eq!(table.ids().unwrap(), vec![1, 3]);
    assert_eq!(table.get(3).unwrap().unwrap().string(0).unwrap(), "after");
}

#[test]
fn source_id_nonce_decrypts_copies() {
    let data = encrypted_table(false);
    let options = Wdc5Options::default().with_nonce_source(NonceSource::SourceId);
    let table = Wdc5Table::parse_with_options(&data, &keys(), options).unwrap();

    assert_eq!(table.get(4).unwrap().unwrap().string(0).unwrap(), "secret");
    assert_eq!(table.get(2).unwrap().unwrap().string(0).unwrap(), "secret");
}

/// Collects every traced read
#[derive(Default)]
struct Recorder(Vec<FieldRead>);

impl ReadTrace for Recorder {
    fn on_read(&mut self, read: &FieldRead) {
        self.0.push(*read);
    }
}

/// Sparse records: u32, inline string, u16
fn sparse_table(flags: u16) -> TableSpec {
    let mut records = Vec::new();
    records.extend_from_slice(&5u32.to_le_bytes());
    records.extend_from_slice(b"hello\0");
    records.extend_from_slice(&0x1234u16.to_le_bytes());
    records.extend_from_slice(&6u32.to_le_bytes());
    records.push(0);
    records.extend_from_slice(&0xBEEFu16.to_le_bytes());

    TableSpec {
        flags: Wdc5Flags::SPARSE | flags,
        fields: vec![field(0, 0), field(0, 4), field(16, 0)],
        columns: vec![
            column(0, 32, 0, [0, 0, 0]),
            column(32, 0, 0, [0, 0, 0]),
            column(0, 16, 0, [0, 16, 0]),
        ],
        sections: vec![SectionSpec {
            record_count: 2,
            records,
            sparse: vec![(0, 12), (0, 7)],
            secondary_keys: vec![100, 200],
            parents: vec![(9, 1)],
            ..SectionSpec::default()
        }],
        ..TableSpec::default()
    }
}

#[test]
fn sparse_inline_strings() {
    for flags in [0, Wdc5Flags::SECONDARY_KEY] {
        let data = sparse_table(flags).build();
        let options = Wdc5Options::default().with_string_columns([1]);
        let table = Wdc5Table::parse_with_options(&data, &TactKeyStore::empty(), options).unwrap();

        assert_eq!(table.ids().unwrap(), vec![100, 200]);

        let first = table.get(100).unwrap().unwrap();
        assert_eq!(first.field(0).unwrap(), 5);
        assert_eq!(first.string(1).unwrap(), "hello");
        assert_eq!(first.field(2).unwrap(), 0x1234);
        assert_eq!(first.parent_id(), None);

        let second = table.get(200).unwrap().unwrap();
        assert_eq!(second.field(0).unwrap(), 6);
        assert_eq!(second.string(1).unwrap(), "");
        assert_eq!(second.field(2).unwrap(), 0xBEEF);
        assert_eq!(second.parent_id(), Some(9));

        let mut recorder = Recorder::default();
        first.field_traced(2, Some(&mut recorder)).unwrap();
        first.string_traced(1, Some(&mut recorder)).unwrap();
        assert_eq!(
            recorder.0,
            vec![
                FieldRead {
                    field: 2,
                    bit_offset: 80,
                    bit_width: 16,
                    value: 0x1234,
                },
                FieldRead {
                    field: 1,
                    bit_offset: 32,
                    bit_width: 48,
                    value: 5,
                },
            ]
        );
    }
}

#[test]
fn sparse_offsets_out_of_order_rejected() {
    let mut spec = sparse_table(0);
    let base = (HEADER_SIZE
        + SECTION_HEADER_SIZE
        + 3 * 4
        + 3 * COLUMN_META_SIZE) as u32;
    spec.sections[0].sparse = vec![(base + 12, 7), (base, 12)];

    let data = spec.build();
    let options = Wdc5Options::default().with_string_columns([1]);
    let err = Wdc5Table::parse_with_options(&data, &TactKeyStore::empty(), options).unwrap_err();
    assert!(matches!(err, Wdc5Error::InvalidSparseOffsets { section: 0, .. }));
}
