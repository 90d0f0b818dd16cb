//! WDC5 header structures
//!
//! File layout up to the section data:
//!
//! ```text
//! [Header: 204 bytes]
//! [SectionHeader × section_count: 40 bytes each]
//! [FieldMeta × field_count: 4 bytes each]
//! [ColumnMeta × column_meta_size / 24: 24 bytes each]
//! [Pallet data: pallet_data_size bytes]
//! [Common data: common_data_size bytes]
//! [Sections...]
//! ```

use binrw::{BinRead, BinWrite};
use std::fmt;

use super::error::{Result, Wdc5Error};

/// WDC5 magic bytes
pub const WDC5_MAGIC: [u8; 4] = *b"WDC5";

/// Size of the fixed header: 4-byte magic plus the 200-byte header body
pub const HEADER_SIZE: usize = 204;

/// Size of one section descriptor
pub const SECTION_HEADER_SIZE: usize = 40;

/// Size of one raw column metadata entry
pub const COLUMN_META_SIZE: usize = 24;

/// Table-level flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Wdc5Flags(u16);

impl Wdc5Flags {
    /// Records have variable size and an offset map
    pub const SPARSE: u16 = 0x0001;
    /// Secondary key array precedes the parent lookup table
    pub const SECONDARY_KEY: u16 = 0x0002;
    /// Table has an explicit id list
    pub const INDEX: u16 = 0x0004;
    /// Fields are bit-packed
    pub const BITPACKED: u16 = 0x0010;

    /// Wrap a raw flag value
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Raw value
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Check if a flag is set
    pub const fn has(self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    /// Whether the table uses the sparse layout
    pub const fn is_sparse(self) -> bool {
        self.has(Self::SPARSE)
    }

    /// Whether the secondary key flag is set
    pub const fn has_secondary_key(self) -> bool {
        self.has(Self::SECONDARY_KEY)
    }
}

impl fmt::Display for Wdc5Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// Fixed WDC5 table header
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little, magic = b"WDC5")]
pub struct Wdc5Header {
    /// Schema version, 5 for WDC5
    pub version: u32,
    /// NUL-padded schema/build string
    pub schema_string: [u8; 128],
    /// Total records over all sections
    pub record_count: u32,
    /// Number of declared fields
    pub field_count: u32,
    /// Fixed record size in bytes, 0 for sparse tables
    pub record_size: u32,
    /// Total string table size over all sections
    pub string_table_size: u32,
    /// Table name hash
    pub table_hash: u32,
    /// Layout hash identifying the column set
    pub layout_hash: u32,
    /// Smallest record id
    pub min_id: u32,
    /// Largest record id
    pub max_id: u32,
    /// Locale the table was built for
    pub locale: u32,
    /// Table flags
    #[br(map = Wdc5Flags::new)]
    #[bw(map = |f: &Wdc5Flags| f.value())]
    pub flags: Wdc5Flags,
    /// Index of the field holding the record id
    pub id_index: u16,
    /// Field count including non-inline fields
    pub total_field_count: u32,
    /// Offset of the bit-packed region within a record
    pub bitpacked_data_offset: u32,
    /// Number of lookup columns
    pub lookup_column_count: u32,
    /// Size of the column metadata block in bytes
    pub column_meta_size: u32,
    /// Size of the common data block in bytes
    pub common_data_size: u32,
    /// Size of the pallet data block in bytes
    pub pallet_data_size: u32,
    /// Number of sections
    pub section_count: u32,
}

impl Wdc5Header {
    /// Schema string up to its first NUL
    pub fn schema(&self) -> String {
        let end = self
            .schema_string
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.schema_string.len());
        String::from_utf8_lossy(&self.schema_string[..end]).into_owned()
    }

    /// Whether the table uses the sparse layout
    pub const fn is_sparse(&self) -> bool {
        self.flags.is_sparse()
    }
}

/// Section descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct SectionHeader {
    /// TACT key name, 0 for unencrypted sections
    pub tact_key_lookup: u64,
    /// Absolute offset of the section's record data
    pub file_offset: u32,
    /// Number of records in the section
    pub record_count: u32,
    /// String table size in bytes
    pub string_table_size: u32,
    /// Absolute end offset of sparse record data
    pub offset_records_end: u32,
    /// Size of the explicit id array in bytes
    pub id_list_size: u32,
    /// Size of the parent lookup block in bytes
    pub parent_lookup_data_size: u32,
    /// Number of sparse offset map entries
    pub offset_map_id_count: u32,
    /// Number of copy table entries
    pub copy_table_count: u32,
}

impl SectionHeader {
    /// Whether the section is encrypted
    pub const fn is_encrypted(&self) -> bool {
        self.tact_key_lookup != 0
    }
}

/// Per-field packing for the uncompressed case
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct FieldMeta {
    /// Encoded width: the field is `32 - bits` bits wide
    pub bits: i16,
    /// Byte offset within the record
    pub offset: u16,
}

impl FieldMeta {
    /// Width in bits derived from the encoded value, may be ≤ 0
    pub const fn width(&self) -> i32 {
        32 - self.bits as i32
    }
}

/// Column compression tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CompressionType {
    /// Plain field at a fixed bit offset
    None = 0,
    /// Bit-packed unsigned value
    Immediate = 1,
    /// Sparse id → value map with a default
    Common = 2,
    /// Index into a per-column value table
    Pallet = 3,
    /// Index into a per-column table of fixed-size arrays
    PalletArray = 4,
    /// Bit-packed signed value
    SignedImmediate = 5,
}

impl CompressionType {
    /// Parse from the raw tag
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Immediate),
            2 => Some(Self::Common),
            3 => Some(Self::Pallet),
            4 => Some(Self::PalletArray),
            5 => Some(Self::SignedImmediate),
            _ => None,
        }
    }
}

/// Bit-packing parameters for immediate columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImmediateInfo {
    /// Offset within the bit-packed region
    pub bit_offset: u32,
    /// Value width in bits
    pub bit_width: u32,
    /// Raw flags word
    pub flags: u32,
}

/// Pallet parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PalletInfo {
    /// Offset within the bit-packed region
    pub bit_offset: u32,
    /// Width of the pallet index in bits
    pub bit_width: u32,
    /// Number of pallet values per record (1 for scalar pallets)
    pub cardinality: u32,
}

/// Compression payload, exactly one per column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnCompression {
    /// Uncompressed; `bit_width` is the fallback width from the metadata union
    None {
        /// Fallback width when the field meta width is not positive
        bit_width: u32,
    },
    /// Unsigned bit-packed value
    Immediate(ImmediateInfo),
    /// Signed bit-packed value
    SignedImmediate(ImmediateInfo),
    /// Common-value column
    Common {
        /// Value for ids missing from the common map
        default_value: u32,
    },
    /// Scalar pallet index
    Pallet(PalletInfo),
    /// Array pallet index
    PalletArray(PalletInfo),
}

/// Raw 24-byte column metadata as stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct RawColumnMeta {
    /// Bit offset within the record
    pub record_offset: u16,
    /// Field size in bits
    pub size: u16,
    /// Size of the pallet or common block for this column
    pub additional_data_size: u32,
    /// Compression tag
    pub compression: u32,
    /// Compression-specific union
    pub data: [u32; 3],
}

/// Decoded column metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Bit offset within the record
    pub record_offset: u16,
    /// Field size in bits
    pub size: u16,
    /// Size of the pallet or common block for this column
    pub additional_data_size: u32,
    /// Compression and its parameters
    pub compression: ColumnCompression,
}

impl ColumnMeta {
    /// Decode the raw union for field `field`
    pub fn from_raw(field: usize, raw: &RawColumnMeta) -> Result<Self> {
        let kind = CompressionType::from_u32(raw.compression).ok_or(
            Wdc5Error::UnknownCompression {
                field,
                compression: raw.compression,
            },
        )?;

        let [a, b, c] = raw.data;
        let immediate = ImmediateInfo {
            bit_offset: a,
            bit_width: b,
            flags: c,
        };
        let pallet = PalletInfo {
            bit_offset: a,
            bit_width: b,
            cardinality: c,
        };

        let compression = match kind {
            CompressionType::None => ColumnCompression::None { bit_width: b },
            CompressionType::Immediate => ColumnCompression::Immediate(immediate),
            CompressionType::SignedImmediate => ColumnCompression::SignedImmediate(immediate),
            CompressionType::Common => ColumnCompression::Common { default_value: a },
            CompressionType::Pallet => ColumnCompression::Pallet(pallet),
            CompressionType::PalletArray => ColumnCompression::PalletArray(pallet),
        };

        Ok(Self {
            record_offset: raw.record_offset,
            size: raw.size,
            additional_data_size: raw.additional_data_size,
            compression,
        })
    }

    /// Compression tag of this column
    pub const fn compression_type(&self) -> CompressionType {
        match self.compression {
            ColumnCompression::None { .. } => CompressionType::None,
            ColumnCompression::Immediate(_) => CompressionType::Immediate,
            ColumnCompression::SignedImmediate(_) => CompressionType::SignedImmediate,
            ColumnCompression::Common { .. } => CompressionType::Common,
            ColumnCompression::Pallet(_) => CompressionType::Pallet,
            ColumnCompression::PalletArray(_) => CompressionType::PalletArray,
        }
    }
}
