//! Field value decoding
//!
//! A [`FieldDecoder`] combines a column's metadata with its pallet and
//! common tables and decodes one value from a [`BitCursor`].

use std::collections::HashMap;

use super::bit_cursor::{BitCursor, sign_extend};
use super::error::{Result, Wdc5Error};
use super::header::{ColumnCompression, ColumnMeta, FieldMeta};

/// Element width for array reads of uncompressed columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementWidth {
    /// 8-bit elements
    U8,
    /// 16-bit elements
    U16,
    /// 32-bit elements
    U32,
    /// 64-bit elements
    U64,
}

impl ElementWidth {
    /// Size of one element in bytes
    pub const fn bytes(self) -> u32 {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }

    /// Size of one element in bits
    pub const fn bits(self) -> u32 {
        self.bytes() * 8
    }
}

/// Decodes values of a single column
#[derive(Debug, Clone, Copy)]
pub struct FieldDecoder<'a> {
    field_meta: &'a FieldMeta,
    column: &'a ColumnMeta,
    pallet: &'a [u32],
    common: &'a HashMap<u32, u32>,
}

impl<'a> FieldDecoder<'a> {
    /// Create a decoder over one column's tables
    pub const fn new(
        field_meta: &'a FieldMeta,
        column: &'a ColumnMeta,
        pallet: &'a [u32],
        common: &'a HashMap<u32, u32>,
    ) -> Self {
        Self {
            field_meta,
            column,
            pallet,
            common,
        }
    }

    /// Column metadata
    pub const fn column(&self) -> &'a ColumnMeta {
        self.column
    }

    /// Number of bits a scalar decode consumes from the cursor
    pub fn scalar_width(&self) -> u32 {
        match self.column.compression {
            ColumnCompression::None { bit_width } => {
                let width = self.field_meta.width();
                if width > 0 {
                    width as u32
                } else if bit_width > 0 {
                    bit_width
                } else {
                    u32::from(self.column.size)
                }
            }
            ColumnCompression::Immediate(info) | ColumnCompression::SignedImmediate(info) => {
                info.bit_width
            }
            ColumnCompression::Common { .. } => 0,
            ColumnCompression::Pallet(info) | ColumnCompression::PalletArray(info) => {
                info.bit_width
            }
        }
    }

    /// Interpret a value returned by [`decode`](Self::decode) as signed
    ///
    /// Uncompressed fields are sign-extended from their stored width and
    /// signed immediates already are. Pallet and common entries are 32-bit
    /// words; unsigned immediates stay zero-extended.
    pub fn signed(&self, raw: u64) -> i64 {
        match self.column.compression {
            ColumnCompression::None { .. } => match self.scalar_width() {
                width @ 1..=63 => as_signed(raw, width),
                _ => raw as i64,
            },
            ColumnCompression::Immediate(_) | ColumnCompression::SignedImmediate(_) => raw as i64,
            ColumnCompression::Common { .. }
            | ColumnCompression::Pallet(_)
            | ColumnCompression::PalletArray(_) => i64::from(as_i32(raw)),
        }
    }

    /// Decode one scalar value
    ///
    /// `id` is only consulted for common columns. Signed immediates are
    /// returned sign-extended to 64 bits.
    pub fn decode(&self, id: u32, cursor: &mut BitCursor<'_>) -> Result<u64> {
        match self.column.compression {
            ColumnCompression::None { .. } => cursor.read_uint(self.scalar_width()),
            ColumnCompression::Immediate(info) => cursor.read_uint(info.bit_width),
            ColumnCompression::SignedImmediate(info) => {
                Ok(cursor.read_int_signed(info.bit_width)? as u64)
            }
            ColumnCompression::Common { default_value } => Ok(u64::from(
                self.common.get(&id).copied().unwrap_or(default_value),
            )),
            ColumnCompression::Pallet(info) => {
                let index = cursor.read_uint(info.bit_width)?;
                self.pallet_value(index)
            }
            ColumnCompression::PalletArray(info) => {
                if info.cardinality != 1 {
                    cursor.skip(info.bit_width as usize);
                    return Ok(0);
                }
                let index = cursor.read_uint(info.bit_width)?;
                self.pallet_value(index)
            }
        }
    }

    /// Decode an array value
    ///
    /// Uncompressed columns hold `size / element_bits` elements inline.
    /// Pallet arrays store one index selecting `cardinality` consecutive
    /// pallet values.
    pub fn decode_array(&self, width: ElementWidth, cursor: &mut BitCursor<'_>) -> Result<Vec<u64>> {
        match self.column.compression {
            ColumnCompression::None { .. } => {
                let count = u32::from(self.column.size) / width.bits();
                (0..count).map(|_| cursor.read_uint(width.bits())).collect()
            }
            ColumnCompression::PalletArray(info) => {
                let cardinality = info.cardinality as usize;
                let index = cursor.read_uint(info.bit_width)? as usize;
                let start = index.checked_mul(cardinality).ok_or_else(|| {
                    Wdc5Error::corrupt("pallet data", format!("array index {index} overflows"))
                })?;
                let values = self.pallet.get(start..start + cardinality).ok_or_else(|| {
                    Wdc5Error::corrupt(
                        "pallet data",
                        format!(
                            "array index {index} × {cardinality} exceeds {} pallet values",
                            self.pallet.len()
                        ),
                    )
                })?;
                Ok(values.iter().copied().map(u64::from).collect())
            }
            other => Err(Wdc5Error::Unsupported(format!(
                "array read of {}-compressed column",
                compression_name(&other)
            ))),
        }
    }

    fn pallet_value(&self, index: u64) -> Result<u64> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.pallet.get(i))
            .map(|&v| u64::from(v))
            .ok_or_else(|| {
                Wdc5Error::corrupt(
                    "pallet data",
                    format!("index {index} out of range for {} values", self.pallet.len()),
                )
            })
    }
}

fn compression_name(compression: &ColumnCompression) -> &'static str {
    match compression {
        ColumnCompression::None { .. } => "None",
        ColumnCompression::Immediate(_) => "Immediate",
        ColumnCompression::SignedImmediate(_) => "SignedImmediate",
        ColumnCompression::Common { .. } => "Common",
        ColumnCompression::Pallet(_) => "Pallet",
        ColumnCompression::PalletArray(_) => "PalletArray",
    }
}

/// Reinterpret the low 32 bits of a raw value as `i32`
pub const fn as_i32(raw: u64) -> i32 {
    raw as u32 as i32
}

/// Reinterpret the low 32 bits of a raw value as `f32`
pub const fn as_f32(raw: u64) -> f32 {
    f32::from_bits(raw as u32)
}

/// Sign-extend a raw value of `bits` width
pub const fn as_signed(raw: u64, bits: u32) -> i64 {
    sign_extend(raw, bits)
}
