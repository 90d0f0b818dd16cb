//! Little-endian, unaligned bit reader
//!
//! Record fields in WDC5 are bit-packed and start at arbitrary bit offsets.
//! A read loads the 8 bytes at `position >> 3`, shifts right by
//! `position & 7` and masks to the requested width. Bytes past the end of the
//! buffer read as zero; dense record buffers carry 8 bytes of padding so
//! trailing reads stay inside real data.
//!
//! The cursor is `Copy`. Code that needs to look ahead (string lookups,
//! offset walks) works on a copy and leaves the caller's position alone.

use super::error::{Result, Wdc5Error};

/// Bit-position cursor over a byte buffer
#[derive(Debug, Clone, Copy)]
pub struct BitCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BitCursor<'a> {
    /// Create a cursor at bit 0
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Create a cursor at the given bit position
    pub const fn at(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    /// Current bit position
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Move to an absolute bit position
    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    /// Advance by `bits` without reading
    pub fn skip(&mut self, bits: usize) {
        self.position += bits;
    }

    /// Underlying buffer
    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Read an unsigned value of `bits` width (0..=64)
    pub fn read_uint(&mut self, bits: u32) -> Result<u64> {
        let value = self.peek_uint(bits)?;
        self.position += bits as usize;
        Ok(value)
    }

    /// Read a two's-complement signed value of `bits` width (0..=64)
    pub fn read_int_signed(&mut self, bits: u32) -> Result<i64> {
        let raw = self.read_uint(bits)?;
        Ok(sign_extend(raw, bits))
    }

    /// Read a 32-bit-or-narrower value and reinterpret it as `i32`
    pub fn read_value32(&mut self, bits: u32) -> Result<i32> {
        if bits > 32 {
            return Err(Wdc5Error::Unsupported(format!(
                "{bits}-bit value read as 32-bit"
            )));
        }
        Ok(self.read_uint(bits)? as u32 as i32)
    }

    /// Read bytes up to a NUL terminator, advancing past it
    pub fn read_cstring(&mut self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        loop {
            if (self.position >> 3) >= self.data.len() {
                return Err(Wdc5Error::corrupt(
                    "inline string",
                    format!("no NUL terminator before end of record data at bit {}", self.position),
                ));
            }
            let byte = self.read_uint(8)? as u8;
            if byte == 0 {
                return Ok(bytes);
            }
            bytes.push(byte);
        }
    }

    fn peek_uint(&self, bits: u32) -> Result<u64> {
        if bits > 64 {
            return Err(Wdc5Error::InvalidBitCount(bits));
        }
        if bits == 0 {
            return Ok(0);
        }

        let byte = self.position >> 3;
        let shift = (self.position & 7) as u32;

        let mut window = [0u8; 8];
        if byte < self.data.len() {
            let end = (byte + 8).min(self.data.len());
            window[..end - byte].copy_from_slice(&self.data[byte..end]);
        }
        let mut value = u64::from_le_bytes(window) >> shift;

        // A 64-bit window shifted by up to 7 leaves fewer than `bits` bits
        if shift + bits > 64 {
            let ninth = self.data.get(byte + 8).copied().unwrap_or(0);
            value |= u64::from(ninth) << (64 - shift);
        }

        Ok(value & mask(bits))
    }
}

const fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Sign-extend the low `bits` of `raw` via `(signBit ^ raw) - signBit`
pub const fn sign_extend(raw: u64, bits: u32) -> i64 {
    if bits == 0 {
        return 0;
    }
    if bits >= 64 {
        return raw as i64;
    }
    let sign_bit = 1u64 << (bits - 1);
    ((sign_bit ^ (raw & mask(bits))).wrapping_sub(sign_bit)) as i64
}
