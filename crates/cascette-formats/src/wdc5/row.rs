//! Record access
//!
//! A [`Wdc5Row`] is a borrowed view of one record. Nothing is cached: every
//! accessor positions a fresh [`BitCursor`] and decodes on demand. Rows in
//! encrypted sections are decrypted into a pooled scratch buffer for the
//! duration of a single access.

use cascette_crypto::Salsa20Cipher;
use parking_lot::Mutex;
use std::ops::Deref;

use super::bit_cursor::BitCursor;
use super::error::{Result, Wdc5Error};
use super::field::{ElementWidth, FieldDecoder, as_f32, as_i32};
use super::section::{RECORD_PADDING, Section};
use super::table::Wdc5Table;

/// Which record id seeds the per-record Salsa20 nonce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NonceSource {
    /// The id the row was requested by
    #[default]
    DestinationId,
    /// The id of the record actually stored, after copy-table redirection
    SourceId,
}

/// One traced field read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRead {
    /// Field index
    pub field: usize,
    /// Bit offset of the read relative to the record start
    pub bit_offset: usize,
    /// Number of bits consumed
    pub bit_width: usize,
    /// Raw decoded value
    pub value: u64,
}

/// Observer for field reads
pub trait ReadTrace {
    /// Called once per decoded field
    fn on_read(&mut self, read: &FieldRead);
}

impl<F: FnMut(&FieldRead)> ReadTrace for F {
    fn on_read(&mut self, read: &FieldRead) {
        self(read);
    }
}

const MAX_POOLED_BUFFERS: usize = 16;

/// Pool of decryption buffers shared by all rows of a table
#[derive(Debug, Default)]
pub(crate) struct ScratchPool {
    buffers: Mutex<Vec<Vec<u8>>>,
}

impl ScratchPool {
    /// Take a zeroed buffer of `len` bytes
    pub fn take(&self, len: usize) -> ScratchBuffer<'_> {
        let mut buf = self.buffers.lock().pop().unwrap_or_default();
        buf.clear();
        buf.resize(len, 0);
        ScratchBuffer { pool: self, buf }
    }

    #[cfg(test)]
    pub fn all_zero(&self) -> bool {
        self.buffers
            .lock()
            .iter()
            .all(|b| b.iter().all(|&byte| byte == 0))
    }

    #[cfg(test)]
    pub fn pooled(&self) -> usize {
        self.buffers.lock().len()
    }
}

/// Buffer borrowed from a [`ScratchPool`], cleared on drop
pub(crate) struct ScratchBuffer<'p> {
    pool: &'p ScratchPool,
    buf: Vec<u8>,
}

impl ScratchBuffer<'_> {
    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Deref for ScratchBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl Drop for ScratchBuffer<'_> {
    fn drop(&mut self) {
        self.buf.fill(0);
        let buf = std::mem::take(&mut self.buf);
        let mut buffers = self.pool.buffers.lock();
        if buffers.len() < MAX_POOLED_BUFFERS {
            buffers.push(buf);
        }
    }
}

/// Record bytes and the record's first bit within them
struct RecordView<'v> {
    data: &'v [u8],
    start: usize,
}

/// A record of a [`Wdc5Table`]
#[derive(Clone, Copy)]
pub struct Wdc5Row<'t> {
    table: &'t Wdc5Table,
    section: &'t Section,
    local: usize,
    id: u32,
    source_id: u32,
}

impl std::fmt::Debug for Wdc5Row<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wdc5Row")
            .field("id", &self.id)
            .field("source_id", &self.source_id)
            .field("section", &self.section.index)
            .field("local", &self.local)
            .finish()
    }
}

impl<'t> Wdc5Row<'t> {
    pub(crate) const fn new(
        table: &'t Wdc5Table,
        section: &'t Section,
        local: usize,
        id: u32,
        source_id: u32,
    ) -> Self {
        Self {
            table,
            section,
            local,
            id,
            source_id,
        }
    }

    /// Id the row was requested by
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Id of the stored record; differs from [`id`](Self::id) for copies
    pub const fn source_id(&self) -> u32 {
        self.source_id
    }

    /// Whether the row was reached through the copy table
    pub const fn is_copy(&self) -> bool {
        self.id != self.source_id
    }

    /// Parent id from the section's parent lookup table
    pub fn parent_id(&self) -> Option<u32> {
        self.section.parent_lookup.get(&self.local).copied()
    }

    /// Index of the record across all sections, skipped ones included
    pub const fn global_index(&self) -> usize {
        self.section.first_global_record + self.local
    }

    /// Section the record lives in
    pub const fn section_index(&self) -> usize {
        self.section.index
    }

    /// Raw scalar value of `field`
    pub fn field(&self, field: usize) -> Result<u64> {
        self.field_traced(field, None)
    }

    /// Raw scalar value of `field`, reported to `trace`
    pub fn field_traced(&self, field: usize, trace: Option<&mut dyn ReadTrace>) -> Result<u64> {
        let decoder = self.table.decoder(field)?;
        self.with_record(|record| {
            let mut cursor = self.field_cursor(&record, field)?;
            let start = cursor.position();
            let value = decoder.decode(self.source_id, &mut cursor)?;
            report(trace, field, start - record.start, cursor.position() - start, value);
            Ok(value)
        })
    }

    /// `field` sign-extended from its stored width
    pub fn field_signed(&self, field: usize) -> Result<i64> {
        self.field_signed_traced(field, None)
    }

    /// Traced [`field_signed`](Self::field_signed)
    pub fn field_signed_traced(
        &self,
        field: usize,
        trace: Option<&mut dyn ReadTrace>,
    ) -> Result<i64> {
        let decoder = self.table.decoder(field)?;
        let raw = self.field_traced(field, trace)?;
        Ok(decoder.signed(raw))
    }

    /// `field` reinterpreted as `i32`
    pub fn field_i32(&self, field: usize) -> Result<i32> {
        self.field(field).map(as_i32)
    }

    /// `field` reinterpreted as `f32`
    pub fn field_f32(&self, field: usize) -> Result<f32> {
        self.field_f32_traced(field, None)
    }

    /// Traced [`field_f32`](Self::field_f32)
    pub fn field_f32_traced(
        &self,
        field: usize,
        trace: Option<&mut dyn ReadTrace>,
    ) -> Result<f32> {
        self.field_traced(field, trace).map(as_f32)
    }

    /// Array value of `field`
    pub fn array(&self, field: usize, width: ElementWidth) -> Result<Vec<u64>> {
        self.array_traced(field, width, None)
    }

    /// Traced [`array`](Self::array); the trace sees one event per element
    pub fn array_traced(
        &self,
        field: usize,
        width: ElementWidth,
        trace: Option<&mut dyn ReadTrace>,
    ) -> Result<Vec<u64>> {
        let decoder = self.table.decoder(field)?;
        self.with_record(|record| {
            let mut cursor = self.field_cursor(&record, field)?;
            let start = cursor.position();
            let values = decoder.decode_array(width, &mut cursor)?;
            if let Some(trace) = trace {
                let consumed = cursor.position() - start;
                let step = if values.is_empty() {
                    0
                } else {
                    consumed / values.len()
                };
                for (i, &value) in values.iter().enumerate() {
                    trace.on_read(&FieldRead {
                        field,
                        bit_offset: start - record.start + i * step,
                        bit_width: step,
                        value,
                    });
                }
            }
            Ok(values)
        })
    }

    /// String value of `field`
    ///
    /// Dense tables resolve the stored offset into the table's string
    /// blob. Sparse tables store strings inline in the record.
    pub fn string(&self, field: usize) -> Result<String> {
        self.string_traced(field, None)
    }

    /// Traced [`string`](Self::string); the trace sees the offset or, for
    /// inline strings, the string's byte length
    pub fn string_traced(&self, field: usize, trace: Option<&mut dyn ReadTrace>) -> Result<String> {
        if self.table.is_sparse() {
            self.inline_string(field, trace)
        } else {
            self.dense_string(field, trace)
        }
    }

    fn dense_string(&self, field: usize, trace: Option<&mut dyn ReadTrace>) -> Result<String> {
        let decoder = self.table.decoder(field)?;
        let offset = self.field_traced(field, trace)?;
        let offset = i64::from(as_i32(offset));
        if offset <= 0 {
            return Ok(String::new());
        }

        let record_size = self.table.record_size() as i64;
        let field_byte = i64::from(decoder.column().record_offset / 8);
        let position = self.global_index() as i64 * record_size + field_byte + offset
            - self.table.total_records() as i64 * record_size;

        let strings = self.table.strings();
        let start = usize::try_from(position)
            .ok()
            .filter(|&p| p < strings.len())
            .ok_or_else(|| {
                Wdc5Error::corrupt(
                    "string table",
                    format!(
                        "record {} field {field} points to {position}, table has {} bytes",
                        self.id,
                        strings.len()
                    ),
                )
            })?;
        let end = strings[start..]
            .iter()
            .position(|&b| b == 0)
            .map_or(strings.len(), |n| start + n);

        Ok(String::from_utf8_lossy(&strings[start..end]).into_owned())
    }

    fn inline_string(&self, field: usize, trace: Option<&mut dyn ReadTrace>) -> Result<String> {
        self.table.decoder(field)?;
        self.with_record(|record| {
            let mut cursor = self.walk_to(&record, field)?;
            let start = cursor.position();
            let bytes = cursor.read_cstring()?;
            report(
                trace,
                field,
                start - record.start,
                cursor.position() - start,
                bytes.len() as u64,
            );
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        })
    }

    /// Cursor positioned at the start of `field`
    fn field_cursor<'v>(&self, record: &RecordView<'v>, field: usize) -> Result<BitCursor<'v>> {
        if self.table.is_sparse() && self.table.has_string_columns() {
            return self.walk_to(record, field);
        }
        let column = self.table.decoder(field)?.column();
        Ok(BitCursor::at(
            record.data,
            record.start + column.record_offset as usize,
        ))
    }

    /// Walk every field before `field`, skipping inline strings to their NUL
    fn walk_to<'v>(&self, record: &RecordView<'v>, field: usize) -> Result<BitCursor<'v>> {
        let mut cursor = BitCursor::at(record.data, record.start);
        for preceding in 0..field {
            if self.table.is_string_column(preceding) {
                cursor.read_cstring()?;
            } else {
                let decoder: FieldDecoder<'_> = self.table.decoder(preceding)?;
                cursor.skip(decoder.column().size as usize);
            }
        }
        Ok(cursor)
    }

    /// Run `f` over the record's bytes, decrypting them first if needed
    fn with_record<T>(&self, f: impl FnOnce(RecordView<'_>) -> Result<T>) -> Result<T> {
        let (start, len) = self
            .section
            .record_span(self.local, self.table.record_size());

        let Some(key) = self.section.key else {
            return f(RecordView {
                data: &self.section.records,
                start,
            });
        };

        let byte_start = start / 8;
        let record = self
            .section
            .records
            .get(byte_start..byte_start + len)
            .ok_or_else(|| {
                Wdc5Error::corrupt(
                    "section records",
                    format!("record {} spans past section data", self.id),
                )
            })?;

        let nonce_id = match self.table.nonce_source() {
            NonceSource::DestinationId => self.id,
            NonceSource::SourceId => self.source_id,
        };

        let mut scratch = self.table.scratch().take(len + RECORD_PADDING);
        let plain = &mut scratch.as_mut_slice()[..len];
        plain.copy_from_slice(record);
        Salsa20Cipher::for_record(&key, u64::from(nonce_id)).apply_keystream(plain);

        f(RecordView {
            data: &scratch[..],
            start: 0,
        })
    }
}

fn report(
    trace: Option<&mut dyn ReadTrace>,
    field: usize,
    bit_offset: usize,
    bit_width: usize,
    value: u64,
) {
    if let Some(trace) = trace {
        trace.on_read(&FieldRead {
            field,
            bit_offset,
            bit_width,
            value,
        });
    }
}
