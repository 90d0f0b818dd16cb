//! WDC5 client database tables
//!
//! WDC5 is the columnar table format used for DB2 files. A table consists
//! of a fixed header, per-column compression metadata, shared pallet and
//! common-value blocks, and one or more sections holding the records.
//! Sections may be encrypted with a TACT key; those are decrypted per field
//! access when the key is known and skipped otherwise.
//!
//! # Example
//!
//! ```no_run
//! use cascette_crypto::TactKeyStore;
//! use cascette_formats::wdc5::Wdc5Table;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = std::fs::read("Map.db2")?;
//! let table = Wdc5Table::parse(&data, &TactKeyStore::new())?;
//! for row in table.rows() {
//!     let row = row?;
//!     println!("{} {}", row.id(), row.string(1)?);
//! }
//! # Ok(())
//! # }
//! ```

mod bit_cursor;
mod error;
mod field;
mod header;
mod row;
mod section;
mod table;

pub use bit_cursor::{BitCursor, sign_extend};
pub use error::{ErrorKind, Result, Wdc5Error};
pub use field::{ElementWidth, FieldDecoder, as_f32, as_i32, as_signed};
pub use header::{
    COLUMN_META_SIZE, ColumnCompression, ColumnMeta, CompressionType, FieldMeta, HEADER_SIZE,
    ImmediateInfo, PalletInfo, RawColumnMeta, SECTION_HEADER_SIZE, SectionHeader, WDC5_MAGIC,
    Wdc5Flags, Wdc5Header,
};
pub use row::{FieldRead, NonceSource, ReadTrace, Wdc5Row};
pub use section::{SkipReason, SkippedSection, SparseEntry, sparse_record_starts};
pub use table::{Wdc5Options, Wdc5Table};
