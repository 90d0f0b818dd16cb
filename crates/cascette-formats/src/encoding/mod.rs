//! Encoding file: content key to encoding key mapping
//!
//! The encoding file maps the MD5 of decoded content (content key) to the
//! key of its BLTE-encoded form (encoding key). It is itself stored BLTE
//! encoded; [`EncodingIndex`] parses the decoded bytes.

mod entry;
mod error;
mod file;
mod header;
mod index;

pub use entry::CKeyPageEntry;
pub use error::EncodingError;
pub use file::EncodingIndex;
pub use header::{ENCODING_HEADER_SIZE, EncodingHeader};
pub use index::IndexEntry;
