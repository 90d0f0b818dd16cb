//! Root file parsing
//!
//! The root file maps file data ids to content keys. Versions V1-V4 are
//! detected from the header; see [`RootHeader`] for the layouts.
//!
//! When the same id appears in several blocks the index keeps one entry,
//! preferring unencrypted content, then en-US, then Windows-loadable
//! blocks. Entries of equal rank keep the first one seen.
//!
//! ```rust,no_run
//! use cascette_formats::root::RootIndex;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = std::fs::read("root.bin")?;
//! let root = RootIndex::parse(&data)?;
//! if let Some(ckey) = root.lookup(1_349_477) {
//!     println!("{}", ckey.to_hex());
//! }
//! # Ok(())
//! # }
//! ```

mod block;
mod error;
mod file;
mod flags;
mod header;
mod version;

pub use block::{RootBlock, RootRecord};
pub use error::{Result, RootError};
pub use file::{RootEntry, RootIndex};
pub use flags::{ContentFlags, LocaleFlags};
pub use header::RootHeader;
pub use version::RootVersion;
