//! Read-only access to local CASC installations.
//!
//! This crate resolves game files stored in a client's `Data` directory and
//! opens the DB2 tables among them. A lookup walks the CASC key chain:
//!
//! 1. Root file: `FileDataID` -> content key
//! 2. Encoding file: content key -> encoding key
//! 3. `.idx` journal: encoding key -> (archive, offset, size)
//! 4. `data.NNN` archive: 30-byte local header, then BLTE bytes
//!
//! # Storage Layout
//!
//! Both `.idx` and `.data` files live in `Data/data/`. The `shmem` file in
//! the same directory records which journal version is active per bucket.
//! Build configurations are stored under `Data/config/xx/yy/<hash>`.
//!
//! # Example
//!
//! ```no_run
//! use cascette_client_storage::{CascArchiveResolver, StorageConfig};
//! use cascette_crypto::TactKeyStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StorageConfig::new("/path/to/wow/Data");
//! let resolver = CascArchiveResolver::open(config, TactKeyStore::new())?;
//!
//! let table = resolver.open_table(1_349_477)?;
//! println!("{} rows", table.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

use cascette_crypto::{ContentKey, EncodingKey};
use thiserror::Error;

// Data archives
pub mod archive;

// Build configuration discovery
pub mod build_config;

// Configuration
pub mod config;

// Index journals
pub mod idx;

// Content resolution pipeline
pub mod resolver;

// Shared memory version file
pub mod shmem;

pub use archive::{ArchiveSet, LOCAL_HEADER_SIZE, LocalHeader};
pub use build_config::{BuildConfig, BuildInfoFile, ConfigKeys};
pub use config::{RowNonce, StorageConfig};
pub use idx::{ArchiveLocation, CascIdxIndex, IdxEntry};
pub use resolver::CascArchiveResolver;
pub use shmem::ShmemFile;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed on-disk structure.
    #[error("corrupt {structure}: {reason}")]
    Corrupt {
        /// Structure being read
        structure: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// The root file has no entry for a `FileDataID`.
    #[error("file {0} not found in root")]
    FileNotFound(u32),

    /// The encoding file has no entry for a content key.
    #[error("content key {0} not found in encoding")]
    ContentKeyNotFound(ContentKey),

    /// No journal entry exists for an encoding key.
    #[error("encoding key {0} not found in local indices")]
    EncodingKeyNotFound(EncodingKey),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// BLTE decoding failed.
    #[error("BLTE error: {0}")]
    Blte(#[from] cascette_formats::blte::BlteError),

    /// Encoding file parsing failed.
    #[error("encoding error: {0}")]
    Encoding(#[from] cascette_formats::encoding::EncodingError),

    /// Root file parsing failed.
    #[error("root error: {0}")]
    Root(#[from] cascette_formats::root::RootError),

    /// DB2 table parsing failed.
    #[error("WDC5 error: {0}")]
    Wdc5(#[from] cascette_formats::wdc5::Wdc5Error),

    /// Key material could not be loaded.
    #[error("crypto error: {0}")]
    Crypto(#[from] cascette_crypto::CryptoError),

    /// Binary structure could not be read.
    #[error("binary read error: {0}")]
    BinRw(#[from] binrw::Error),
}

impl StorageError {
    pub(crate) fn corrupt(structure: &'static str, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            structure,
            reason: reason.into(),
        }
    }
}

/// Version information for the storage system.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Data subdirectory where both `.idx` and `.data` files live.
///
/// CASC stores index and archive files in the same directory:
/// `<install>/Data/data/`.
pub const DATA_DIR: &str = "data";

/// Configuration subdirectory holding build and CDN configs.
pub const CONFIG_DIR: &str = "config";

/// `.build.info` filename at the installation root.
pub const BUILD_INFO_FILE: &str = ".build.info";

/// Shared memory version file in the data subdirectory.
pub const SHMEM_FILE: &str = "shmem";
