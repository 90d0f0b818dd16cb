//! Cryptographic primitives for CASC storage and DB2 tables
//!
//! This crate provides the small set of primitives shared by the format
//! parsers and the local storage layer.
//!
//! # Components
//!
//! - **Keys**: [`CascKey`], the 16-byte content/encoding key
//! - **Encryption**: Salsa20 stream cipher for BLTE blocks and DB2 sections
//! - **Key Management**: TACT encryption key storage and lookup
//!
//! # Examples
//!
//! ## Content Key Generation
//!
//! ```
//! use cascette_crypto::CascKey;
//!
//! let key = CascKey::from_data(b"Hello, World!");
//! assert_eq!(key.to_hex().len(), 32);
//! ```
//!
//! ## Key Lookup
//!
//! ```
//! use cascette_crypto::{TactKey, TactKeyProvider, TactKeyStore};
//!
//! let mut store = TactKeyStore::empty();
//! store.add(TactKey::new(0xFA50_5078_126A_CB3E, [0x11; 16]));
//! assert_eq!(store.get_key(0xFA50_5078_126A_CB3E), Some([0x11; 16]));
//! ```

#![warn(missing_docs)]

pub mod casc_key;
pub mod error;
pub mod keys;
pub mod salsa20;
pub mod store_trait;

pub use error::CryptoError;

// Re-export commonly used types
pub use casc_key::{CascKey, ContentKey, EncodingKey};
pub use keys::{TactKey, TactKeyStore};
pub use salsa20::Salsa20Cipher;
pub use store_trait::TactKeyProvider;
