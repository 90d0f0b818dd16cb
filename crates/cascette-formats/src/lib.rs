//! Binary format parsers for WDC5 client tables and CASC storage
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_sign_loss)] // Bit-level reinterpretation
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Many CASC-specific terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::float_cmp)] // Binary format requirements
#![allow(clippy::map_unwrap_or)] // Binary format patterns
#![allow(clippy::redundant_closure_for_method_calls)] // Iterator chains
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::use_self)] // Type clarity
//! This crate reads the formats needed to pull a WDC5 (`.db2`) table out of
//! a local CASC installation and decode its rows.
//!
//! # Supported Formats
//!
//! - **WDC5**: Columnar client database tables with bit-packed, palletized,
//!   common-value and encrypted sections
//! - **BLTE**: Block Table Encoded format for compressed and encrypted content
//! - **Encoding**: Content key to encoding key mappings
//! - **Root**: File data id to content key mappings
//!
//! # Design Principles
//!
//! - **Owned Tables**: Tables copy what they need out of the input buffer;
//!   rows borrow their table
//! - **Typed Errors**: Each format has its own `thiserror` enum
//! - **Bounds Checked**: Offsets and counts from the file are validated
//!   before use

#![warn(missing_docs)]

pub mod blte;
/// Encoding file: content key → encoding key lookup
pub mod encoding;
pub mod root;
pub mod wdc5;
