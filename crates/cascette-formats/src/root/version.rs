//! Root file versions

use std::fmt;

/// Root file versions across `WoW` expansions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootVersion {
    /// Version 1 (`WoW` 6.0-7.2): No header, interleaved format
    V1,
    /// Version 2 (`WoW` 7.2.5-8.1): `MFST`/`TSFM` header, separated arrays
    V2,
    /// Version 3 (`WoW` 8.2-9.1): Extended header with size/version
    V3,
    /// Version 4 (`WoW` 9.1+): 40-bit content flags (same structure as V3)
    V4,
}

impl RootVersion {
    /// Map the version field of an extended header
    pub const fn from_extended(version_field: u32) -> Self {
        match version_field {
            0..=2 => Self::V2,
            3 => Self::V3,
            _ => Self::V4,
        }
    }

    /// Check if version uses separated arrays (vs interleaved)
    pub const fn uses_separated_arrays(self) -> bool {
        !matches!(self, Self::V1)
    }

    /// Size of a block header in bytes
    pub const fn block_header_size(self) -> usize {
        match self {
            // count + content flags + locale flags
            Self::V1 => 12,
            // count + locale + content(4) + unk2 + unk3
            Self::V2 | Self::V3 => 17,
            // count + locale + content(5) + unk2 + unk3
            Self::V4 => 18,
        }
    }
}

impl fmt::Display for RootVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => write!(f, "V1 (WoW 6.0-7.2)"),
            Self::V2 => write!(f, "V2 (WoW 7.2.5-8.1)"),
            Self::V3 => write!(f, "V3 (WoW 8.2-9.1)"),
            Self::V4 => write!(f, "V4 (WoW 9.1+)"),
        }
    }
}
