//! Content and locale flags for root file blocks

use binrw::BinRead;
use binrw::io::{Read, Seek};
use std::fmt;

/// Content flags describe how the files of a block are stored
///
/// V1-V3 use 32-bit flags, V4 extends to 40-bit (5 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContentFlags {
    /// Raw flag value (up to 40 bits for V4)
    pub value: u64,
}

impl ContentFlags {
    /// No special flags
    pub const NONE: u64 = 0x0000_0000;

    /// Windows platform (bit 0)
    pub const LOAD_ON_WINDOWS: u64 = 0x0001;

    /// macOS platform (bit 1)
    pub const LOAD_ON_MACOS: u64 = 0x0002;

    /// File should be installed (bit 2)
    pub const INSTALL: u64 = 0x0004;

    /// Low violence version (bit 3)
    pub const LOW_VIOLENCE: u64 = 0x0008;

    /// Do not load (bit 9)
    pub const DO_NOT_LOAD: u64 = 0x0200;

    /// Encrypted content (bit 12)
    pub const ENCRYPTED: u64 = 0x1000;

    /// No name hash present in block (bit 13), V2+ only
    pub const NO_NAME_HASH: u64 = 0x2000;

    /// Bundled file (bit 15)
    pub const BUNDLE: u64 = 0x8000;

    /// Create new content flags from raw value
    pub const fn new(value: u64) -> Self {
        Self { value }
    }

    /// Check if flag is set
    pub const fn has(&self, flag: u64) -> bool {
        (self.value & flag) != 0
    }

    /// Check if name hashes should be present
    pub const fn has_name_hashes(&self) -> bool {
        !self.has(Self::NO_NAME_HASH)
    }

    /// Read as 32-bit value (V1-V3)
    pub fn read_v1_v3<R: Read + Seek>(reader: &mut R) -> binrw::BinResult<Self> {
        let value = u64::from(u32::read_le(reader)?);
        Ok(Self::new(value))
    }

    /// Read as 40-bit value (V4)
    pub fn read_v4<R: Read + Seek>(reader: &mut R) -> binrw::BinResult<Self> {
        let low = u64::from(u32::read_le(reader)?);
        let high = u64::from(u8::read_le(reader)?);
        Ok(Self::new(low | (high << 32)))
    }
}

impl fmt::Display for ContentFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.value)
    }
}

impl From<u32> for ContentFlags {
    fn from(value: u32) -> Self {
        Self::new(u64::from(value))
    }
}

/// Locale flags indicate which game locales a block applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LocaleFlags(pub u32);

impl LocaleFlags {
    /// All locales
    pub const ALL: u32 = 0xFFFF_FFFF;

    /// English (US)
    pub const ENUS: u32 = 0x0000_0002;

    /// Korean
    pub const KOKR: u32 = 0x0000_0004;

    /// French
    pub const FRFR: u32 = 0x0000_0010;

    /// German
    pub const DEDE: u32 = 0x0000_0020;

    /// Chinese (Simplified)
    pub const ZHCN: u32 = 0x0000_0040;

    /// Spanish (Spain)
    pub const ESES: u32 = 0x0000_0080;

    /// Chinese (Traditional)
    pub const ZHTW: u32 = 0x0000_0100;

    /// English (GB)
    pub const ENGB: u32 = 0x0000_0200;

    /// Russian
    pub const RURU: u32 = 0x0000_1000;

    /// Create new locale flags
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get raw value
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Check if locale flag is set
    pub const fn has(&self, locale: u32) -> bool {
        (self.0 & locale) != 0
    }

    /// Check if matches any of the specified locales
    pub const fn matches(&self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }
}

impl fmt::Display for LocaleFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl From<u32> for LocaleFlags {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}
