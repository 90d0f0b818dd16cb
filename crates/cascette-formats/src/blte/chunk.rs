//! BLTE block modes

/// BLTE compression modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionMode {
    /// No compression (mode 'N')
    None = b'N',
    /// `ZLib` compression (mode 'Z')
    ZLib = b'Z',
    /// LZ4 compression (mode '4')
    LZ4 = b'4',
    /// Encrypted (mode 'E')
    Encrypted = b'E',
    /// Frame/Recursive BLTE (mode 'F'), not decodable
    Frame = b'F',
}

impl CompressionMode {
    /// Parse compression mode from byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'N' => Some(Self::None),
            b'Z' => Some(Self::ZLib),
            b'4' => Some(Self::LZ4),
            b'E' => Some(Self::Encrypted),
            b'F' => Some(Self::Frame),
            _ => None,
        }
    }

    /// Get the byte representation
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}
