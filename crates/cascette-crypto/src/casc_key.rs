//! 16-byte CASC keys
//!
//! Content keys (MD5 of the plaintext) and encoding keys (MD5 of the BLTE
//! encoded bytes) share one representation. Both are compared byte-wise and
//! used as map keys throughout the resolver chain.

use md5::{Digest, Md5};
use std::fmt;
use std::str::FromStr;

use crate::error::CryptoError;

/// A 16-byte content or encoding key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CascKey([u8; 16]);

/// Key identifying a file's plaintext
pub type ContentKey = CascKey;

/// Key identifying a file's on-disk encoded representation
pub type EncodingKey = CascKey;

impl CascKey {
    /// Size of a key in bytes
    pub const SIZE: usize = 16;

    /// Create a key from raw bytes
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Create a key by hashing data with MD5
    pub fn from_data(data: &[u8]) -> Self {
        let mut hasher = Md5::new();
        hasher.update(data);
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Parse a key from a 32-character hex string
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(hex.trim(), &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Copy a key out of a file buffer
    ///
    /// Returns `None` when fewer than 16 bytes are available.
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        let bytes: [u8; 16] = data.get(..Self::SIZE)?.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Get raw bytes
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 9 bytes, as stored in local `.idx` journals
    pub fn first_9(&self) -> [u8; 9] {
        let mut prefix = [0u8; 9];
        prefix.copy_from_slice(&self.0[..9]);
        prefix
    }

    /// Whether every byte is zero
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl fmt::Display for CascKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for CascKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s).map_err(|e| CryptoError::InvalidKeyFormat(format!("invalid hex: {e}")))
    }
}

impl From<[u8; 16]> for CascKey {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for CascKey {
    type Error = CryptoError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() != Self::SIZE {
            return Err(CryptoError::InvalidKeySize {
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        Self::from_slice(data).ok_or(CryptoError::InvalidKeySize {
            expected: Self::SIZE,
            actual: data.len(),
        })
    }
}

impl AsRef<[u8]> for CascKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_of_empty_input() {
        let key = CascKey::from_data(b"");
        assert_eq!(key.to_hex(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_hex_round_trip() {
        let hex = "0123456789abcdef0123456789abcdef";
        let key = CascKey::from_hex(hex).expect("valid hex");
        assert_eq!(key.to_hex(), hex);
        assert_eq!(key.to_string(), hex);

        let parsed: CascKey = hex.parse().expect("FromStr");
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_uppercase_hex_accepted() {
        let key = CascKey::from_hex("0123456789ABCDEF0123456789ABCDEF").expect("valid hex");
        assert_eq!(key.as_bytes()[1], 0x23);
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(CascKey::from_hex("abcd").is_err());
        assert!(CascKey::from_hex("zz23456789abcdef0123456789abcdef").is_err());
        assert!("not-a-key".parse::<CascKey>().is_err());
    }

    #[test]
    fn test_from_slice_and_try_from() {
        let bytes: Vec<u8> = (0u8..20).collect();
        let key = CascKey::from_slice(&bytes).expect("enough bytes");
        assert_eq!(key.as_bytes()[15], 15);
        assert!(CascKey::from_slice(&bytes[..15]).is_none());

        assert!(CascKey::try_from(&bytes[..16]).is_ok());
        assert!(CascKey::try_from(&bytes[..]).is_err());
    }

    #[test]
    fn test_first_9_and_ordering() {
        let a = CascKey::from_bytes([1; 16]);
        let b = CascKey::from_bytes([2; 16]);
        assert!(a < b);
        assert_eq!(a.first_9(), [1; 9]);
        assert!(CascKey::default().is_zero());
        assert!(!a.is_zero());
    }
}
