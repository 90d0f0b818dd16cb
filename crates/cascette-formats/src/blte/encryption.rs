//! BLTE encryption header
//!
//! ```text
//! [u8 key name size = 8][u64 LE key name][u8 IV size][IV][u8 type]
//! ```

use super::error::{BlteError, BlteResult};

/// Encryption type for BLTE chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EncryptionType {
    /// `Salsa20` stream cipher
    Salsa20 = b'S',
    /// `ARC4` stream cipher
    Arc4 = b'A',
}

impl EncryptionType {
    /// Parse from byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'S' => Some(Self::Salsa20),
            b'A' => Some(Self::Arc4),
            _ => None,
        }
    }

    /// Get byte representation
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Encrypted chunk header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedHeader {
    /// TACT key name
    pub key_name: u64,
    /// Initialization vector, 4 or 8 bytes
    pub iv: Vec<u8>,
    /// Encryption type
    pub encryption_type: EncryptionType,
}

impl EncryptedHeader {
    /// Parse the header, returning it with the ciphertext that follows
    pub fn parse(data: &[u8]) -> BlteResult<(Self, &[u8])> {
        let truncated = || BlteError::InvalidEncryptionHeader(format!("{} bytes", data.len()));

        let (&key_name_size, rest) = data.split_first().ok_or_else(truncated)?;
        if key_name_size != 8 {
            return Err(BlteError::InvalidEncryptionHeader(format!(
                "key name size {key_name_size}, expected 8"
            )));
        }
        let key_name_bytes = rest.get(..8).ok_or_else(truncated)?;
        let mut key_name = [0u8; 8];
        key_name.copy_from_slice(key_name_bytes);

        let (&iv_size, rest) = rest[8..].split_first().ok_or_else(truncated)?;
        if iv_size != 4 && iv_size != 8 {
            return Err(BlteError::InvalidEncryptionHeader(format!(
                "IV size {iv_size}, expected 4 or 8"
            )));
        }
        let iv = rest.get(..iv_size as usize).ok_or_else(truncated)?.to_vec();

        let (&kind, payload) = rest[iv_size as usize..]
            .split_first()
            .ok_or_else(truncated)?;
        let encryption_type =
            EncryptionType::from_byte(kind).ok_or(BlteError::UnsupportedEncryption(kind))?;

        Ok((
            Self {
                key_name: u64::from_le_bytes(key_name),
                iv,
                encryption_type,
            },
            payload,
        ))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_encryption_type_conversion() {
        assert_eq!(
            EncryptionType::from_byte(b'S'),
            Some(EncryptionType::Salsa20)
        );
        assert_eq!(EncryptionType::from_byte(b'A'), Some(EncryptionType::Arc4));
        assert_eq!(EncryptionType::from_byte(b'X'), None);

        assert_eq!(EncryptionType::Salsa20.as_byte(), b'S');
        assert_eq!(EncryptionType::Arc4.as_byte(), b'A');
    }

    #[test]
    fn test_parse_header() {
        let mut data = vec![8];
        data.extend_from_slice(&0x1234_5678_90AB_CDEFu64.to_le_bytes());
        data.push(4);
        data.extend_from_slice(&[1, 2, 3, 4]);
        data.push(b'S');
        data.extend_from_slice(b"payload");

        let (header, payload) = EncryptedHeader::parse(&data).unwrap();
        assert_eq!(header.key_name, 0x1234_5678_90AB_CDEF);
        assert_eq!(header.iv, vec![1, 2, 3, 4]);
        assert_eq!(header.encryption_type, EncryptionType::Salsa20);
        assert_eq!(payload, b"payload");
    }

    #[test]
    fn test_parse_rejects_bad_sizes() {
        assert!(EncryptedHeader::parse(&[]).is_err());
        assert!(EncryptedHeader::parse(&[4, 0, 0, 0, 0]).is_err());

        let mut data = vec![8];
        data.extend_from_slice(&[0; 8]);
        data.push(5);
        assert!(EncryptedHeader::parse(&data).is_err());

        let mut data = vec![8];
        data.extend_from_slice(&[0; 8]);
        data.push(4);
        data.extend_from_slice(&[0; 4]);
        data.push(b'X');
        assert!(matches!(
            EncryptedHeader::parse(&data),
            Err(BlteError::UnsupportedEncryption(b'X'))
        ));
    }
}
