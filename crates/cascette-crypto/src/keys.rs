//! TACT encryption key management
//!
//! Encrypted BLTE blocks and encrypted DB2 sections name their key by a
//! 64-bit lookup value. This module maps those names to 16-byte keys.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::CryptoError;

/// A TACT encryption key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TactKey {
    /// Key identifier (hash of key name)
    pub id: u64,
    /// 16-byte encryption key
    pub key: [u8; 16],
}

impl TactKey {
    /// Create a new TACT key
    pub fn new(id: u64, key: [u8; 16]) -> Self {
        Self { id, key }
    }

    /// Parse key from hex string
    pub fn from_hex(id: u64, hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex.trim())
            .map_err(|e| CryptoError::InvalidKeyFormat(format!("invalid hex: {e}")))?;

        let key: [u8; 16] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKeySize {
                expected: 16,
                actual: bytes.len(),
            })?;
        Ok(Self::new(id, key))
    }
}

impl fmt::Display for TactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}: {}", self.id, hex::encode_upper(self.key))
    }
}

/// In-memory store for TACT encryption keys
#[derive(Debug, Clone)]
pub struct TactKeyStore {
    keys: HashMap<u64, [u8; 16]>,
}

impl TactKeyStore {
    /// Create a new key store with the publicly known keys
    pub fn new() -> Self {
        let mut store = Self::empty();
        store.load_known_keys();
        store
    }

    /// Create an empty key store
    pub fn empty() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    fn load_known_keys(&mut self) {
        // Battle for Azeroth
        self.add_key_from_hex(0xFA50_5078_126A_CB3E, "BDC51862ABED79B2DE48C8E7E66C6200");
        self.add_key_from_hex(0xFF81_3F7D_062A_C0BC, "AA0B5C77F088CCC2D39049BD267F066D");
        self.add_key_from_hex(0xD1E9_B5ED_F928_3668, "8E4A2579894E38B4AB9058BA5C7328EE");

        // Shadowlands
        self.add_key_from_hex(0xB767_2964_1141_CB34, "9849D1AA7B1FD09819C5C66283A326EC");
        self.add_key_from_hex(0xFFB9_469F_F16E_6BF8, "D514BD1909A9E5DC8703F4B8BB1DFD9A");

        // The War Within
        self.add_key_from_hex(0x0EBE_36B5_010D_FD7F, "9A89CC7E3ACB29CF14C60BC13B1E4616");

        // Classic
        self.add_key_from_hex(0xDEE3_A052_1EFF_6F03, "AD740CE3FFFF9231468126985708E1B9");
    }

    fn add_key_from_hex(&mut self, id: u64, hex: &str) {
        if let Ok(key) = TactKey::from_hex(id, hex) {
            self.keys.insert(key.id, key.key);
        }
    }

    /// Get a key by ID
    pub fn get(&self, id: u64) -> Option<&[u8; 16]> {
        self.keys.get(&id)
    }

    /// Add a key to the store
    pub fn add(&mut self, key: TactKey) {
        self.keys.insert(key.id, key.key);
    }

    /// Remove a key from the store
    pub fn remove(&mut self, id: u64) -> Option<[u8; 16]> {
        self.keys.remove(&id)
    }

    /// Number of keys in the store
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Load keys from CSV content (`key_id,key_hex` per line)
    ///
    /// Lines starting with `#` are comments. Malformed lines are skipped.
    /// Returns the number of keys loaded.
    ///
    /// ```
    /// use cascette_crypto::keys::TactKeyStore;
    ///
    /// let csv = "# name,key\nFA505078126ACB3E,BDC51862ABED79B2DE48C8E7E66C6200\n";
    /// let mut store = TactKeyStore::empty();
    /// assert_eq!(store.load_from_csv(csv), 1);
    /// ```
    pub fn load_from_csv(&mut self, content: &str) -> usize {
        self.load_lines(content, |line| {
            let mut parts = line.split(',');
            let id = parts.next()?;
            let key = parts.next()?;
            parts.next().is_none().then_some((id, key))
        })
    }

    /// Load keys from text content (`key_id key_hex` per line)
    ///
    /// Lines starting with `#` or `//` are comments. Extra columns after the
    /// key are ignored. Returns the number of keys loaded.
    pub fn load_from_txt(&mut self, content: &str) -> usize {
        self.load_lines(content, |line| {
            if line.starts_with("//") {
                return None;
            }
            let mut parts = line.split_whitespace();
            Some((parts.next()?, parts.next()?))
        })
    }

    /// Load a key file from disk, picking the format from its contents
    ///
    /// Files whose first data line contains a comma are read as CSV.
    pub fn load_file(&mut self, path: &Path) -> Result<usize, CryptoError> {
        let content = std::fs::read_to_string(path)?;
        let is_csv = content
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with('#'))
            .is_some_and(|l| l.contains(','));

        Ok(if is_csv {
            self.load_from_csv(&content)
        } else {
            self.load_from_txt(&content)
        })
    }

    fn load_lines<'a>(
        &mut self,
        content: &'a str,
        split: impl Fn(&'a str) -> Option<(&'a str, &'a str)>,
    ) -> usize {
        let mut count = 0;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((id, hex)) = split(line) else {
                continue;
            };

            if let Ok(id) = parse_key_id(id)
                && let Ok(key) = TactKey::from_hex(id, hex)
            {
                self.add(key);
                count += 1;
            }
        }

        count
    }

    /// Iterate over all keys
    pub fn iter(&self) -> impl Iterator<Item = TactKey> + '_ {
        self.keys.iter().map(|(&id, &key)| TactKey::new(id, key))
    }
}

impl Default for TactKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a key ID from string (hex or decimal)
fn parse_key_id(s: &str) -> Result<u64, CryptoError> {
    let s = s.trim();

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
            .map_err(|e| CryptoError::InvalidKeyFormat(format!("invalid hex key ID: {e}")))
    } else if s.len() == 16 && s.chars().all(|c| c.is_ascii_hexdigit()) {
        u64::from_str_radix(s, 16)
            .map_err(|e| CryptoError::InvalidKeyFormat(format!("invalid hex key ID: {e}")))
    } else {
        s.parse()
            .map_err(|e| CryptoError::InvalidKeyFormat(format!("invalid decimal key ID: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_known_keys_loaded() {
        let store = TactKeyStore::new();
        assert!(store.get(0xFA50_5078_126A_CB3E).is_some());
        assert!(TactKeyStore::empty().is_empty());
    }

    #[test]
    fn test_key_from_hex() {
        let key = TactKey::from_hex(1, "00112233445566778899aabbccddeeff").expect("valid");
        assert_eq!(key.key[15], 0xFF);
        assert!(TactKey::from_hex(1, "0011").is_err());
        assert!(TactKey::from_hex(1, "xyz").is_err());
    }

    #[test]
    fn test_load_csv_skips_garbage() {
        let csv = "\
# comment
0x0000000000000001,00112233445566778899AABBCCDDEEFF
2,00112233445566778899AABBCCDDEEFF
bad line
3,tooshort
4,00112233445566778899AABBCCDDEEFF,extra
";
        let mut store = TactKeyStore::empty();
        assert_eq!(store.load_from_csv(csv), 2);
        assert!(store.get(1).is_some());
        assert!(store.get(2).is_some());
        assert!(store.get(4).is_none());
    }

    #[test]
    fn test_load_txt() {
        let txt = "// header\nFA505078126ACB3E BDC51862ABED79B2DE48C8E7E66C6200 WOW-12345\n";
        let mut store = TactKeyStore::empty();
        assert_eq!(store.load_from_txt(txt), 1);
        assert_eq!(store.iter().count(), 1);
    }

    #[test]
    fn test_load_file_detects_format() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# keys").unwrap();
        writeln!(file, "FA505078126ACB3E,BDC51862ABED79B2DE48C8E7E66C6200").unwrap();

        let mut store = TactKeyStore::empty();
        assert_eq!(store.load_file(file.path()).unwrap(), 1);
        assert_eq!(store.len(), 1);
    }
}
