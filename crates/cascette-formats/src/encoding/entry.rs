//! Content key page entries

use cascette_crypto::{ContentKey, EncodingKey};

use super::error::EncodingError;

/// Fixed part of an entry: key count, 40-bit size, content key
const ENTRY_PREFIX_SIZE: usize = 1 + 5 + 16;

/// Content key page entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CKeyPageEntry {
    /// File size (40-bit: 8-bit high + 32-bit low)
    pub file_size: u64,
    /// Content key
    pub content_key: ContentKey,
    /// Encoding keys, at least one
    pub encoding_keys: Vec<EncodingKey>,
}

impl CKeyPageEntry {
    /// Preferred encoding key
    pub fn encoding_key(&self) -> Option<&EncodingKey> {
        self.encoding_keys.first()
    }

    /// Parse the entries of one content key page
    ///
    /// ```text
    /// [u8 key count][u40 BE file size][ckey: 16][ekey: 16 × key count]
    /// ```
    ///
    /// Scanning stops at a zero key count (padding) or when no further
    /// entry fits in the page.
    pub fn parse_page(page_index: usize, page: &[u8]) -> Result<Vec<Self>, EncodingError> {
        let mut entries = Vec::new();
        let mut offset = 0;

        while offset + ENTRY_PREFIX_SIZE <= page.len() {
            let key_count = page[offset] as usize;
            if key_count == 0 {
                break;
            }

            let end = offset + ENTRY_PREFIX_SIZE + key_count * 16;
            if end > page.len() {
                return Err(EncodingError::EntryOverrun {
                    page: page_index,
                    offset,
                });
            }

            let size = &page[offset + 1..offset + 6];
            let file_size = (u64::from(size[0]) << 32)
                | u64::from(u32::from_be_bytes([size[1], size[2], size[3], size[4]]));

            let mut ckey = [0u8; 16];
            ckey.copy_from_slice(&page[offset + 6..offset + 22]);

            let encoding_keys = page[offset + ENTRY_PREFIX_SIZE..end]
                .chunks_exact(16)
                .map(|chunk| {
                    let mut ekey = [0u8; 16];
                    ekey.copy_from_slice(chunk);
                    EncodingKey::from_bytes(ekey)
                })
                .collect();

            entries.push(Self {
                file_size,
                content_key: ContentKey::from_bytes(ckey),
                encoding_keys,
            });
            offset = end;
        }

        Ok(entries)
    }
}
