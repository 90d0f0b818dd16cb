//! Page index structures for encoding file

use binrw::BinRead;
use cascette_crypto::ContentKey;

/// Index entry pointing to a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(big)]
pub struct IndexEntry {
    /// First key in the page (for binary search)
    pub first_key: [u8; 16],
    /// MD5 checksum of the page data
    pub checksum: [u8; 16],
}

impl IndexEntry {
    /// Get first key as `ContentKey`
    pub fn first_content_key(&self) -> ContentKey {
        ContentKey::from_bytes(self.first_key)
    }

    /// Verify page data against checksum
    pub fn verify(&self, page_data: &[u8]) -> bool {
        let digest = md5::compute(page_data);
        digest.as_ref() == self.checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify() {
        let page = [7u8; 64];
        let entry = IndexEntry {
            first_key: [1; 16],
            checksum: md5::compute(page).0,
        };
        assert!(entry.verify(&page));
        assert!(!entry.verify(&page[..63]));
        assert_eq!(entry.first_content_key(), ContentKey::from_bytes([1; 16]));
    }
}
