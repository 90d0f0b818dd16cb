use crate::encoding::{
    EncodingError, EncodingHeader, entry::CKeyPageEntry, header::ENCODING_HEADER_SIZE,
    index::IndexEntry,
};
use binrw::BinRead;
use binrw::io::Cursor;
use cascette_crypto::{ContentKey, EncodingKey};
use tracing::debug;

/// Content key → encoding key lookup built from a decoded encoding file
///
/// Only the content key half of the file is read. Pages are kept in file
/// order; lookups binary search the page index by first key and then scan
/// the selected page.
#[derive(Debug, Clone)]
pub struct EncodingIndex {
    /// File header
    pub header: EncodingHeader,
    ckey_index: Vec<IndexEntry>,
    ckey_pages: Vec<Vec<CKeyPageEntry>>,
}

impl EncodingIndex {
    /// Parse a decoded encoding file, verifying page checksums
    pub fn parse(data: &[u8]) -> Result<Self, EncodingError> {
        Self::parse_with_verification(data, true)
    }

    /// Parse a decoded encoding file
    pub fn parse_with_verification(data: &[u8], verify: bool) -> Result<Self, EncodingError> {
        if data.len() < ENCODING_HEADER_SIZE {
            return Err(EncodingError::Truncated {
                structure: "encoding header",
                offset: 0,
                needed: ENCODING_HEADER_SIZE,
                available: data.len(),
            });
        }

        let header = EncodingHeader::read(&mut Cursor::new(data))?;
        header.validate()?;

        let page_count = header.ckey_page_count as usize;
        let index_offset = header.ckey_index_offset();
        let index_size = page_count * 32;
        let index_data = slice(data, index_offset, index_size, "content key page index")?;

        let mut cursor = Cursor::new(index_data);
        let ckey_index = (0..page_count)
            .map(|_| IndexEntry::read(&mut cursor))
            .collect::<binrw::BinResult<Vec<_>>>()?;

        let page_size = header.ckey_page_size();
        let mut offset = index_offset + index_size;
        let mut ckey_pages = Vec::with_capacity(page_count);

        for (page_index, entry) in ckey_index.iter().enumerate() {
            let page = slice(data, offset, page_size, "content key page")?;
            offset += page_size;

            if verify && !entry.verify(page) {
                return Err(EncodingError::ChecksumMismatch { page: page_index });
            }

            ckey_pages.push(CKeyPageEntry::parse_page(page_index, page)?);
        }

        let index = Self {
            header,
            ckey_index,
            ckey_pages,
        };
        debug!(
            "parsed encoding file: {} content key pages, {} entries",
            page_count,
            index.len()
        );
        Ok(index)
    }

    /// Find the entry for a content key
    pub fn find(&self, ckey: &ContentKey) -> Option<&CKeyPageEntry> {
        let page = match self
            .ckey_index
            .binary_search_by(|entry| entry.first_key.cmp(ckey.as_bytes()))
        {
            Ok(page) => page,
            Err(0) => return None,
            Err(next) => next - 1,
        };

        self.ckey_pages
            .get(page)?
            .iter()
            .find(|entry| entry.content_key == *ckey)
    }

    /// First encoding key for a content key
    pub fn lookup(&self, ckey: &ContentKey) -> Option<EncodingKey> {
        self.find(ckey).and_then(|e| e.encoding_key().copied())
    }

    /// Decoded size of the content
    pub fn file_size(&self, ckey: &ContentKey) -> Option<u64> {
        self.find(ckey).map(|e| e.file_size)
    }

    /// Number of content key entries
    pub fn len(&self) -> usize {
        self.ckey_pages.iter().map(Vec::len).sum()
    }

    /// Whether the file has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries in file order
    pub fn entries(&self) -> impl Iterator<Item = &CKeyPageEntry> {
        self.ckey_pages.iter().flatten()
    }
}

fn slice<'d>(
    data: &'d [u8],
    offset: usize,
    len: usize,
    structure: &'static str,
) -> Result<&'d [u8], EncodingError> {
    data.get(offset..offset + len)
        .ok_or(EncodingError::Truncated {
            structure,
            offset,
            needed: len,
            available: data.len().saturating_sub(offset),
        })
}
