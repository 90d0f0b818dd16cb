//! File id → content key index built from a root file

use crate::root::{
    block::RootBlock,
    error::Result,
    flags::{ContentFlags, LocaleFlags},
    header::RootHeader,
    version::RootVersion,
};
use binrw::io::{Cursor, Seek};
use cascette_crypto::ContentKey;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Resolved root entry for one file id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootEntry {
    /// Content key
    pub content_key: ContentKey,
    /// Content flags of the block the entry came from
    pub content_flags: ContentFlags,
    /// Locale flags of the block the entry came from
    pub locale_flags: LocaleFlags,
}

impl RootEntry {
    /// Ranking used when a file id appears in several blocks
    ///
    /// Unencrypted beats encrypted, then en-US beats other locales, then
    /// Windows-loadable beats the rest.
    fn priority(&self) -> (bool, bool, bool) {
        (
            !self.content_flags.has(ContentFlags::ENCRYPTED),
            self.locale_flags.has(LocaleFlags::ENUS),
            self.content_flags.has(ContentFlags::LOAD_ON_WINDOWS),
        )
    }
}

/// Root file parsed into a lookup map
#[derive(Debug, Clone)]
pub struct RootIndex {
    /// Detected header
    pub header: RootHeader,
    entries: HashMap<u32, RootEntry>,
}

impl RootIndex {
    /// Parse a decoded root file
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_with_locale(data, None)
    }

    /// Parse a decoded root file keeping only blocks that match `locale`
    pub fn parse_with_locale(data: &[u8], locale: Option<LocaleFlags>) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let header = RootHeader::read(&mut cursor)?;
        let version = header.version;

        let mut entries: HashMap<u32, RootEntry> = HashMap::new();
        let mut blocks = 0usize;
        let mut duplicates = 0usize;
        let len = data.len() as u64;

        while cursor.stream_position()? < len {
            let remaining = len - cursor.position();
            let block = match RootBlock::parse(&mut cursor, version, remaining) {
                Ok(block) => block,
                Err(e) if blocks > 0 => {
                    warn!("stopping root parse after {} blocks: {}", blocks, e);
                    break;
                }
                Err(e) => return Err(e),
            };
            blocks += 1;

            if let Some(filter) = locale {
                if !block.locale_flags.matches(filter) {
                    continue;
                }
            }

            for record in &block.records {
                let candidate = RootEntry {
                    content_key: record.content_key,
                    content_flags: block.content_flags,
                    locale_flags: block.locale_flags,
                };
                match entries.get_mut(&record.file_data_id) {
                    Some(existing) => {
                        duplicates += 1;
                        if candidate.priority() > existing.priority() {
                            *existing = candidate;
                        }
                    }
                    None => {
                        entries.insert(record.file_data_id, candidate);
                    }
                }
            }
        }

        debug!(
            "parsed root {}: {} blocks, {} files, {} duplicate ids",
            version,
            blocks,
            entries.len(),
            duplicates
        );

        Ok(Self { header, entries })
    }

    /// Root format version
    pub fn version(&self) -> RootVersion {
        self.header.version
    }

    /// Content key for a file id
    pub fn lookup(&self, file_data_id: u32) -> Option<ContentKey> {
        self.entries.get(&file_data_id).map(|e| e.content_key)
    }

    /// Full entry for a file id
    pub fn lookup_entry(&self, file_data_id: u32) -> Option<&RootEntry> {
        self.entries.get(&file_data_id)
    }

    /// Number of distinct file ids
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no files
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
