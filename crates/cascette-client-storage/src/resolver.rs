//! Content resolution pipeline
//!
//! Resolves `FileDataID`s to decoded bytes through the CASC lookup chain:
//! root → encoding → journal → archive → BLTE.

use cascette_crypto::{ContentKey, EncodingKey, TactKeyProvider, TactKeyStore};
use cascette_formats::blte::BlteDecoder;
use cascette_formats::encoding::EncodingIndex;
use cascette_formats::root::RootIndex;
use cascette_formats::wdc5::{Wdc5Options, Wdc5Table};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::archive::ArchiveSet;
use crate::build_config::BuildConfig;
use crate::config::StorageConfig;
use crate::idx::{CascIdxIndex, IdxEntry, bucket_for_key};
use crate::shmem::select_journals;
use crate::{Result, StorageError};

/// Journals, archives and keys: everything needed to read by encoding key
struct LocalStore {
    config: StorageConfig,
    keys: Box<dyn TactKeyProvider>,
    journal_paths: HashMap<u8, PathBuf>,
    journals: DashMap<u8, Arc<CascIdxIndex>>,
    archives: ArchiveSet,
}

impl LocalStore {
    fn journal(&self, bucket: u8) -> Result<Option<Arc<CascIdxIndex>>> {
        if let Some(journal) = self.journals.get(&bucket) {
            return Ok(Some(Arc::clone(&journal)));
        }
        let Some(path) = self.journal_paths.get(&bucket) else {
            return Ok(None);
        };

        let journal = Arc::new(CascIdxIndex::load(path)?);
        self.journals.insert(bucket, Arc::clone(&journal));
        Ok(Some(journal))
    }

    fn locate(&self, ekey: &EncodingKey) -> Result<IdxEntry> {
        let bucket = bucket_for_key(ekey.as_bytes());
        self.journal(bucket)?
            .and_then(|journal| journal.lookup(ekey).copied())
            .ok_or(StorageError::EncodingKeyNotFound(*ekey))
    }

    fn read_encoded(&self, ekey: &EncodingKey) -> Result<Vec<u8>> {
        let entry = self.locate(ekey)?;
        debug!(
            "{ekey} -> data.{:03} offset {} size {}",
            entry.archive_index(),
            entry.offset(),
            entry.size
        );
        self.archives.read_entry(ekey, &entry)
    }

    fn decode(&self, ekey: &EncodingKey, blte: &[u8]) -> Result<Vec<u8>> {
        let (content, report) = BlteDecoder::new(self.keys.as_ref())
            .verify_checksums(self.config.verify_checksums)
            .decode_with_report(blte)?;

        if !report.is_complete() {
            warn!(
                "{ekey}: {} encrypted blocks zero-filled (missing keys {:016X?})",
                report.zero_filled_blocks.len(),
                report.missing_keys
            );
        }
        Ok(content)
    }
}

/// Resolves `FileDataID`s to content in a local installation
///
/// ```no_run
/// use cascette_client_storage::{CascArchiveResolver, StorageConfig};
/// use cascette_crypto::TactKeyStore;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = StorageConfig::new("/games/wow/Data").with_key_file("keys.csv");
/// let resolver = CascArchiveResolver::open(config, TactKeyStore::new())?;
/// let bytes = resolver.read_file(1_349_477)?;
/// # Ok(())
/// # }
/// ```
pub struct CascArchiveResolver {
    store: LocalStore,
    encoding: EncodingIndex,
    root: RootIndex,
}

impl std::fmt::Debug for CascArchiveResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascArchiveResolver")
            .field("data_path", &self.store.config.data_path)
            .field("journals", &self.store.journal_paths.len())
            .field("encoding_entries", &self.encoding.len())
            .field("root_entries", &self.root.len())
            .finish_non_exhaustive()
    }
}

impl CascArchiveResolver {
    /// Open an installation
    ///
    /// Keys from `config.key_file` are added to `keys`. The build
    /// configuration is `config.build_config` when set, otherwise the
    /// active `.build.info` entry.
    pub fn open(config: StorageConfig, mut keys: TactKeyStore) -> Result<Self> {
        info!("Opening CASC storage at {}", config.data_path.display());

        if let Some(key_file) = &config.key_file {
            let loaded = keys.load_file(key_file)?;
            info!("Loaded {loaded} keys from {}", key_file.display());
        }

        let indices_path = config.indices_path();
        let journal_paths: HashMap<u8, PathBuf> =
            select_journals(&indices_path)?.into_iter().collect();
        if journal_paths.is_empty() {
            return Err(StorageError::Config(format!(
                "no index journals in {}",
                indices_path.display()
            )));
        }
        debug!("selected {} journals", journal_paths.len());

        let build_config = match &config.build_config {
            Some(path) => BuildConfig::from_path(path)?,
            None => BuildConfig::discover(&config.data_path)?,
        };
        let config_keys = build_config.keys()?;

        let store = LocalStore {
            archives: ArchiveSet::new(config.data_files_path()),
            config,
            keys: Box::new(keys),
            journal_paths,
            journals: DashMap::new(),
        };

        let ekey = config_keys.encoding_ekey;
        let data = store.decode(&ekey, &store.read_encoded(&ekey)?)?;
        let encoding = EncodingIndex::parse_with_verification(&data, store.config.verify_checksums)?;
        info!("Loaded encoding file ({} entries)", encoding.len());

        let root_ekey = encoding
            .lookup(&config_keys.root_ckey)
            .ok_or(StorageError::ContentKeyNotFound(config_keys.root_ckey))?;
        let data = store.decode(&root_ekey, &store.read_encoded(&root_ekey)?)?;
        let root = RootIndex::parse(&data)?;
        info!(
            "Loaded root file {} ({} entries)",
            root.version(),
            root.len()
        );

        Ok(Self {
            store,
            encoding,
            root,
        })
    }

    /// Compose a resolver from already loaded indices
    ///
    /// Journals are keyed by their header bucket; archives are read from
    /// `config.data_files_path()`.
    pub fn from_parts(
        config: StorageConfig,
        idx: Vec<CascIdxIndex>,
        encoding: EncodingIndex,
        root: RootIndex,
        keys: impl TactKeyProvider + 'static,
    ) -> Self {
        let journals = DashMap::new();
        for journal in idx {
            journals.insert(journal.bucket(), Arc::new(journal));
        }

        Self {
            store: LocalStore {
                archives: ArchiveSet::new(config.data_files_path()),
                config,
                keys: Box::new(keys),
                journal_paths: HashMap::new(),
                journals,
            },
            encoding,
            root,
        }
    }

    /// Read the BLTE bytes stored for an encoding key
    pub fn read_encoded(&self, ekey: &EncodingKey) -> Result<Vec<u8>> {
        self.store.read_encoded(ekey)
    }

    /// Read and decode the content for a content key
    pub fn read_content(&self, ckey: &ContentKey) -> Result<Vec<u8>> {
        let ekey = self
            .encoding
            .lookup(ckey)
            .ok_or(StorageError::ContentKeyNotFound(*ckey))?;
        debug!("{ckey} -> {ekey}");

        let blte = self.store.read_encoded(&ekey)?;
        self.store.decode(&ekey, &blte)
    }

    /// Read and decode a file by `FileDataID`
    pub fn read_file(&self, file_id: u32) -> Result<Vec<u8>> {
        let ckey = self
            .root
            .lookup(file_id)
            .ok_or(StorageError::FileNotFound(file_id))?;
        debug!("file {file_id} -> {ckey}");

        self.read_content(&ckey)
    }

    /// Open a DB2 table by `FileDataID`
    pub fn open_table(&self, file_id: u32) -> Result<Wdc5Table> {
        self.open_table_with_options(file_id, Wdc5Options::default())
    }

    /// Open a DB2 table with explicit options
    ///
    /// The nonce source always comes from the storage configuration.
    pub fn open_table_with_options(&self, file_id: u32, options: Wdc5Options) -> Result<Wdc5Table> {
        let data = self.read_file(file_id)?;
        let options = options.with_nonce_source(self.store.config.nonce_source.into());
        let table = Wdc5Table::parse_with_options(&data, self.store.keys.as_ref(), options)?;

        if !table.skipped_sections().is_empty() {
            warn!(
                "file {file_id}: {} sections skipped",
                table.skipped_sections().len()
            );
        }
        Ok(table)
    }

    /// The encoding index
    pub const fn encoding(&self) -> &EncodingIndex {
        &self.encoding
    }

    /// The root index
    pub const fn root(&self) -> &RootIndex {
        &self.root
    }

    /// The storage configuration
    pub const fn config(&self) -> &StorageConfig {
        &self.store.config
    }
}
