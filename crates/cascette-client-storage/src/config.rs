//! Configuration for the storage system

use cascette_formats::wdc5::NonceSource;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{DATA_DIR, Result, StorageError};

/// Record id used to seed the nonce of encrypted DB2 rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowNonce {
    /// The id the row was requested by
    #[default]
    DestinationId,
    /// The id of the stored record after copy-table redirection
    SourceId,
}

impl From<RowNonce> for NonceSource {
    fn from(value: RowNonce) -> Self {
        match value {
            RowNonce::DestinationId => Self::DestinationId,
            RowNonce::SourceId => Self::SourceId,
        }
    }
}

/// Configuration for the storage system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Installation `Data` directory
    pub data_path: PathBuf,

    /// Verify BLTE block checksums
    pub verify_checksums: bool,

    /// Nonce strategy for encrypted DB2 rows
    pub nonce_source: RowNonce,

    /// TACT key file (CSV or TXT)
    pub key_file: Option<PathBuf>,

    /// Build configuration to use instead of the active `.build.info` entry
    pub build_config: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("./Data"),
            verify_checksums: true,
            nonce_source: RowNonce::default(),
            key_file: None,
            build_config: None,
        }
    }
}

impl StorageConfig {
    /// Create a new configuration for a `Data` directory
    pub fn new<P: AsRef<Path>>(data_path: P) -> Self {
        Self {
            data_path: data_path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| StorageError::Config(format!("{}: {e}", path.display())))
    }

    /// Set the `Data` directory
    #[must_use]
    pub fn with_data_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_path = path.as_ref().to_path_buf();
        self
    }

    /// Enable or disable BLTE checksum verification
    #[must_use]
    pub const fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Set the nonce strategy for encrypted rows
    #[must_use]
    pub const fn with_nonce_source(mut self, nonce_source: RowNonce) -> Self {
        self.nonce_source = nonce_source;
        self
    }

    /// Set the TACT key file
    #[must_use]
    pub fn with_key_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.key_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Use an explicit build configuration file
    #[must_use]
    pub fn with_build_config<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.build_config = Some(path.as_ref().to_path_buf());
        self
    }

    /// Directory holding the `.idx` journals
    pub fn indices_path(&self) -> PathBuf {
        self.data_path.join(DATA_DIR)
    }

    /// Directory holding the `data.NNN` archives
    pub fn data_files_path(&self) -> PathBuf {
        self.data_path.join(DATA_DIR)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = StorageConfig::new("/games/wow/Data");
        assert!(config.verify_checksums);
        assert_eq!(config.nonce_source, RowNonce::DestinationId);
        assert_eq!(config.key_file, None);
        assert_eq!(
            config.indices_path(),
            PathBuf::from("/games/wow/Data/data")
        );
        assert_eq!(config.data_files_path(), config.indices_path());
    }

    #[test]
    fn test_builders() {
        let config = StorageConfig::default()
            .with_data_path("/x")
            .with_verify_checksums(false)
            .with_nonce_source(RowNonce::SourceId)
            .with_key_file("/keys.csv");
        assert_eq!(config.data_path, PathBuf::from("/x"));
        assert!(!config.verify_checksums);
        assert_eq!(
            NonceSource::from(config.nonce_source),
            NonceSource::SourceId
        );
        assert_eq!(config.key_file, Some(PathBuf::from("/keys.csv")));
    }

    #[test]
    fn test_json_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(
            &path,
            r#"{"data_path": "/wow/Data", "nonce_source": "source_id"}"#,
        )
        .unwrap();

        let config = StorageConfig::from_json_file(&path).unwrap();
        assert_eq!(config.data_path, PathBuf::from("/wow/Data"));
        assert_eq!(config.nonce_source, RowNonce::SourceId);
        assert!(config.verify_checksums);
    }

    #[test]
    fn test_json_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(
            StorageConfig::from_json_file(&path),
            Err(StorageError::Config(_))
        ));
    }
}
