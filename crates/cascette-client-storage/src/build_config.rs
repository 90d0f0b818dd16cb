//! Build configuration discovery
//!
//! The installation root holds `.build.info`, a pipe-separated table whose
//! first line declares the columns (`Name!TYPE:size`). The active row's
//! `Build Key` names a build configuration stored under
//! `Data/config/<k[0..2]>/<k[2..4]>/<key>`. That file is a list of
//! `key = value` lines; `encoding` carries the content and encoding keys of
//! the encoding file and `root` the content key of the root file.

use cascette_crypto::{ContentKey, EncodingKey};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{BUILD_INFO_FILE, CONFIG_DIR, Result, StorageError};

/// Parsed `.build.info` file.
#[derive(Debug, Clone)]
pub struct BuildInfoFile {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl BuildInfoFile {
    /// Parse a `.build.info` file from its contents.
    pub fn parse_str(content: &str) -> Result<Self> {
        let mut lines = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with("##"));

        let header = lines
            .next()
            .ok_or_else(|| StorageError::corrupt(".build.info", "missing header line"))?;
        let columns: Vec<String> = header
            .split('|')
            .map(|spec| spec.split('!').next().unwrap_or(spec).to_string())
            .collect();

        let rows = lines
            .enumerate()
            .map(|(i, line)| {
                let values: Vec<String> = line.split('|').map(String::from).collect();
                if values.len() == columns.len() {
                    Ok(values)
                } else {
                    Err(StorageError::corrupt(
                        ".build.info",
                        format!(
                            "row {i} has {} values for {} columns",
                            values.len(),
                            columns.len()
                        ),
                    ))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { columns, rows })
    }

    /// Read and parse a `.build.info` file from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::parse_str(&std::fs::read_to_string(path)?)
    }

    /// Get the number of entries (rows) in the file.
    pub fn entry_count(&self) -> usize {
        self.rows.len()
    }

    /// Get a raw field value by row and column name.
    pub fn get_raw(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(index).map(String::as_str)
    }

    /// Build config keys of all rows with `Active` == 1, in file order.
    pub fn active_build_keys(&self) -> Vec<&str> {
        (0..self.rows.len())
            .filter(|&row| self.get_raw(row, "Active") == Some("1"))
            .filter_map(|row| self.get_raw(row, "Build Key"))
            .filter(|key| !key.is_empty())
            .collect()
    }
}

/// Parsed build configuration
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    entries: HashMap<String, Vec<String>>,
}

/// Keys of the system files the resolver needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigKeys {
    /// Content key of the encoding file
    pub encoding_ckey: ContentKey,
    /// Encoding key of the encoding file
    pub encoding_ekey: EncodingKey,
    /// Content key of the root file
    pub root_ckey: ContentKey,
}

impl BuildConfig {
    /// Parse a build configuration from its contents
    pub fn parse_str(content: &str) -> Self {
        let entries = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| {
                (
                    key.trim().to_string(),
                    value.split_whitespace().map(String::from).collect(),
                )
            })
            .collect();
        Self { entries }
    }

    /// Read and parse a build configuration file
    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::parse_str(&std::fs::read_to_string(path)?))
    }

    /// Locate the build configuration of an installation
    ///
    /// `data_path` is the installation's `Data` directory; `.build.info` is
    /// read from its parent. The first active entry whose configuration
    /// file exists is used.
    pub fn discover(data_path: &Path) -> Result<Self> {
        let root = data_path.parent().unwrap_or(data_path);
        let build_info = BuildInfoFile::from_path(&root.join(BUILD_INFO_FILE))?;

        let keys = build_info.active_build_keys();
        for key in &keys {
            let path = config_path(data_path, key);
            if path.is_file() {
                debug!("using build config {}", path.display());
                return Self::from_path(&path);
            }
            debug!("build config {} not present", path.display());
        }

        Err(StorageError::Config(format!(
            "no build config found for {} active .build.info entries",
            keys.len()
        )))
    }

    /// Get the values of a key
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Resolve the encoding and root keys
    pub fn keys(&self) -> Result<ConfigKeys> {
        let encoding = self
            .get("encoding")
            .ok_or_else(|| StorageError::Config("build config has no encoding entry".into()))?;
        let (Some(ckey), Some(ekey)) = (encoding.first(), encoding.get(1)) else {
            return Err(StorageError::Config(
                "encoding entry needs a content and an encoding key".into(),
            ));
        };
        let root = self
            .get("root")
            .and_then(<[String]>::first)
            .ok_or_else(|| StorageError::Config("build config has no root entry".into()))?;

        Ok(ConfigKeys {
            encoding_ckey: parse_key("encoding", ckey)?,
            encoding_ekey: parse_key("encoding", ekey)?,
            root_ckey: parse_key("root", root)?,
        })
    }
}

fn parse_key(name: &str, hex: &str) -> Result<ContentKey> {
    ContentKey::from_hex(hex)
        .map_err(|e| StorageError::Config(format!("invalid {name} key {hex:?}: {e}")))
}

/// Path of a configuration file under `Data/config`
pub fn config_path(data_path: &Path, key: &str) -> PathBuf {
    let mut path = data_path.join(CONFIG_DIR);
    if let (Some(a), Some(b)) = (key.get(0..2), key.get(2..4)) {
        path = path.join(a).join(b);
    }
    path.join(key)
}
