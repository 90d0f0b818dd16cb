//! `cascette-db2` command line tool.
//!
//! Dumps WDC5 tables from loose `.db2` files or from a local CASC
//! installation, and decodes raw BLTE blobs.

use anyhow::{Context, Result};
use cascette_client_storage::{CascArchiveResolver, StorageConfig};
use cascette_crypto::TactKeyStore;
use cascette_formats::blte::BlteDecoder;
use cascette_formats::wdc5::{ColumnCompression, ElementWidth, Wdc5Options, Wdc5Row, Wdc5Table};
use clap::{Args, Parser, Subcommand};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{Level, info, warn};

#[derive(Parser)]
#[command(
    name = "cascette-db2",
    about = "Decode WDC5 DB2 tables from files or local CASC storage",
    version
)]
struct Cli {
    /// Set the logging level
    #[arg(short, long, value_enum, global = true, default_value = "info")]
    log_level: LogLevel,

    /// TACT key file (CSV or TXT)
    #[arg(long, global = true, env = "CASCETTE_KEY_FILE")]
    key_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Args)]
struct DumpArgs {
    /// Print at most this many rows
    #[arg(long)]
    limit: Option<usize>,

    /// Fields stored as strings (comma separated indices)
    #[arg(long, value_delimiter = ',')]
    string_columns: Vec<usize>,

    /// Print rows as JSON lines
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump a local .db2 file
    Dump {
        /// Table file
        file: PathBuf,

        #[command(flatten)]
        dump: DumpArgs,
    },

    /// Resolve a table from a CASC installation
    Casc {
        /// FileDataID of the table
        file_id: u32,

        /// Installation Data directory
        #[arg(long, env = "CASCETTE_DATA_PATH")]
        data_path: PathBuf,

        /// Storage configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the table bytes here instead of dumping rows
        #[arg(long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        dump: DumpArgs,
    },

    /// Decode a raw BLTE blob
    Blte {
        /// BLTE file
        file: PathBuf,

        /// Output file
        #[arg(long)]
        out: PathBuf,

        /// Skip per-block MD5 verification
        #[arg(long)]
        no_verify: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level: Level = cli.log_level.into();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.as_str())),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut keys = TactKeyStore::new();

    match cli.command {
        Commands::Dump { file, dump } => {
            load_keys(&mut keys, cli.key_file.as_deref())?;
            let data =
                std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let table = Wdc5Table::parse_with_options(&data, &keys, dump.options())
                .with_context(|| format!("parsing {}", file.display()))?;
            print_table(&table, &dump)?;
        }
        Commands::Casc {
            file_id,
            data_path,
            config,
            out,
            dump,
        } => {
            let mut storage = match config {
                Some(path) => StorageConfig::from_json_file(&path)?.with_data_path(&data_path),
                None => StorageConfig::new(&data_path),
            };
            if let Some(key_file) = cli.key_file {
                storage = storage.with_key_file(key_file);
            }

            let resolver = CascArchiveResolver::open(storage, keys)
                .with_context(|| format!("opening storage at {}", data_path.display()))?;

            if let Some(out) = out {
                let data = resolver
                    .read_file(file_id)
                    .with_context(|| format!("reading file {file_id}"))?;
                std::fs::write(&out, &data)
                    .with_context(|| format!("writing {}", out.display()))?;
                info!("wrote {} bytes to {}", data.len(), out.display());
            } else {
                let table = resolver
                    .open_table_with_options(file_id, dump.options())
                    .with_context(|| format!("opening table {file_id}"))?;
                print_table(&table, &dump)?;
            }
        }
        Commands::Blte {
            file,
            out,
            no_verify,
        } => {
            load_keys(&mut keys, cli.key_file.as_deref())?;
            let data =
                std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let (content, report) = BlteDecoder::new(&keys)
                .verify_checksums(!no_verify)
                .decode_with_report(&data)
                .with_context(|| format!("decoding {}", file.display()))?;
            if !report.is_complete() {
                warn!(
                    "{} blocks zero-filled, missing keys: {:016X?}",
                    report.zero_filled_blocks.len(),
                    report.missing_keys
                );
            }
            std::fs::write(&out, &content)
                .with_context(|| format!("writing {}", out.display()))?;
            info!("wrote {} bytes to {}", content.len(), out.display());
        }
    }

    Ok(())
}

fn load_keys(keys: &mut TactKeyStore, path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        let count = keys
            .load_file(path)
            .with_context(|| format!("loading keys from {}", path.display()))?;
        info!("loaded {count} keys from {}", path.display());
    }
    Ok(())
}

impl DumpArgs {
    fn options(&self) -> Wdc5Options {
        Wdc5Options::default().with_string_columns(self.string_columns.iter().copied())
    }
}

/// A decoded field, typed only as far as the column metadata allows
enum Value {
    Int(u64),
    Array(Vec<u64>),
    Text(String),
}

impl Value {
    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Array(v) => serde_json::Value::from(v.clone()),
            Self::Text(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Array(v) => write!(f, "{v:?}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

fn read_value(
    table: &Wdc5Table,
    row: &Wdc5Row<'_>,
    field: usize,
    strings: &HashSet<usize>,
) -> Result<Value> {
    if strings.contains(&field) {
        return Ok(Value::Text(row.string(field)?));
    }

    let column = &table.columns()[field];
    let value = match column.compression {
        ColumnCompression::PalletArray(info) if info.cardinality > 1 => {
            Value::Array(row.array(field, ElementWidth::U32)?)
        }
        ColumnCompression::None { .. } if column.size > 64 => {
            Value::Array(row.array(field, ElementWidth::U32)?)
        }
        _ => Value::Int(row.field(field)?),
    };
    Ok(value)
}

fn print_table(table: &Wdc5Table, dump: &DumpArgs) -> Result<()> {
    let header = table.header();
    info!(
        "{} records, {} fields, {} sections, flags {}",
        table.len(),
        table.field_count(),
        header.section_count,
        header.flags
    );
    for skipped in table.skipped_sections() {
        warn!("{skipped:?}");
    }

    let strings: HashSet<usize> = dump.string_columns.iter().copied().collect();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for row in table.rows().take(dump.limit.unwrap_or(usize::MAX)) {
        let row = row?;
        let values = (0..table.field_count())
            .map(|field| {
                read_value(table, &row, field, &strings)
                    .with_context(|| format!("row {} field {field}", row.id()))
            })
            .collect::<Result<Vec<_>>>()?;

        if dump.json {
            let fields: Vec<_> = values.iter().map(Value::to_json).collect();
            let line = serde_json::json!({ "id": row.id(), "fields": fields });
            writeln!(out, "{line}")?;
        } else {
            let fields: Vec<_> = values.iter().map(ToString::to_string).collect();
            writeln!(out, "{}\t{}", row.id(), fields.join("\t"))?;
        }
    }

    if !dump.json {
        for (id, source) in table.copy_table() {
            writeln!(out, "# copy {id} -> {source}")?;
        }
    }
    Ok(())
}
