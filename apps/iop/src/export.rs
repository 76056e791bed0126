//! # Export Module
//!
//! Writes result tables as CSV files plus a `manifest.json` describing them.

use iop_core::formats::{checksum, write_table};
use iop_core::{Result, Table};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Name of the manifest written next to the tables.
pub const MANIFEST_FILE: &str = "manifest.json";

/// One exported file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub file: String,
    pub rows: usize,
    /// BLAKE3 hash of the file contents (`crypto-hash` feature).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blake3: Option<String>,
}

/// Description of one export run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub tool: String,
    pub version: String,
    /// Survey file the tables were computed from.
    pub input: String,
    pub files: Vec<ManifestEntry>,
}

/// Write every table as `<name>.csv` into `dir`, creating it if needed,
/// then write the manifest.
pub fn export_tables(dir: &Path, tables: &[Table], input: &Path) -> Result<Manifest> {
    fs::create_dir_all(dir)?;

    let mut files = Vec::with_capacity(tables.len());
    for table in tables {
        let bytes = write_table(table, ',')?;
        let file = format!("{}.csv", table.name);
        fs::write(dir.join(&file), &bytes)?;
        debug!(file = %file, rows = table.len(), "table written");

        files.push(ManifestEntry {
            file,
            rows: table.len(),
            blake3: checksum(&bytes),
        });
    }

    let manifest = Manifest {
        tool: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        input: input.display().to_string(),
        files,
    };
    fs::write(
        dir.join(MANIFEST_FILE),
        serde_json::to_string_pretty(&manifest)?,
    )?;
    info!(dir = %dir.display(), files = manifest.files.len(), "export complete");

    Ok(manifest)
}
