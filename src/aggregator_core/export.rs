//! Aggregate export document plus its version manifest
//!
//! ```text
//! {EXPORT_DIR}/stats.json      AggregateExport (cumulative totals)
//! {EXPORT_DIR}/manifest.json   { version, data_file, patch, generated_at }
//! ```
//!
//! Downstream updaters read the manifest, compare `version`, and fetch the
//! data file only when it changed. Both files are replaced via rename so a
//! reader never sees a half-written document.

use super::accumulator::{AggregateTables, TableRows};
use crate::storage_core::StorageError;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const DATA_FILE: &str = "stats.json";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateExport {
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub patch: Option<String>,
    #[serde(flatten)]
    pub tables: TableRows,
    /// champion id → display name
    pub champions: BTreeMap<u32, String>,
}

impl AggregateExport {
    pub fn into_tables(self) -> AggregateTables {
        AggregateTables::from_rows(self.tables, self.champions)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub data_file: String,
    pub patch: Option<String>,
    pub generated_at: DateTime<Utc>,
}

pub fn export_version(patch: Option<&str>, generated_at: &DateTime<Utc>) -> String {
    format!(
        "{}-{}",
        patch.unwrap_or("unknown"),
        generated_at.format("%Y%m%d%H%M%S")
    )
}

pub struct ExportWriter {
    dir: PathBuf,
}

impl ExportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn data_path(&self) -> PathBuf {
        self.dir.join(DATA_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// Write the data file, then the manifest that points at it
    pub fn write(&self, tables: &AggregateTables, patch: Option<&str>) -> Result<Manifest, StorageError> {
        let generated_at = Utc::now();
        let version = export_version(patch, &generated_at);

        let export = AggregateExport {
            version: version.clone(),
            generated_at,
            patch: patch.map(str::to_string),
            tables: tables.rows(),
            champions: tables.champion_names.clone(),
        };
        write_json_atomic(&self.data_path(), &export, false)?;

        let manifest = Manifest {
            version,
            data_file: DATA_FILE.to_string(),
            patch: export.patch.clone(),
            generated_at,
        };
        write_json_atomic(&self.manifest_path(), &manifest, true)?;

        log::info!(
            "📤 Export written: {} ({} rows, version {})",
            self.data_path().display(),
            export.tables.len(),
            manifest.version
        );
        Ok(manifest)
    }

    /// Previous export, if one exists, to seed cumulative totals
    pub fn load_previous(&self) -> Result<Option<AggregateExport>, StorageError> {
        let path = self.data_path();
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    pub fn load_manifest(&self) -> Result<Option<Manifest>, StorageError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<(), StorageError> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        if pretty {
            serde_json::to_writer_pretty(&mut writer, value)?;
        } else {
            serde_json::to_writer(&mut writer, value)?;
        }
        writer.write_all(b"\n")?;
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| StorageError::Io(e.into_error()))?
            .sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
