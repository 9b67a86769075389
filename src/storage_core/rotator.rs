//! Hot-file JSONL writer with match-count rotation into the warm tier

use super::archive::archive_warm_to_cold;
use super::error::StorageError;
use super::layout::{StorageLayout, StorageTier};
use crate::record::MatchParticipantRecord;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

struct HotFile {
    path: PathBuf,
    sequence: u64,
    writer: BufWriter<File>,
    matches: u32,
    records: u64,
}

/// Snapshot of the rotator for operator logging
#[derive(Debug, Clone, PartialEq)]
pub struct StorageStats {
    pub current_file: Option<String>,
    pub matches_in_file: u32,
    pub records_in_file: u64,
    pub next_sequence: u64,
}

pub struct StorageRotator {
    layout: StorageLayout,
    rotation_threshold: u32,
    next_sequence: u64,
    hot: Option<HotFile>,
}

impl StorageRotator {
    /// Open (or create) the tier directories under `root`.
    ///
    /// A hot file left behind by an interrupted run only ever contains whole
    /// lines, so it is promoted to warm as-is.
    pub fn open(root: impl Into<PathBuf>, rotation_threshold: u32) -> Result<Self, StorageError> {
        let layout = StorageLayout::new(root);
        layout.ensure()?;

        let mut max_sequence = 0;
        for tier in StorageTier::all() {
            for file in layout.list(tier)? {
                max_sequence = max_sequence.max(file.sequence);
            }
        }

        for stray in layout.list(StorageTier::Hot)? {
            let target = layout.data_file(StorageTier::Warm, stray.sequence).path;
            std::fs::rename(&stray.path, &target)?;
            log::warn!("⚠️  Recovered interrupted hot file → {}", target.display());
        }

        log::info!(
            "📦 Storage ready at {} (next sequence: {}, rotation every {} matches)",
            layout.root().display(),
            max_sequence + 1,
            rotation_threshold
        );

        Ok(Self {
            layout,
            rotation_threshold: rotation_threshold.max(1),
            next_sequence: max_sequence + 1,
            hot: None,
        })
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    fn hot_file(&mut self) -> Result<&mut HotFile, StorageError> {
        if self.hot.is_none() {
            let file = self.layout.data_file(StorageTier::Hot, self.next_sequence);
            let handle = OpenOptions::new().create(true).append(true).open(&file.path)?;
            log::debug!("📝 Opened hot file {}", file.path.display());

            self.next_sequence += 1;
            self.hot = Some(HotFile {
                path: file.path,
                sequence: file.sequence,
                writer: BufWriter::new(handle),
                matches: 0,
                records: 0,
            });
        }

        self.hot
            .as_mut()
            .ok_or_else(|| StorageError::InvalidFile("hot file unavailable".to_string()))
    }

    /// Append one record as a single JSON line
    pub fn write_record(&mut self, record: &MatchParticipantRecord) -> Result<(), StorageError> {
        let json = serde_json::to_string(record)?;
        let hot = self.hot_file()?;
        writeln!(hot.writer, "{}", json)?;
        hot.writer.flush()?;
        hot.records += 1;
        Ok(())
    }

    /// Count a finished match; rotates hot → warm at the threshold.
    ///
    /// Returns the warm path when a rotation happened.
    pub fn match_complete(&mut self) -> Result<Option<PathBuf>, StorageError> {
        let threshold = self.rotation_threshold;
        let reached = match self.hot.as_mut() {
            Some(hot) => {
                hot.matches += 1;
                hot.matches >= threshold
            }
            None => false,
        };

        if reached {
            self.flush_and_rotate()
        } else {
            Ok(None)
        }
    }

    /// Close the hot file now and move it to warm. No-op without a hot file.
    pub fn flush_and_rotate(&mut self) -> Result<Option<PathBuf>, StorageError> {
        let Some(mut hot) = self.hot.take() else {
            return Ok(None);
        };

        hot.writer.flush()?;
        let file = hot
            .writer
            .into_inner()
            .map_err(|e| StorageError::Io(e.into_error()))?;
        file.sync_all()?;
        drop(file);

        let target = self.layout.data_file(StorageTier::Warm, hot.sequence).path;
        std::fs::rename(&hot.path, &target)?;

        log::info!(
            "📄 Rotated {} → warm ({} matches, {} records)",
            hot.path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
            hot.matches,
            hot.records
        );

        Ok(Some(target))
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats {
            current_file: self.hot.as_ref().and_then(|hot| {
                hot.path.file_name().map(|n| n.to_string_lossy().to_string())
            }),
            matches_in_file: self.hot.as_ref().map_or(0, |hot| hot.matches),
            records_in_file: self.hot.as_ref().map_or(0, |hot| hot.records),
            next_sequence: self.next_sequence,
        }
    }

    pub fn warm_files(&self) -> Result<Vec<PathBuf>, StorageError> {
        Ok(self.layout.warm_line_files()?)
    }

    /// Compress already-reduced warm files into cold and delete the originals
    pub fn archive(&self, warm_files: &[PathBuf]) -> Result<Vec<PathBuf>, StorageError> {
        let cold_dir = self.layout.tier_dir(StorageTier::Cold);
        warm_files
            .iter()
            .map(|path| archive_warm_to_cold(path, &cold_dir))
            .collect()
    }
}

impl Drop for StorageRotator {
    fn drop(&mut self) {
        if let Some(hot) = self.hot.as_mut() {
            let _ = hot.writer.flush();
        }
    }
}
