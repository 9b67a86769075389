//! Warm → cold gzip archival and cold → warm restore

use super::error::StorageError;
use super::layout::{COLD_SUFFIX, LINE_EXTENSION, RESTORED_PREFIX};
use crate::record::normalize_patch;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct RestoreReport {
    pub path: PathBuf,
    pub lines_read: u64,
    pub lines_written: u64,
    pub lines_skipped: u64,
}

/// Only the field needed to filter restored lines by patch
#[derive(Deserialize)]
struct PatchProbe {
    game_version: String,
}

fn file_name(path: &Path) -> Result<String, StorageError> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| StorageError::InvalidFile(path.display().to_string()))
}

/// Compress a warm file into `cold_dir`, then delete the warm original.
///
/// The compressed file is written under a temporary name and renamed only
/// after it is fully synced, so a crash never leaves a partial `.gz` behind.
pub fn archive_warm_to_cold(warm: &Path, cold_dir: &Path) -> Result<PathBuf, StorageError> {
    let name = file_name(warm)?;
    let stem = name
        .strip_suffix(&format!(".{}", LINE_EXTENSION))
        .ok_or_else(|| StorageError::InvalidFile(name.clone()))?;

    let target = cold_dir.join(format!("{}{}", stem, COLD_SUFFIX));
    let tmp = cold_dir.join(format!("{}{}.tmp", stem, COLD_SUFFIX));

    {
        let mut input = BufReader::new(File::open(warm)?);
        let output = BufWriter::new(File::create(&tmp)?);
        let mut encoder = GzEncoder::new(output, Compression::default());
        io::copy(&mut input, &mut encoder)?;
        let output = encoder.finish()?;
        let file = output.into_inner().map_err(|e| StorageError::Io(e.into_error()))?;
        file.sync_all()?;
    }

    fs::rename(&tmp, &target)?;
    fs::remove_file(warm)?;

    log::info!("🗜️  Archived {} → {}", name, target.display());
    Ok(target)
}

/// Decompress every line of a cold file
pub fn read_cold_lines(path: &Path) -> Result<Vec<String>, StorageError> {
    let reader = BufReader::new(GzDecoder::new(File::open(path)?));
    let mut lines = Vec::new();
    for line in reader.lines() {
        lines.push(line?);
    }
    Ok(lines)
}

/// Decompress a cold file back into the warm tier for reprocessing.
///
/// With `patch_filter`, only lines whose normalized patch matches are kept;
/// lines that cannot be parsed are skipped and counted.
pub fn restore_cold_to_warm(
    cold: &Path,
    warm_dir: &Path,
    patch_filter: Option<&str>,
) -> Result<RestoreReport, StorageError> {
    let name = file_name(cold)?;
    let stem = name
        .strip_suffix(COLD_SUFFIX)
        .ok_or_else(|| StorageError::InvalidFile(name.clone()))?;
    let stem = stem.strip_prefix(super::layout::FILE_PREFIX).unwrap_or(stem);

    let wanted = patch_filter.map(normalize_patch);
    let out_name = match &wanted {
        Some(patch) => format!("{}{}_{}.{}", RESTORED_PREFIX, stem, patch, LINE_EXTENSION),
        None => format!("{}{}.{}", RESTORED_PREFIX, stem, LINE_EXTENSION),
    };
    let target = warm_dir.join(&out_name);
    let tmp = warm_dir.join(format!("{}.tmp", out_name));

    let reader = BufReader::new(GzDecoder::new(File::open(cold)?));
    let mut writer = BufWriter::new(File::create(&tmp)?);

    let mut report = RestoreReport {
        path: target.clone(),
        lines_read: 0,
        lines_written: 0,
        lines_skipped: 0,
    };

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        report.lines_read += 1;

        if let Some(patch) = &wanted {
            match serde_json::from_str::<PatchProbe>(&line) {
                Ok(probe) if normalize_patch(&probe.game_version) == *patch => {}
                Ok(_) => continue,
                Err(e) => {
                    log::warn!("⚠️  Skipping unreadable line in {}: {}", name, e);
                    report.lines_skipped += 1;
                    continue;
                }
            }
        }

        writeln!(writer, "{}", line)?;
        report.lines_written += 1;
    }

    writer.flush()?;
    let file = writer.into_inner().map_err(|e| StorageError::Io(e.into_error()))?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp, &target)?;

    log::info!(
        "♻️  Restored {} → {} ({} of {} lines)",
        name,
        target.display(),
        report.lines_written,
        report.lines_read
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(match_id: &str, version: &str) -> String {
        format!(r#"{{"match_id":"{}","game_version":"{}"}}"#, match_id, version)
    }

    #[test]
    fn test_archive_then_restore_preserves_lines() {
        let dir = tempfile::tempdir().unwrap();
        let warm_dir = dir.path().join("warm");
        let cold_dir = dir.path().join("cold");
        fs::create_dir_all(&warm_dir).unwrap();
        fs::create_dir_all(&cold_dir).unwrap();

        let warm = warm_dir.join("matches_00000004.jsonl");
        let content = format!("{}\n{}\n", line("NA1_1", "15.23.1"), line("NA1_2", "15.24.2"));
        fs::write(&warm, &content).unwrap();

        let cold = archive_warm_to_cold(&warm, &cold_dir).unwrap();
        assert!(!warm.exists());
        assert_eq!(cold, cold_dir.join("matches_00000004.jsonl.gz"));
        assert_eq!(read_cold_lines(&cold).unwrap().len(), 2);

        let report = restore_cold_to_warm(&cold, &warm_dir, None).unwrap();
        assert_eq!(report.path, warm_dir.join("restored_00000004.jsonl"));
        assert_eq!(fs::read_to_string(&report.path).unwrap(), content);
        assert!(cold.exists());
    }

    #[test]
    fn test_restore_with_patch_filter() {
        let dir = tempfile::tempdir().unwrap();
        let warm_dir = dir.path().join("warm");
        let cold_dir = dir.path().join("cold");
        fs::create_dir_all(&warm_dir).unwrap();
        fs::create_dir_all(&cold_dir).unwrap();

        let warm = warm_dir.join("matches_00000001.jsonl");
        let content = format!(
            "{}\n{}\nnot json\n{}\n",
            line("NA1_1", "15.23.1"),
            line("NA1_2", "15.24.734.1"),
            line("NA1_3", "15.24.9")
        );
        fs::write(&warm, content).unwrap();
        let cold = archive_warm_to_cold(&warm, &cold_dir).unwrap();

        let report = restore_cold_to_warm(&cold, &warm_dir, Some("15.24")).unwrap();

        assert_eq!(report.path, warm_dir.join("restored_00000001_15.24.jsonl"));
        assert_eq!(report.lines_read, 4);
        assert_eq!(report.lines_written, 2);
        assert_eq!(report.lines_skipped, 1);

        let restored = fs::read_to_string(&report.path).unwrap();
        assert!(restored.contains("NA1_2"));
        assert!(restored.contains("NA1_3"));
        assert!(!restored.contains("NA1_1"));
    }

    #[test]
    fn test_archive_rejects_non_line_file() {
        let dir = tempfile::tempdir().unwrap();
        let stray = dir.path().join("notes.txt");
        fs::write(&stray, "x").unwrap();

        let result = archive_warm_to_cold(&stray, dir.path());
        assert!(matches!(result, Err(StorageError::InvalidFile(_))));
        assert!(stray.exists());
    }
}
