//! On-disk layout of the three storage tiers
//!
//! ```text
//! {root}/hot/matches_00000007.jsonl        <- the single file being appended
//! {root}/warm/matches_00000006.jsonl       <- closed, waiting to be reduced
//! {root}/warm/restored_00000002.jsonl      <- decompressed for reprocessing
//! {root}/cold/matches_00000005.jsonl.gz    <- reduced and compressed
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const FILE_PREFIX: &str = "matches_";
pub const RESTORED_PREFIX: &str = "restored_";
pub const LINE_EXTENSION: &str = "jsonl";
pub const COLD_SUFFIX: &str = ".jsonl.gz";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTier {
    Hot,
    Warm,
    Cold,
}

impl StorageTier {
    pub fn all() -> [StorageTier; 3] {
        [StorageTier::Hot, StorageTier::Warm, StorageTier::Cold]
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            StorageTier::Hot => "hot",
            StorageTier::Warm => "warm",
            StorageTier::Cold => "cold",
        }
    }
}

/// A file in one of the tiers, identified by its sequence number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageFile {
    pub tier: StorageTier,
    pub sequence: u64,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tier_dir(&self, tier: StorageTier) -> PathBuf {
        self.root.join(tier.dir_name())
    }

    pub fn ensure(&self) -> io::Result<()> {
        for tier in StorageTier::all() {
            fs::create_dir_all(self.tier_dir(tier))?;
        }
        Ok(())
    }

    pub fn data_file(&self, tier: StorageTier, sequence: u64) -> StorageFile {
        let name = match tier {
            StorageTier::Cold => format!("{}{:08}{}", FILE_PREFIX, sequence, COLD_SUFFIX),
            _ => format!("{}{:08}.{}", FILE_PREFIX, sequence, LINE_EXTENSION),
        };
        StorageFile {
            tier,
            sequence,
            path: self.tier_dir(tier).join(name),
        }
    }

    /// All sequence-numbered files in a tier, ascending
    pub fn list(&self, tier: StorageTier) -> io::Result<Vec<StorageFile>> {
        let mut files: Vec<StorageFile> = fs::read_dir(self.tier_dir(tier))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                parse_sequence(&name).map(|sequence| StorageFile {
                    tier,
                    sequence,
                    path: entry.path(),
                })
            })
            .collect();
        files.sort_by_key(|f| f.sequence);
        Ok(files)
    }

    /// Every line file in the warm tier (rotated and restored), sorted by name
    pub fn warm_line_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(self.tier_dir(StorageTier::Warm))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|s| s.to_str()) == Some(LINE_EXTENSION))
            .collect();
        files.sort();
        Ok(files)
    }
}

/// Extract the sequence number from `matches_{seq}.jsonl[.gz]`
pub fn parse_sequence(file_name: &str) -> Option<u64> {
    let rest = file_name.strip_prefix(FILE_PREFIX)?;
    let digits = rest
        .strip_suffix(COLD_SUFFIX)
        .or_else(|| rest.strip_suffix(".jsonl"))?;
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sequence() {
        assert_eq!(parse_sequence("matches_00000012.jsonl"), Some(12));
        assert_eq!(parse_sequence("matches_00000012.jsonl.gz"), Some(12));
        assert_eq!(parse_sequence("restored_00000012.jsonl"), None);
        assert_eq!(parse_sequence("matches_abc.jsonl"), None);
        assert_eq!(parse_sequence("matches_00000012.jsonl.gz.tmp"), None);
    }

    #[test]
    fn test_file_naming() {
        let layout = StorageLayout::new("/data");
        let cold = layout.data_file(StorageTier::Cold, 3);
        assert_eq!(cold.path, PathBuf::from("/data/cold/matches_00000003.jsonl.gz"));
        let hot = layout.data_file(StorageTier::Hot, 3);
        assert_eq!(hot.path, PathBuf::from("/data/hot/matches_00000003.jsonl"));
    }

    #[test]
    fn test_list_sorted_by_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        layout.ensure().unwrap();

        for seq in [10, 2, 7] {
            fs::write(layout.data_file(StorageTier::Warm, seq).path, "").unwrap();
        }
        fs::write(layout.tier_dir(StorageTier::Warm).join("notes.txt"), "").unwrap();

        let seqs: Vec<u64> = layout
            .list(StorageTier::Warm)
            .unwrap()
            .iter()
            .map(|f| f.sequence)
            .collect();
        assert_eq!(seqs, vec![2, 7, 10]);
    }
}
