//! Fold warm JSONL files into aggregate tables
//!
//! Each file is reduced into its own tables first and merged into the
//! result only when the whole file was read, so a file that fails halfway
//! contributes nothing and stays in warm for the next cycle.

use super::accumulator::AggregateTables;
use crate::record::MatchParticipantRecord;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct ReduceReport {
    pub tables: AggregateTables,
    pub files_processed: usize,
    pub files_failed: usize,
    pub records: u64,
    pub malformed_lines: u64,
    /// Most frequent normalized patch across the reduced records
    pub dominant_patch: Option<String>,
    /// Files fully folded into `tables`, safe to archive
    pub processed: Vec<PathBuf>,
}

struct FileFold {
    tables: AggregateTables,
    records: u64,
    malformed: u64,
    patches: HashMap<String, u64>,
}

/// Pick the most frequent patch; ties go to the greater patch string
pub fn dominant_patch(counts: &HashMap<String, u64>) -> Option<String> {
    counts
        .iter()
        .max_by(|(pa, ca), (pb, cb)| ca.cmp(cb).then_with(|| pa.cmp(pb)))
        .map(|(patch, _)| patch.clone())
}

/// Champion id of the participant on the other team at the same position
fn opposing_laner(record: &MatchParticipantRecord, game: &[MatchParticipantRecord]) -> Option<u32> {
    game.iter()
        .find(|other| other.team_id != record.team_id && other.position == record.position)
        .map(|other| other.champion_id)
}

#[derive(Debug, Default)]
pub struct Reducer;

impl Reducer {
    pub fn new() -> Self {
        Self
    }

    pub fn reduce_files(&self, paths: &[PathBuf]) -> ReduceReport {
        let mut report = ReduceReport::default();
        let mut patches: HashMap<String, u64> = HashMap::new();

        for path in paths {
            match self.reduce_file(path) {
                Ok(fold) => {
                    report.tables.merge(&fold.tables);
                    report.records += fold.records;
                    report.malformed_lines += fold.malformed;
                    for (patch, count) in fold.patches {
                        *patches.entry(patch).or_insert(0) += count;
                    }
                    report.files_processed += 1;
                    report.processed.push(path.clone());
                }
                Err(e) => {
                    log::error!("❌ Failed to read {}: {} (left in warm)", path.display(), e);
                    report.files_failed += 1;
                }
            }
        }

        report.dominant_patch = dominant_patch(&patches);

        log::info!(
            "📊 Reduced {} files: {} records, {} malformed lines, dominant patch {}",
            report.files_processed,
            report.records,
            report.malformed_lines,
            report.dominant_patch.as_deref().unwrap_or("-")
        );

        report
    }

    fn reduce_file(&self, path: &Path) -> io::Result<FileFold> {
        let reader = BufReader::new(File::open(path)?);
        let mut fold = FileFold {
            tables: AggregateTables::new(),
            records: 0,
            malformed: 0,
            patches: HashMap::new(),
        };

        // Matchups need both teams, so lines are grouped per match first
        let mut games: HashMap<String, Vec<MatchParticipantRecord>> = HashMap::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<MatchParticipantRecord>(&line) {
                Ok(record) => games.entry(record.match_id.clone()).or_default().push(record),
                Err(e) => {
                    log::warn!(
                        "⚠️  Malformed line {} in {}: {}",
                        index + 1,
                        path.display(),
                        e
                    );
                    fold.malformed += 1;
                }
            }
        }

        for game in games.values() {
            for record in game {
                fold.tables.record(record, opposing_laner(record, game));
                *fold.patches.entry(record.patch()).or_insert(0) += 1;
                fold.records += 1;
            }
        }

        Ok(fold)
    }
}
