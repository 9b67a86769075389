//! Continuous harvest loop
//!
//! ```text
//! loop {
//!     crawl pass ─► flush hot → warm ─► reduce warm ─► merge + export
//!         ─► archive warm → cold ─► enqueue sync ─► (recover key) ─► pause
//! }
//! ```
//!
//! All crawl state (frontier, filters, hot file) is owned here and lent to
//! collaborators for the duration of a call.

use crate::aggregator_core::{AggregateTables, ExportWriter, Reducer};
use crate::api_core::MatchSource;
use crate::crawler_core::{PassReport, Spider};
use crate::key_core::{KeyLifecycleManager, RecoveryOutcome, RunStats};
use crate::storage_core::{StorageError, StorageRotator};
use crate::sync_core::{SyncHandle, SyncSnapshot, SyncStats};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Pause after a pass that reached no player at all (e.g. seeds unresolvable)
pub const IDLE_PAUSE: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub enum OrchestratorError {
    Storage(StorageError),
    /// The previous export exists but cannot be read; starting over would
    /// overwrite totals whose source files are already archived
    UnreadableExport { path: PathBuf, source: StorageError },
}

impl From<StorageError> for OrchestratorError {
    fn from(err: StorageError) -> Self {
        OrchestratorError::Storage(err)
    }
}

impl std::fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestratorError::Storage(e) => write!(f, "Storage failure: {}", e),
            OrchestratorError::UnreadableExport { path, source } => write!(
                f,
                "Previous export {} is unreadable ({}); fix or move it aside before restarting",
                path.display(),
                source
            ),
        }
    }
}

impl std::error::Error for OrchestratorError {}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub pass: PassReport,
    pub files_reduced: usize,
    pub records_reduced: u64,
    pub malformed_lines: u64,
    pub files_archived: usize,
    pub export_version: Option<String>,
    pub sync_enqueued: bool,
    pub key_recovery: Option<RecoveryOutcome>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub cycles: u64,
    pub matches_collected: u64,
    pub key_recoveries: u64,
    pub sync: SyncStats,
}

pub struct Orchestrator {
    source: Arc<dyn MatchSource>,
    spider: Spider,
    storage: StorageRotator,
    reducer: Reducer,
    export: ExportWriter,
    totals: AggregateTables,
    last_patch: Option<String>,
    keys: KeyLifecycleManager,
    sync: SyncHandle,
    cycle_pause: Duration,
    started: Instant,
    last_reduce: Option<Instant>,
    matches_collected: u64,
    cycles: u64,
}

impl Orchestrator {
    /// Wire the collaborators together and reload cumulative totals from
    /// the previous export, if any.
    pub fn new(
        source: Arc<dyn MatchSource>,
        spider: Spider,
        storage: StorageRotator,
        export: ExportWriter,
        keys: KeyLifecycleManager,
        sync: SyncHandle,
        cycle_pause: Duration,
    ) -> Result<Self, OrchestratorError> {
        let (totals, last_patch) = match export.load_previous() {
            Ok(Some(previous)) => {
                log::info!("📂 Resuming totals from export {}", previous.version);
                let patch = previous.patch.clone();
                (previous.into_tables(), patch)
            }
            Ok(None) => (AggregateTables::new(), None),
            Err(e) => {
                let path = export.data_path();
                log::error!("❌ Previous export {} is unreadable: {}", path.display(), e);
                return Err(OrchestratorError::UnreadableExport { path, source: e });
            }
        };

        Ok(Self {
            source,
            spider,
            storage,
            reducer: Reducer::new(),
            export,
            totals,
            last_patch,
            keys,
            sync,
            cycle_pause,
            started: Instant::now(),
            last_reduce: None,
            matches_collected: 0,
            cycles: 0,
        })
    }

    pub fn totals(&self) -> &AggregateTables {
        &self.totals
    }

    pub fn storage(&self) -> &StorageRotator {
        &self.storage
    }

    fn run_stats(&self) -> RunStats {
        RunStats {
            matches_collected: self.matches_collected,
            runtime: self.started.elapsed(),
            since_last_reduce: self.last_reduce.map(|at| at.elapsed()),
        }
    }

    /// One full crawl → reduce → archive → sync cycle
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> Result<CycleReport, OrchestratorError> {
        self.cycles += 1;
        let pass = self
            .spider
            .run_pass(self.source.as_ref(), &mut self.storage, cancel)
            .await?;
        self.matches_collected += pass.matches_recorded as u64;

        let mut report = CycleReport {
            cycle: self.cycles,
            pass,
            files_reduced: 0,
            records_reduced: 0,
            malformed_lines: 0,
            files_archived: 0,
            export_version: None,
            sync_enqueued: false,
            key_recovery: None,
        };

        self.storage.flush_and_rotate()?;
        self.reduce_and_archive(&mut report)?;

        if report.pass.credential_exhausted() {
            let outcome = self.keys.recover(self.run_stats(), cancel).await;
            report.key_recovery = Some(outcome);
        }

        log::info!("📊 Cycle {} complete", report.cycle);
        log::info!(
            "   ├─ Crawl: {} players, {} matches, {} records ({:?})",
            report.pass.players_visited,
            report.pass.matches_recorded,
            report.pass.records_written,
            report.pass.outcome
        );
        log::info!(
            "   ├─ Reduce: {} files, {} records, {} malformed",
            report.files_reduced,
            report.records_reduced,
            report.malformed_lines
        );
        log::info!(
            "   ├─ Export: {}",
            report.export_version.as_deref().unwrap_or("unchanged")
        );
        log::info!(
            "   └─ Archived {} files, sync {}",
            report.files_archived,
            if report.sync_enqueued { "queued" } else { "skipped" }
        );

        Ok(report)
    }

    fn reduce_and_archive(&mut self, report: &mut CycleReport) -> Result<(), OrchestratorError> {
        let warm = self.storage.warm_files()?;
        if warm.is_empty() {
            return Ok(());
        }

        let reduced = self.reducer.reduce_files(&warm);
        report.files_reduced = reduced.files_processed;
        report.records_reduced = reduced.records;
        report.malformed_lines = reduced.malformed_lines;

        if !reduced.tables.is_empty() {
            self.totals.merge(&reduced.tables);
            if reduced.dominant_patch.is_some() {
                self.last_patch = reduced.dominant_patch.clone();
            }
            let manifest = self.export.write(&self.totals, self.last_patch.as_deref())?;
            self.last_reduce = Some(Instant::now());

            report.sync_enqueued = self.sync.enqueue(SyncSnapshot {
                version: manifest.version.clone(),
                rows: reduced.tables.rows(),
            });
            report.export_version = Some(manifest.version);
        }

        // Only files folded into the export above are archived
        let archived = self.storage.archive(&reduced.processed)?;
        report.files_archived = archived.len();
        Ok(())
    }

    /// Run cycles until cancelled, then drain and stop.
    pub async fn run(
        mut self,
        cancel: CancellationToken,
        session_summary: String,
    ) -> Result<RunSummary, OrchestratorError> {
        let result = self.run_loop(&cancel, session_summary).await;
        let summary = self.shutdown().await;
        result.map(|_| summary)
    }

    async fn run_loop(&mut self, cancel: &CancellationToken, session_summary: String) -> Result<(), OrchestratorError> {
        if self.keys.startup_check(cancel).await == RecoveryOutcome::Cancelled {
            return Ok(());
        }
        self.keys.notify_session_started(session_summary).await;

        while !cancel.is_cancelled() {
            let report = self.run_cycle(cancel).await?;

            if cancel.is_cancelled() || report.key_recovery == Some(RecoveryOutcome::Cancelled) {
                break;
            }

            let pause = if report.pass.players_visited == 0 && !report.pass.credential_exhausted() {
                self.cycle_pause.max(IDLE_PAUSE)
            } else {
                self.cycle_pause
            };
            if !pause.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(pause) => {}
                }
            }
        }

        Ok(())
    }

    /// Close the hot file into warm and wait for pending syncs.
    ///
    /// Warm files left here are reduced on the next start.
    pub async fn shutdown(mut self) -> RunSummary {
        match self.storage.flush_and_rotate() {
            Ok(Some(path)) => log::info!("📄 Hot file closed: {}", path.display()),
            Ok(None) => {}
            Err(e) => log::error!("❌ Failed to close hot file: {}", e),
        }

        let sync = std::mem::replace(&mut self.sync, SyncHandle::disabled()).shutdown().await;

        log::info!("✅ Harvester stopped");
        log::info!("   ├─ Cycles: {}", self.cycles);
        log::info!("   ├─ Matches collected: {}", self.matches_collected);
        log::info!("   └─ Key recoveries: {}", self.keys.recoveries());

        RunSummary {
            cycles: self.cycles,
            matches_collected: self.matches_collected,
            key_recoveries: self.keys.recoveries(),
            sync,
        }
    }
}
