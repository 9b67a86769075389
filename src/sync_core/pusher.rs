//! Background worker mirroring each cycle's aggregates to the replica
//!
//! The orchestrator hands over one snapshot per reduce cycle with
//! `try_send`, so the crawl never waits on the replica. A full queue drops
//! the snapshot: delivery is best effort, and additive upserts mean a
//! dropped cycle only leaves the replica behind, never inconsistent.

use super::backoff::ExponentialBackoff;
use super::replica::{ReplicaError, ReplicaStore, SyncBatch};
use crate::aggregator_core::TableRows;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// One cycle's delta tables plus the export version they belong to
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSnapshot {
    pub version: String,
    pub rows: TableRows,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub snapshots_pushed: u64,
    pub snapshots_failed: u64,
    pub rows_written: u64,
}

fn chunked<K: Clone>(
    rows: &[crate::aggregator_core::TableRow<K>],
    size: usize,
    wrap: impl Fn(Vec<crate::aggregator_core::TableRow<K>>) -> SyncBatch,
) -> Vec<SyncBatch> {
    rows.chunks(size.max(1)).map(|chunk| wrap(chunk.to_vec())).collect()
}

/// Split a snapshot into per-table batches of at most `batch_size` rows
pub fn plan_batches(rows: &TableRows, batch_size: usize) -> Vec<SyncBatch> {
    let mut batches = Vec::new();
    batches.extend(chunked(&rows.champion_stats, batch_size, SyncBatch::ChampionStats));
    batches.extend(chunked(&rows.champion_items, batch_size, SyncBatch::ChampionItems));
    batches.extend(chunked(&rows.champion_item_slots, batch_size, SyncBatch::ChampionItemSlots));
    batches.extend(chunked(&rows.champion_matchups, batch_size, SyncBatch::ChampionMatchups));
    batches
}

async fn upsert_with_retry(store: &dyn ReplicaStore, batch: &SyncBatch) -> Result<usize, ReplicaError> {
    let mut backoff = ExponentialBackoff::new(Duration::from_millis(500), Duration::from_secs(10), 3);
    loop {
        match store.upsert_batch(batch).await {
            Ok(written) => return Ok(written),
            Err(e) => {
                log::warn!("⚠️  Batch of {} {} rows failed: {}", batch.len(), batch.table(), e);
                if backoff.sleep().await.is_err() {
                    return Err(e);
                }
            }
        }
    }
}

/// Push one snapshot: drop indexes, upsert every batch, rebuild indexes
/// and stamp the version.
pub async fn push_snapshot(
    store: &dyn ReplicaStore,
    snapshot: &SyncSnapshot,
    batch_size: usize,
) -> Result<usize, ReplicaError> {
    let batches = plan_batches(&snapshot.rows, batch_size);

    store.begin_load().await?;

    let mut written = 0;
    let mut failure = None;
    for batch in &batches {
        match upsert_with_retry(store, batch).await {
            Ok(n) => written += n,
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    // Indexes come back even when a batch gave up
    let finished = match &failure {
        None => store.finish_load(&snapshot.version).await,
        Some(_) => store.finish_load(&format!("{}-partial", snapshot.version)).await,
    };

    if let Some(e) = failure {
        return Err(e);
    }
    finished?;

    log::info!(
        "🔄 Synced version {} ({} rows in {} batches)",
        snapshot.version,
        written,
        batches.len()
    );
    Ok(written)
}

pub struct SyncHandle {
    sender: Option<mpsc::Sender<SyncSnapshot>>,
    worker: Option<JoinHandle<SyncStats>>,
}

impl SyncHandle {
    /// Start the single background sync worker
    pub fn spawn(store: Arc<dyn ReplicaStore>, batch_size: usize, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<SyncSnapshot>(capacity.max(1));

        let worker = tokio::spawn(async move {
            let mut stats = SyncStats::default();
            while let Some(snapshot) = receiver.recv().await {
                match push_snapshot(store.as_ref(), &snapshot, batch_size).await {
                    Ok(written) => {
                        stats.snapshots_pushed += 1;
                        stats.rows_written += written as u64;
                    }
                    Err(e) => {
                        stats.snapshots_failed += 1;
                        log::error!("❌ Sync of version {} failed: {}", snapshot.version, e);
                    }
                }
            }
            log::info!(
                "🔄 Sync worker drained ({} pushed, {} failed)",
                stats.snapshots_pushed,
                stats.snapshots_failed
            );
            stats
        });

        Self {
            sender: Some(sender),
            worker: Some(worker),
        }
    }

    /// A handle that accepts and discards snapshots (no replica configured)
    pub fn disabled() -> Self {
        Self {
            sender: None,
            worker: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Queue a snapshot without waiting; returns whether it was accepted
    pub fn enqueue(&self, snapshot: SyncSnapshot) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        if snapshot.rows.is_empty() {
            return false;
        }

        match sender.try_send(snapshot) {
            Ok(()) => true,
            Err(TrySendError::Full(snapshot)) => {
                log::warn!("⚠️  Sync queue full, dropping snapshot {}", snapshot.version);
                false
            }
            Err(TrySendError::Closed(snapshot)) => {
                log::error!("❌ Sync worker gone, dropping snapshot {}", snapshot.version);
                false
            }
        }
    }

    /// Close the queue and wait for the worker to drain it
    pub async fn shutdown(mut self) -> SyncStats {
        drop(self.sender.take());
        match self.worker.take() {
            Some(worker) => match worker.await {
                Ok(stats) => stats,
                Err(e) => {
                    log::error!("❌ Sync worker panicked: {}", e);
                    SyncStats::default()
                }
            },
            None => SyncStats::default(),
        }
    }
}
