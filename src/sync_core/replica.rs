//! Remote replica of the aggregate tables
//!
//! Tables:
//! - `champion_stats`       PK (patch, champion_id, position)
//! - `champion_items`       PK (..., item_id)
//! - `champion_item_slots`  PK (..., item_id, slot)
//! - `champion_matchups`    PK (..., enemy_champion_id)
//! - `data_version`         single row (id = 1)
//!
//! Writes are additive upserts (`wins = wins + excluded.wins`), so replaying
//! a batch after a partial failure never overwrites existing totals.

use crate::aggregator_core::{ChampionKey, ItemKey, ItemSlotKey, MatchupKey, TableRow};
use async_trait::async_trait;
use rusqlite::{params, Connection, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub enum ReplicaError {
    Database(String),
}

impl From<rusqlite::Error> for ReplicaError {
    fn from(err: rusqlite::Error) -> Self {
        ReplicaError::Database(err.to_string())
    }
}

impl std::fmt::Display for ReplicaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicaError::Database(e) => write!(f, "Replica database error: {}", e),
        }
    }
}

impl std::error::Error for ReplicaError {}

/// One bounded chunk of rows from a single table
#[derive(Debug, Clone, PartialEq)]
pub enum SyncBatch {
    ChampionStats(Vec<TableRow<ChampionKey>>),
    ChampionItems(Vec<TableRow<ItemKey>>),
    ChampionItemSlots(Vec<TableRow<ItemSlotKey>>),
    ChampionMatchups(Vec<TableRow<MatchupKey>>),
}

impl SyncBatch {
    pub fn len(&self) -> usize {
        match self {
            SyncBatch::ChampionStats(rows) => rows.len(),
            SyncBatch::ChampionItems(rows) => rows.len(),
            SyncBatch::ChampionItemSlots(rows) => rows.len(),
            SyncBatch::ChampionMatchups(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn table(&self) -> &'static str {
        match self {
            SyncBatch::ChampionStats(_) => "champion_stats",
            SyncBatch::ChampionItems(_) => "champion_items",
            SyncBatch::ChampionItemSlots(_) => "champion_item_slots",
            SyncBatch::ChampionMatchups(_) => "champion_matchups",
        }
    }
}

#[async_trait]
pub trait ReplicaStore: Send + Sync {
    /// Prepare for a bulk load (drops secondary indexes)
    async fn begin_load(&self) -> Result<(), ReplicaError>;

    /// Apply one batch in a single transaction; returns rows written
    async fn upsert_batch(&self, batch: &SyncBatch) -> Result<usize, ReplicaError>;

    /// Rebuild indexes and record the data version
    async fn finish_load(&self, version: &str) -> Result<(), ReplicaError>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS champion_stats (
    patch        TEXT    NOT NULL,
    champion_id  INTEGER NOT NULL,
    position     TEXT    NOT NULL,
    wins         INTEGER NOT NULL DEFAULT 0,
    matches      INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (patch, champion_id, position)
);
CREATE TABLE IF NOT EXISTS champion_items (
    patch        TEXT    NOT NULL,
    champion_id  INTEGER NOT NULL,
    position     TEXT    NOT NULL,
    item_id      INTEGER NOT NULL,
    wins         INTEGER NOT NULL DEFAULT 0,
    matches      INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (patch, champion_id, position, item_id)
);
CREATE TABLE IF NOT EXISTS champion_item_slots (
    patch        TEXT    NOT NULL,
    champion_id  INTEGER NOT NULL,
    position     TEXT    NOT NULL,
    item_id      INTEGER NOT NULL,
    slot         INTEGER NOT NULL,
    wins         INTEGER NOT NULL DEFAULT 0,
    matches      INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (patch, champion_id, position, item_id, slot)
);
CREATE TABLE IF NOT EXISTS champion_matchups (
    patch              TEXT    NOT NULL,
    champion_id        INTEGER NOT NULL,
    position           TEXT    NOT NULL,
    enemy_champion_id  INTEGER NOT NULL,
    wins               INTEGER NOT NULL DEFAULT 0,
    matches            INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (patch, champion_id, position, enemy_champion_id)
);
CREATE TABLE IF NOT EXISTS data_version (
    id          INTEGER PRIMARY KEY CHECK (id = 1),
    version     TEXT    NOT NULL,
    updated_at  INTEGER NOT NULL
);
"#;

const CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_champion_stats_position ON champion_stats (patch, position);
CREATE INDEX IF NOT EXISTS idx_champion_items_item ON champion_items (patch, item_id);
CREATE INDEX IF NOT EXISTS idx_champion_matchups_enemy ON champion_matchups (patch, enemy_champion_id);
"#;

const DROP_INDEXES: &str = r#"
DROP INDEX IF EXISTS idx_champion_stats_position;
DROP INDEX IF EXISTS idx_champion_items_item;
DROP INDEX IF EXISTS idx_champion_matchups_enemy;
"#;

fn upsert_rows<K>(
    tx: &Transaction<'_>,
    sql: &str,
    rows: &[TableRow<K>],
    bind: impl Fn(&mut rusqlite::Statement<'_>, &TableRow<K>) -> rusqlite::Result<usize>,
) -> Result<usize, ReplicaError> {
    let mut stmt = tx.prepare_cached(sql)?;
    for row in rows {
        bind(&mut *stmt, row)?;
    }
    Ok(rows.len())
}

pub struct SqliteReplica {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteReplica {
    /// Open the replica and create the schema if missing
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReplicaError> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        conn.execute_batch(CREATE_INDEXES)?;

        log::info!("🗄️  Replica ready at {}", path.as_ref().display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ReplicaError> {
        self.conn
            .lock()
            .map_err(|_| ReplicaError::Database("replica connection poisoned".to_string()))
    }

    /// Run SQLite work on the blocking pool, off the async workers
    async fn blocking<T, F>(&self, work: F) -> Result<T, ReplicaError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, ReplicaError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| ReplicaError::Database("replica connection poisoned".to_string()))?;
            work(&mut guard)
        })
        .await
        .map_err(|e| ReplicaError::Database(format!("replica task failed: {}", e)))?
    }

    pub fn data_version(&self) -> Result<Option<String>, ReplicaError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT version FROM data_version WHERE id = 1")?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// (wins, matches) for one champion_stats row
    pub fn champion_totals(
        &self,
        patch: &str,
        champion_id: u32,
        position: &str,
    ) -> Result<Option<(i64, i64)>, ReplicaError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT wins, matches FROM champion_stats WHERE patch = ?1 AND champion_id = ?2 AND position = ?3",
        )?;
        let mut rows = stmt.query(params![patch, champion_id, position])?;
        match rows.next()? {
            Some(row) => Ok(Some((row.get(0)?, row.get(1)?))),
            None => Ok(None),
        }
    }

    pub fn row_count(&self, table: &str) -> Result<i64, ReplicaError> {
        let conn = self.lock()?;
        let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn index_count(&self) -> Result<i64, ReplicaError> {
        let conn = self.lock()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn write_batch(conn: &mut Connection, batch: &SyncBatch) -> Result<usize, ReplicaError> {
    let tx = conn.transaction()?;

    let written = match batch {
        SyncBatch::ChampionStats(rows) => upsert_rows(
            &tx,
            "INSERT INTO champion_stats (patch, champion_id, position, wins, matches)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(patch, champion_id, position) DO UPDATE SET
                 wins = wins + excluded.wins,
                 matches = matches + excluded.matches",
            rows,
            |stmt, row| {
                stmt.execute(params![
                    row.key.patch,
                    row.key.champion_id,
                    row.key.position.as_str(),
                    row.wins as i64,
                    row.matches as i64
                ])
            },
        )?,
        SyncBatch::ChampionItems(rows) => upsert_rows(
            &tx,
            "INSERT INTO champion_items (patch, champion_id, position, item_id, wins, matches)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(patch, champion_id, position, item_id) DO UPDATE SET
                 wins = wins + excluded.wins,
                 matches = matches + excluded.matches",
            rows,
            |stmt, row| {
                stmt.execute(params![
                    row.key.champion.patch,
                    row.key.champion.champion_id,
                    row.key.champion.position.as_str(),
                    row.key.item_id,
                    row.wins as i64,
                    row.matches as i64
                ])
            },
        )?,
        SyncBatch::ChampionItemSlots(rows) => upsert_rows(
            &tx,
            "INSERT INTO champion_item_slots (patch, champion_id, position, item_id, slot, wins, matches)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(patch, champion_id, position, item_id, slot) DO UPDATE SET
                 wins = wins + excluded.wins,
                 matches = matches + excluded.matches",
            rows,
            |stmt, row| {
                stmt.execute(params![
                    row.key.champion.patch,
                    row.key.champion.champion_id,
                    row.key.champion.position.as_str(),
                    row.key.item_id,
                    row.key.slot,
                    row.wins as i64,
                    row.matches as i64
                ])
            },
        )?,
        SyncBatch::ChampionMatchups(rows) => upsert_rows(
            &tx,
            "INSERT INTO champion_matchups (patch, champion_id, position, enemy_champion_id, wins, matches)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(patch, champion_id, position, enemy_champion_id) DO UPDATE SET
                 wins = wins + excluded.wins,
                 matches = matches + excluded.matches",
            rows,
            |stmt, row| {
                stmt.execute(params![
                    row.key.champion.patch,
                    row.key.champion.champion_id,
                    row.key.champion.position.as_str(),
                    row.key.enemy_champion_id,
                    row.wins as i64,
                    row.matches as i64
                ])
            },
        )?,
    };

    tx.commit()?;
    Ok(written)
}

#[async_trait]
impl ReplicaStore for SqliteReplica {
    async fn begin_load(&self) -> Result<(), ReplicaError> {
        self.blocking(|conn| {
            conn.execute_batch(DROP_INDEXES)?;
            Ok(())
        })
        .await
    }

    async fn upsert_batch(&self, batch: &SyncBatch) -> Result<usize, ReplicaError> {
        let batch = batch.clone();
        self.blocking(move |conn| write_batch(conn, &batch)).await
    }

    async fn finish_load(&self, version: &str) -> Result<(), ReplicaError> {
        let version = version.to_string();
        self.blocking(move |conn| {
            conn.execute_batch(CREATE_INDEXES)?;
            conn.execute(
                "INSERT INTO data_version (id, version, updated_at) VALUES (1, ?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET version = excluded.version, updated_at = excluded.updated_at",
                params![version, chrono::Utc::now().timestamp()],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Role;

    fn stat(champion_id: u32, wins: u64, matches: u64) -> TableRow<ChampionKey> {
        TableRow {
            key: ChampionKey {
                patch: "15.24".to_string(),
                champion_id,
                position: Role::Jungle,
            },
            wins,
            matches,
        }
    }

    #[tokio::test]
    async fn test_upsert_is_additive() {
        let dir = tempfile::tempdir().unwrap();
        let replica = SqliteReplica::open(dir.path().join("replica.db")).unwrap();

        let batch = SyncBatch::ChampionStats(vec![stat(64, 3, 5), stat(76, 1, 1)]);
        assert_eq!(replica.upsert_batch(&batch).await.unwrap(), 2);
        replica
            .upsert_batch(&SyncBatch::ChampionStats(vec![stat(64, 2, 2)]))
            .await
            .unwrap();

        assert_eq!(replica.champion_totals("15.24", 64, "JUNGLE").unwrap(), Some((5, 7)));
        assert_eq!(replica.champion_totals("15.24", 76, "JUNGLE").unwrap(), Some((1, 1)));
        assert_eq!(replica.row_count("champion_stats").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_load_cycle_rebuilds_indexes_and_sets_version() {
        let dir = tempfile::tempdir().unwrap();
        let replica = SqliteReplica::open(dir.path().join("replica.db")).unwrap();
        assert_eq!(replica.index_count().unwrap(), 3);

        replica.begin_load().await.unwrap();
        assert_eq!(replica.index_count().unwrap(), 0);

        replica.finish_load("15.24-20260101000000").await.unwrap();
        assert_eq!(replica.index_count().unwrap(), 3);
        assert_eq!(replica.data_version().unwrap().as_deref(), Some("15.24-20260101000000"));

        replica.finish_load("15.24-20260102000000").await.unwrap();
        assert_eq!(replica.row_count("data_version").unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_batches_stay_additive() {
        let dir = tempfile::tempdir().unwrap();
        let replica = Arc::new(SqliteReplica::open(dir.path().join("replica.db")).unwrap());

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let replica = replica.clone();
            tasks.push(tokio::spawn(async move {
                replica
                    .upsert_batch(&SyncBatch::ChampionStats(vec![stat(64, 1, 2)]))
                    .await
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 1);
        }

        assert_eq!(replica.champion_totals("15.24", 64, "JUNGLE").unwrap(), Some((8, 16)));
    }

    #[test]
    fn test_schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replica.db");
        SqliteReplica::open(&path).unwrap();
        SqliteReplica::open(&path).unwrap();
    }
}
