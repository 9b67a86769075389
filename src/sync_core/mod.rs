//! Sync Core - best-effort mirroring of aggregates to a SQLite replica

pub mod backoff;
pub mod pusher;
pub mod replica;

pub use backoff::{ExponentialBackoff, MaxRetriesExceeded};
pub use pusher::{push_snapshot, SyncHandle, SyncSnapshot, SyncStats};
pub use replica::{ReplicaError, ReplicaStore, SqliteReplica, SyncBatch};
