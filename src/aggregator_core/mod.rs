//! Aggregator Core - warm files → statistic tables → export
//!
//! # Architecture
//!
//! ```text
//! warm/*.jsonl → Reducer (per-file fold, grouped by match)
//!     ↓
//! AggregateTables (champion, item, item-slot, matchup)
//!     ↓ merge into cumulative totals
//! ExportWriter → stats.json + manifest.json
//! ```

pub mod accumulator;
pub mod export;
pub mod reducer;

pub use accumulator::{
    Accumulator, AggregateTables, ChampionKey, ItemKey, ItemSlotKey, MatchupKey, TableRow, TableRows,
};
pub use export::{AggregateExport, ExportWriter, Manifest};
pub use reducer::{ReduceReport, Reducer};
