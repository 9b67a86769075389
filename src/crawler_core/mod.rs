//! Crawler Core - player graph traversal and record extraction
//!
//! ```text
//! frontier (VecDeque + 2 Bloom filters)
//!     │ pop player
//!     ▼
//! rank gate ─► list match ids ─► unseen? ─► fetch match (+ sampled timeline)
//!                                              │
//!                                              ▼
//!                          normalizer ─► StorageRotator::write_record
//!                                              │
//!                                 participants ─► frontier
//! ```

pub mod bloom;
pub mod frontier;
pub mod items;
pub mod normalizer;
pub mod rank;
pub mod spider;

pub use bloom::BloomFilter;
pub use frontier::CrawlFrontier;
pub use items::{build_order, is_completed_item};
pub use rank::{RankGate, Tier};
pub use spider::{CrawlError, PassOutcome, PassReport, SeedPlayer, Spider, SpiderConfig};
