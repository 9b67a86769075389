//! API Core - paced access to the upstream match API
//!
//! # Architecture
//!
//! ```text
//! Spider ──► MatchSource (trait) ──► RiotClient ──► RateLimiter ──► HTTP
//!                                        │
//! KeyLifecycleManager ──► CredentialValidator (trait)
//! ```
//!
//! The traits are the seams the crawler and the key manager are written
//! against, so both can be exercised without network access.

pub mod client;
pub mod error;
pub mod limiter;
pub mod types;

#[cfg(test)]
pub(crate) mod test_server;

pub use client::{ClientConfig, RiotClient};
pub use error::ApiError;
pub use limiter::RateLimiter;
pub use types::{MatchDto, ParticipantDto, PurchaseEvent, RankedEntry};

use async_trait::async_trait;

/// Read-side of the upstream API used by the crawler
#[async_trait]
pub trait MatchSource: Send + Sync {
    /// Resolve a `name#tag` pair to the opaque player id
    async fn resolve_account(&self, name: &str, tag: &str) -> Result<String, ApiError>;

    /// Most recent match ids for a player, filtered to one queue
    async fn list_recent_match_ids(
        &self,
        puuid: &str,
        count: u32,
        queue: u32,
    ) -> Result<Vec<String>, ApiError>;

    async fn fetch_match(&self, match_id: &str) -> Result<MatchDto, ApiError>;

    /// Item purchases from the match timeline, chronological
    async fn fetch_timeline(&self, match_id: &str) -> Result<Vec<PurchaseEvent>, ApiError>;

    /// Solo-queue standing, `None` when unranked
    async fn fetch_rank(&self, puuid: &str) -> Result<Option<RankedEntry>, ApiError>;
}

/// Result of probing a key against the upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    /// Rejected or expired
    Invalid,
    /// Network/server trouble - the key may or may not be good
    Indeterminate,
}

impl Validity {
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => Validity::Valid,
            401 | 403 => Validity::Invalid,
            _ => Validity::Indeterminate,
        }
    }
}

#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate_credential(&self, key: &str) -> Validity;
}
