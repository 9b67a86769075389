//! Breadth-first crawl over the player graph
//!
//! One pass pops players from the frontier until it is empty, the per-pass
//! player cap is reached, or cancellation fires. Each unseen match is fetched
//! once, normalized into records, appended to hot storage, and its
//! participants are pushed onto the frontier.
//!
//! The frontier carries over between passes. Seeds are resolved and queued
//! once; when every reachable player has been visited the pass ends empty.

use super::frontier::CrawlFrontier;
use super::normalizer::records_from_match;
use super::rank::RankGate;
use crate::api_core::{ApiError, MatchSource};
use crate::storage_core::{StorageError, StorageRotator};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

/// A seed account given as `Name#TAG`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedPlayer {
    pub name: String,
    pub tag: String,
}

impl SeedPlayer {
    pub fn parse(value: &str) -> Option<Self> {
        let (name, tag) = value.trim().rsplit_once('#')?;
        let (name, tag) = (name.trim(), tag.trim());
        if name.is_empty() || tag.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }
}

impl std::fmt::Display for SeedPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.name, self.tag)
    }
}

#[derive(Debug, Clone)]
pub struct SpiderConfig {
    pub seeds: Vec<SeedPlayer>,
    pub matches_per_player: u32,
    pub max_players_per_pass: usize,
    pub worker_count: usize,
    pub timeline_sampling_rate: f64,
    pub queue_id: u32,
    pub rank_gate: Option<RankGate>,
    pub filter_expected_items: usize,
    pub filter_false_positive_rate: f64,
}

impl Default for SpiderConfig {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            matches_per_player: 20,
            max_players_per_pass: 200,
            worker_count: 1,
            timeline_sampling_rate: 0.25,
            queue_id: 420,
            rank_gate: None,
            filter_expected_items: 1_000_000,
            filter_false_positive_rate: 0.001,
        }
    }
}

#[derive(Debug)]
pub enum CrawlError {
    /// The upstream rejected the key; the pass stops so recovery can run
    CredentialExhausted,
    Cancelled,
    Storage(StorageError),
}

impl From<StorageError> for CrawlError {
    fn from(err: StorageError) -> Self {
        CrawlError::Storage(err)
    }
}

impl std::fmt::Display for CrawlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrawlError::CredentialExhausted => write!(f, "API key rejected by upstream"),
            CrawlError::Cancelled => write!(f, "Crawl cancelled"),
            CrawlError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for CrawlError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Completed,
    Cancelled,
    CredentialExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub players_visited: usize,
    pub players_gated: usize,
    pub players_failed: usize,
    pub matches_recorded: usize,
    pub matches_already_seen: usize,
    pub matches_failed: usize,
    pub timelines_sampled: usize,
    pub records_written: usize,
    pub outcome: PassOutcome,
}

impl PassReport {
    fn new() -> Self {
        Self {
            players_visited: 0,
            players_gated: 0,
            players_failed: 0,
            matches_recorded: 0,
            matches_already_seen: 0,
            matches_failed: 0,
            timelines_sampled: 0,
            records_written: 0,
            outcome: PassOutcome::Completed,
        }
    }

    pub fn cancelled(&self) -> bool {
        self.outcome == PassOutcome::Cancelled
    }

    pub fn credential_exhausted(&self) -> bool {
        self.outcome == PassOutcome::CredentialExhausted
    }
}

/// Decide what an upstream failure means for the current unit of work.
///
/// `Ok(())` means "log and skip"; errors unwind the pass.
fn triage(err: ApiError, unit: &str, id: &str) -> Result<(), CrawlError> {
    match err {
        ApiError::CredentialInvalid => {
            log::error!("🔑 Key rejected while fetching {} {} (status: 403)", unit, id);
            Err(CrawlError::CredentialExhausted)
        }
        ApiError::Cancelled => Err(CrawlError::Cancelled),
        other => {
            log::warn!(
                "⚠️  Skipping {} {} (status: {}): {}",
                unit,
                id,
                other.status_code().map_or("-".to_string(), |s| s.to_string()),
                other
            );
            Ok(())
        }
    }
}

pub struct Spider {
    config: SpiderConfig,
    frontier: CrawlFrontier,
    seeds_resolved: bool,
    rng: StdRng,
}

impl Spider {
    pub fn new(config: SpiderConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic timeline sampling, for tests
    pub fn with_rng_seed(config: SpiderConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(mut config: SpiderConfig, rng: StdRng) -> Self {
        if config.worker_count > 1 {
            log::warn!(
                "⚠️  CRAWL_WORKERS={} requested; the crawl loop is sequential, using 1",
                config.worker_count
            );
            config.worker_count = 1;
        }
        config.timeline_sampling_rate = config.timeline_sampling_rate.clamp(0.0, 1.0);

        let frontier = CrawlFrontier::new(config.filter_expected_items, config.filter_false_positive_rate);
        Self {
            config,
            frontier,
            seeds_resolved: false,
            rng,
        }
    }

    pub fn frontier(&self) -> &CrawlFrontier {
        &self.frontier
    }

    /// Run one crawl pass. Only storage failures are returned as errors;
    /// key exhaustion and cancellation end the pass and are reported in
    /// `PassReport::outcome`.
    pub async fn run_pass(
        &mut self,
        source: &dyn MatchSource,
        storage: &mut StorageRotator,
        cancel: &CancellationToken,
    ) -> Result<PassReport, StorageError> {
        let mut report = PassReport::new();

        match self.crawl(source, storage, cancel, &mut report).await {
            Ok(()) => {}
            Err(CrawlError::CredentialExhausted) => report.outcome = PassOutcome::CredentialExhausted,
            Err(CrawlError::Cancelled) => report.outcome = PassOutcome::Cancelled,
            Err(CrawlError::Storage(e)) => return Err(e),
        }

        log::info!(
            "🕸️  Pass finished ({:?}): {} players, {} matches recorded, {} records",
            report.outcome,
            report.players_visited,
            report.matches_recorded,
            report.records_written
        );
        Ok(report)
    }

    async fn crawl(
        &mut self,
        source: &dyn MatchSource,
        storage: &mut StorageRotator,
        cancel: &CancellationToken,
        report: &mut PassReport,
    ) -> Result<(), CrawlError> {
        if self.frontier.is_empty() {
            if !self.seeds_resolved {
                self.enqueue_seeds(source, cancel).await?;
            } else {
                log::info!("🕸️  Frontier exhausted: every reachable player was visited this run");
            }
        }

        while report.players_visited < self.config.max_players_per_pass {
            if cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }
            let Some(puuid) = self.frontier.next_player() else {
                log::info!("Frontier exhausted");
                break;
            };
            report.players_visited += 1;
            let result = self.crawl_player(&puuid, source, storage, cancel, report).await;
            if let Err(e) = result {
                if matches!(e, CrawlError::CredentialExhausted | CrawlError::Cancelled) {
                    // Finished matches are marked; the rest are picked up on retry
                    self.frontier.requeue_front(puuid);
                }
                return Err(e);
            }
        }

        Ok(())
    }

    /// Resolve the seed accounts once per run and queue them
    async fn enqueue_seeds(
        &mut self,
        source: &dyn MatchSource,
        cancel: &CancellationToken,
    ) -> Result<(), CrawlError> {
        let mut resolved = Vec::new();
        for seed in &self.config.seeds {
            if cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }
            match source.resolve_account(&seed.name, &seed.tag).await {
                Ok(puuid) => {
                    log::info!("🌱 Seed {} resolved", seed);
                    resolved.push(puuid);
                }
                Err(e) => triage(e, "seed", &seed.to_string())?,
            }
        }
        if resolved.is_empty() {
            log::warn!("⚠️  No seed player could be resolved");
            return Ok(());
        }

        for puuid in &resolved {
            self.frontier.enqueue_player(puuid);
        }
        self.seeds_resolved = true;
        Ok(())
    }

    async fn crawl_player(
        &mut self,
        puuid: &str,
        source: &dyn MatchSource,
        storage: &mut StorageRotator,
        cancel: &CancellationToken,
        report: &mut PassReport,
    ) -> Result<(), CrawlError> {
        if let Some(gate) = self.config.rank_gate {
            match source.fetch_rank(puuid).await {
                Ok(entry) if gate.admits(entry.as_ref()) => {}
                Ok(entry) => {
                    log::debug!(
                        "Player {} below rank gate ({})",
                        puuid,
                        entry.map_or("unranked".to_string(), |e| format!("{} {}", e.tier, e.division))
                    );
                    report.players_gated += 1;
                    return Ok(());
                }
                Err(e) => {
                    report.players_failed += 1;
                    return triage(e, "player", puuid);
                }
            }
        }

        let match_ids = match source
            .list_recent_match_ids(puuid, self.config.matches_per_player, self.config.queue_id)
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                report.players_failed += 1;
                return triage(e, "player", puuid);
            }
        };

        for match_id in match_ids {
            if cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }
            if self.frontier.has_seen_match(&match_id) {
                report.matches_already_seen += 1;
                continue;
            }
            self.crawl_match(&match_id, source, storage, report).await?;
        }

        Ok(())
    }

    async fn crawl_match(
        &mut self,
        match_id: &str,
        source: &dyn MatchSource,
        storage: &mut StorageRotator,
        report: &mut PassReport,
    ) -> Result<(), CrawlError> {
        let match_dto = match source.fetch_match(match_id).await {
            Ok(m) => m,
            Err(e) => {
                // Key exhaustion and shutdown leave the match unmarked
                triage(e, "match", match_id)?;
                self.frontier.mark_match(match_id);
                report.matches_failed += 1;
                return Ok(());
            }
        };

        let mut interrupted = None;
        let purchases = if self.rng.gen::<f64>() < self.config.timeline_sampling_rate {
            match source.fetch_timeline(match_id).await {
                Ok(events) => {
                    report.timelines_sampled += 1;
                    Some(events)
                }
                Err(e) => {
                    // The fetched match is recorded before the pass stops
                    if let Err(stop) = triage(e, "timeline", match_id) {
                        interrupted = Some(stop);
                    }
                    None
                }
            }
        } else {
            None
        };

        self.frontier.mark_match(match_id);

        let records = records_from_match(&match_dto, purchases.as_deref());
        for record in &records {
            storage.write_record(record)?;
        }
        storage.match_complete()?;

        report.matches_recorded += 1;
        report.records_written += records.len();

        for participant in &match_dto.info.participants {
            self.frontier.enqueue_player(&participant.puuid);
        }

        log::debug!("✅ Recorded {} ({} records)", match_id, records.len());
        match interrupted {
            Some(stop) => Err(stop),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_core::{MatchDto, PurchaseEvent, RankedEntry};
    use crate::crawler_core::normalizer::fixtures::sample_match;
    use crate::crawler_core::rank::Tier;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSource {
        seed_matches: Vec<String>,
        other_matches: Vec<String>,
        failing: HashMap<String, ApiError>,
        fail_once: Mutex<HashMap<String, ApiError>>,
        timeline_error: Option<ApiError>,
        ranks: HashMap<String, RankedEntry>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, call: &str) -> usize {
            self.calls().iter().filter(|c| c.as_str() == call).count()
        }

        fn log(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl MatchSource for FakeSource {
        async fn resolve_account(&self, name: &str, tag: &str) -> Result<String, ApiError> {
            self.log(format!("account:{}#{}", name, tag));
            Ok("seed-puuid".to_string())
        }

        async fn list_recent_match_ids(&self, puuid: &str, _count: u32, _queue: u32) -> Result<Vec<String>, ApiError> {
            self.log(format!("ids:{}", puuid));
            if puuid == "seed-puuid" {
                Ok(self.seed_matches.clone())
            } else {
                Ok(self.other_matches.clone())
            }
        }

        async fn fetch_match(&self, match_id: &str) -> Result<MatchDto, ApiError> {
            self.log(format!("match:{}", match_id));
            if let Some(err) = self.fail_once.lock().unwrap().remove(match_id) {
                return Err(err);
            }
            match self.failing.get(match_id) {
                Some(err) => Err(err.clone()),
                None => Ok(sample_match(match_id, "15.24.734.1")),
            }
        }

        async fn fetch_timeline(&self, match_id: &str) -> Result<Vec<PurchaseEvent>, ApiError> {
            self.log(format!("timeline:{}", match_id));
            Err(self.timeline_error.clone().unwrap_or(ApiError::Transient { status: 503 }))
        }

        async fn fetch_rank(&self, puuid: &str) -> Result<Option<RankedEntry>, ApiError> {
            self.log(format!("rank:{}", puuid));
            Ok(self.ranks.get(puuid).cloned())
        }
    }

    fn config() -> SpiderConfig {
        SpiderConfig {
            seeds: vec![SeedPlayer::parse("Seed#NA1").unwrap()],
            timeline_sampling_rate: 0.0,
            filter_expected_items: 10_000,
            ..SpiderConfig::default()
        }
    }

    #[test]
    fn test_seed_parse() {
        assert_eq!(
            SeedPlayer::parse(" Hide on bush#KR1 "),
            Some(SeedPlayer { name: "Hide on bush".to_string(), tag: "KR1".to_string() })
        );
        assert_eq!(SeedPlayer::parse("NoTag"), None);
        assert_eq!(SeedPlayer::parse("#KR1"), None);
    }

    #[tokio::test]
    async fn test_seen_match_is_never_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = StorageRotator::open(dir.path(), 100).unwrap();
        let source = FakeSource {
            seed_matches: vec!["NA1_1".to_string(), "NA1_2".to_string()],
            // every discovered player reports the same matches again
            other_matches: vec!["NA1_1".to_string(), "NA1_2".to_string()],
            ..FakeSource::default()
        };
        let mut spider = Spider::with_rng_seed(config(), 7);

        let report = spider.run_pass(&source, &mut storage, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.outcome, PassOutcome::Completed);
        assert_eq!(report.matches_recorded, 2);
        assert_eq!(report.records_written, 20);
        assert_eq!(source.count("match:NA1_1"), 1);
        assert_eq!(source.count("match:NA1_2"), 1);
        // seed + 20 participants
        assert_eq!(report.players_visited, 21);

        // Every reachable player was visited: the next pass lists nobody again
        let second = spider.run_pass(&source, &mut storage, &CancellationToken::new()).await.unwrap();
        assert_eq!(second.outcome, PassOutcome::Completed);
        assert_eq!(second.players_visited, 0);
        assert_eq!(second.matches_recorded, 0);
        assert_eq!(source.count("match:NA1_1"), 1);
        assert_eq!(source.count("ids:seed-puuid"), 1);
        assert_eq!(source.count("account:Seed#NA1"), 1);
    }

    #[tokio::test]
    async fn test_players_carry_over_between_passes() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = StorageRotator::open(dir.path(), 100).unwrap();
        let source = FakeSource {
            seed_matches: vec!["NA1_1".to_string()],
            ..FakeSource::default()
        };
        let mut spider = Spider::with_rng_seed(SpiderConfig { max_players_per_pass: 4, ..config() }, 7);

        let first = spider.run_pass(&source, &mut storage, &CancellationToken::new()).await.unwrap();
        let second = spider.run_pass(&source, &mut storage, &CancellationToken::new()).await.unwrap();
        let third = spider.run_pass(&source, &mut storage, &CancellationToken::new()).await.unwrap();

        // seed + 10 participants, four per pass
        assert_eq!(first.players_visited, 4);
        assert_eq!(second.players_visited, 4);
        assert_eq!(third.players_visited, 3);
        assert_eq!(source.count("ids:seed-puuid"), 1);
        for i in 0..10 {
            assert_eq!(source.count(&format!("ids:NA1_1-p{}", i)), 1);
        }
    }

    #[tokio::test]
    async fn test_not_found_skips_only_that_match() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = StorageRotator::open(dir.path(), 100).unwrap();
        let mut failing = HashMap::new();
        failing.insert("NA1_gone".to_string(), ApiError::NotFound);
        let source = FakeSource {
            seed_matches: vec!["NA1_gone".to_string(), "NA1_2".to_string()],
            failing,
            ..FakeSource::default()
        };
        let mut spider = Spider::with_rng_seed(config(), 7);

        let report = spider.run_pass(&source, &mut storage, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.outcome, PassOutcome::Completed);
        assert_eq!(report.matches_failed, 1);
        assert_eq!(report.matches_recorded, 1);
        assert!(spider.frontier().has_seen_match("NA1_gone"));
    }

    #[tokio::test]
    async fn test_credential_rejection_ends_pass() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = StorageRotator::open(dir.path(), 100).unwrap();
        let mut failing = HashMap::new();
        failing.insert("NA1_1".to_string(), ApiError::CredentialInvalid);
        let source = FakeSource {
            seed_matches: vec!["NA1_1".to_string(), "NA1_2".to_string()],
            failing,
            ..FakeSource::default()
        };
        let mut spider = Spider::with_rng_seed(config(), 7);

        let report = spider.run_pass(&source, &mut storage, &CancellationToken::new()).await.unwrap();

        assert!(report.credential_exhausted());
        assert_eq!(source.calls().last().map(String::as_str), Some("match:NA1_1"));
        assert_eq!(source.count("match:NA1_2"), 0);
    }

    #[tokio::test]
    async fn test_match_rejected_by_key_is_fetched_after_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = StorageRotator::open(dir.path(), 100).unwrap();
        let mut fail_once = HashMap::new();
        fail_once.insert("NA1_1".to_string(), ApiError::CredentialInvalid);
        let source = FakeSource {
            seed_matches: vec!["NA1_1".to_string()],
            fail_once: Mutex::new(fail_once),
            ..FakeSource::default()
        };
        let mut spider = Spider::with_rng_seed(config(), 7);

        let first = spider.run_pass(&source, &mut storage, &CancellationToken::new()).await.unwrap();
        assert!(first.credential_exhausted());
        assert_eq!(first.matches_recorded, 0);
        assert_eq!(first.matches_failed, 0);
        assert!(!spider.frontier().has_seen_match("NA1_1"));

        // The interrupted seed is first in line once a key works again
        let second = spider.run_pass(&source, &mut storage, &CancellationToken::new()).await.unwrap();
        assert_eq!(second.outcome, PassOutcome::Completed);
        assert_eq!(second.matches_recorded, 1);
        assert_eq!(source.count("match:NA1_1"), 2);
        assert_eq!(source.count("ids:seed-puuid"), 2);
        assert_eq!(source.count("account:Seed#NA1"), 1);
        assert!(spider.frontier().has_seen_match("NA1_1"));
    }

    #[tokio::test]
    async fn test_timeline_rejected_by_key_keeps_the_match() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = StorageRotator::open(dir.path(), 100).unwrap();
        let source = FakeSource {
            seed_matches: vec!["NA1_1".to_string(), "NA1_2".to_string()],
            timeline_error: Some(ApiError::CredentialInvalid),
            ..FakeSource::default()
        };
        let mut spider = Spider::with_rng_seed(SpiderConfig { timeline_sampling_rate: 1.0, ..config() }, 7);

        let report = spider.run_pass(&source, &mut storage, &CancellationToken::new()).await.unwrap();

        assert!(report.credential_exhausted());
        assert_eq!(report.matches_recorded, 1);
        assert_eq!(report.records_written, 10);
        assert!(spider.frontier().has_seen_match("NA1_1"));
        assert!(!spider.frontier().has_seen_match("NA1_2"));
        assert_eq!(source.count("match:NA1_2"), 0);
    }

    #[tokio::test]
    async fn test_failed_timeline_still_records_match() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = StorageRotator::open(dir.path(), 100).unwrap();
        let source = FakeSource {
            seed_matches: vec!["NA1_1".to_string()],
            ..FakeSource::default()
        };
        let mut spider = Spider::with_rng_seed(
            SpiderConfig { timeline_sampling_rate: 1.0, max_players_per_pass: 1, ..config() },
            7,
        );

        let report = spider.run_pass(&source, &mut storage, &CancellationToken::new()).await.unwrap();

        assert_eq!(source.count("timeline:NA1_1"), 1);
        assert_eq!(report.timelines_sampled, 0);
        assert_eq!(report.matches_recorded, 1);

        let warm = storage.flush_and_rotate().unwrap().unwrap();
        let content = std::fs::read_to_string(warm).unwrap();
        assert!(content.lines().all(|l| l.contains("\"timeline_sampled\":false")));
    }

    #[tokio::test]
    async fn test_rank_gate_skips_low_players() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = StorageRotator::open(dir.path(), 100).unwrap();
        let mut ranks = HashMap::new();
        ranks.insert(
            "seed-puuid".to_string(),
            RankedEntry { tier: "PLATINUM".to_string(), division: "I".to_string() },
        );
        let source = FakeSource {
            seed_matches: vec!["NA1_1".to_string()],
            ranks,
            ..FakeSource::default()
        };
        let mut spider = Spider::with_rng_seed(
            SpiderConfig { rank_gate: Some(RankGate::new(Tier::Emerald)), ..config() },
            7,
        );

        let report = spider.run_pass(&source, &mut storage, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.players_gated, 1);
        assert_eq!(source.count("ids:seed-puuid"), 0);
    }

    #[tokio::test]
    async fn test_cancelled_pass_issues_no_requests() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = StorageRotator::open(dir.path(), 100).unwrap();
        let source = FakeSource::default();
        let mut spider = Spider::with_rng_seed(config(), 7);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = spider.run_pass(&source, &mut storage, &cancel).await.unwrap();

        assert!(report.cancelled());
        assert!(source.calls().is_empty());
    }
}
