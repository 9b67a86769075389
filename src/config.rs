use crate::api_core::ClientConfig;
use crate::crawler_core::{RankGate, SeedPlayer, SpiderConfig, Tier};
use crate::key_core::{KeyEnvelope, KeyLifecycleConfig};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct DiscordSettings {
    pub bot_token: String,
    pub channel_id: String,
}

/// Everything the harvester reads from the environment
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub api_key: String,
    pub region: String,
    pub platform: String,
    pub seeds: Vec<SeedPlayer>,
    pub queue_id: u32,
    pub matches_per_player: u32,
    pub max_players_per_pass: usize,
    pub crawl_workers: usize,
    pub timeline_sampling_rate: f64,
    pub min_rank_tier: Option<Tier>,

    pub request_interval: Duration,
    pub rate_limit_default_wait: Duration,
    pub request_timeout: Duration,

    pub data_dir: PathBuf,
    pub rotation_match_threshold: u32,
    pub export_dir: PathBuf,
    pub filter_expected_items: usize,
    pub filter_false_positive_rate: f64,

    pub discord: Option<DiscordSettings>,
    pub key_poll_interval: Duration,
    pub key_prefix: String,
    pub key_length: usize,

    pub replica_db_path: Option<PathBuf>,
    pub sync_batch_size: usize,
    pub sync_queue_capacity: usize,
    pub cycle_pause: Duration,
}

/// Parse an optional numeric variable, falling back to `default` with a
/// warning when it is present but malformed.
fn parse_or<T, F>(lookup: &F, name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            log::warn!("Invalid {} '{}', defaulting to {}", name, raw, default);
            default
        }),
        None => default,
    }
}

fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl HarvestConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = non_empty(&lookup, "RIOT_API_KEY")
            .ok_or_else(|| ConfigError::MissingVariable("RIOT_API_KEY".to_string()))?;

        let seeds_raw = non_empty(&lookup, "SEED_PLAYERS")
            .ok_or_else(|| ConfigError::MissingVariable("SEED_PLAYERS".to_string()))?;
        let mut seeds = Vec::new();
        for entry in seeds_raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let seed = SeedPlayer::parse(entry).ok_or_else(|| {
                ConfigError::InvalidValue(format!("SEED_PLAYERS entry '{}' must look like Name#TAG", entry))
            })?;
            seeds.push(seed);
        }
        if seeds.is_empty() {
            return Err(ConfigError::InvalidValue("SEED_PLAYERS is empty".to_string()));
        }

        let min_rank_tier = match non_empty(&lookup, "MIN_RANK_TIER") {
            Some(raw) => Some(Tier::parse(&raw).ok_or_else(|| {
                ConfigError::InvalidValue(format!("MIN_RANK_TIER '{}' is not a tier (IRON..CHALLENGER)", raw))
            })?),
            None => None,
        };

        let timeline_sampling_rate = parse_or(&lookup, "TIMELINE_SAMPLING_RATE", 0.25_f64);
        if !(0.0..=1.0).contains(&timeline_sampling_rate) {
            return Err(ConfigError::InvalidValue(format!(
                "TIMELINE_SAMPLING_RATE must be within 0..=1, got {}",
                timeline_sampling_rate
            )));
        }

        let filter_false_positive_rate = parse_or(&lookup, "FILTER_FALSE_POSITIVE_RATE", 0.001_f64);
        if !(filter_false_positive_rate > 0.0 && filter_false_positive_rate < 1.0) {
            return Err(ConfigError::InvalidValue(format!(
                "FILTER_FALSE_POSITIVE_RATE must be within (0, 1), got {}",
                filter_false_positive_rate
            )));
        }

        let discord = match (non_empty(&lookup, "DISCORD_BOT_TOKEN"), non_empty(&lookup, "DISCORD_CHANNEL_ID")) {
            (Some(bot_token), Some(channel_id)) => Some(DiscordSettings { bot_token, channel_id }),
            (None, None) => None,
            _ => {
                log::warn!("DISCORD_BOT_TOKEN and DISCORD_CHANNEL_ID must both be set; key recovery channel disabled");
                None
            }
        };

        Ok(Self {
            api_key,
            region: non_empty(&lookup, "RIOT_REGION").unwrap_or_else(|| "americas".to_string()),
            platform: non_empty(&lookup, "RIOT_PLATFORM").unwrap_or_else(|| "na1".to_string()),
            seeds,
            queue_id: parse_or(&lookup, "RANKED_QUEUE_ID", 420),
            matches_per_player: parse_or(&lookup, "MATCHES_PER_PLAYER", 20),
            max_players_per_pass: parse_or(&lookup, "MAX_PLAYERS_PER_PASS", 200),
            crawl_workers: parse_or(&lookup, "CRAWL_WORKERS", 1),
            timeline_sampling_rate,
            min_rank_tier,

            request_interval: Duration::from_millis(parse_or(&lookup, "REQUEST_INTERVAL_MS", 1200)),
            rate_limit_default_wait: Duration::from_secs(parse_or(&lookup, "RATE_LIMIT_DEFAULT_WAIT_SECS", 10)),
            request_timeout: Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 10)),

            data_dir: PathBuf::from(non_empty(&lookup, "DATA_DIR").unwrap_or_else(|| "data".to_string())),
            rotation_match_threshold: parse_or(&lookup, "ROTATION_MATCH_THRESHOLD", 100),
            export_dir: PathBuf::from(non_empty(&lookup, "EXPORT_DIR").unwrap_or_else(|| "export".to_string())),
            filter_expected_items: parse_or(&lookup, "FILTER_EXPECTED_ITEMS", 1_000_000),
            filter_false_positive_rate,

            discord,
            key_poll_interval: Duration::from_secs(parse_or(&lookup, "KEY_POLL_INTERVAL_SECS", 30)),
            key_prefix: non_empty(&lookup, "KEY_PREFIX").unwrap_or_else(|| "RGAPI-".to_string()),
            key_length: parse_or(&lookup, "KEY_LENGTH", 42),

            replica_db_path: non_empty(&lookup, "REPLICA_DB_PATH").map(PathBuf::from),
            sync_batch_size: parse_or(&lookup, "SYNC_BATCH_SIZE", 500),
            sync_queue_capacity: parse_or(&lookup, "SYNC_QUEUE_CAPACITY", 4),
            cycle_pause: Duration::from_secs(parse_or(&lookup, "CYCLE_PAUSE_SECS", 0)),
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            request_interval: self.request_interval,
            default_retry_wait: self.rate_limit_default_wait,
            request_timeout: self.request_timeout,
            ..ClientConfig::for_region(&self.region, &self.platform)
        }
    }

    pub fn spider_config(&self) -> SpiderConfig {
        SpiderConfig {
            seeds: self.seeds.clone(),
            matches_per_player: self.matches_per_player,
            max_players_per_pass: self.max_players_per_pass,
            worker_count: self.crawl_workers,
            timeline_sampling_rate: self.timeline_sampling_rate,
            queue_id: self.queue_id,
            rank_gate: self.min_rank_tier.map(RankGate::new),
            filter_expected_items: self.filter_expected_items,
            filter_false_positive_rate: self.filter_false_positive_rate,
        }
    }

    pub fn key_config(&self) -> KeyLifecycleConfig {
        KeyLifecycleConfig {
            poll_interval: self.key_poll_interval,
            envelope: KeyEnvelope::new(self.key_prefix.clone(), self.key_length),
        }
    }
}
