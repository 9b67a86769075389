//! Harvester - continuous ranked match collection
//!
//! Crawls the player graph, stores match records in the hot/warm/cold
//! tiers, folds them into win-rate tables, exports them, and mirrors each
//! cycle to the replica. Runs until CTRL+C or SIGTERM.
//!
//! Usage:
//!   cargo run --release --bin harvester
//!
//! Environment variables (see `HarvestConfig`):
//!   RIOT_API_KEY      - API key (required)
//!   SEED_PLAYERS      - Comma separated Name#TAG list (required)
//!   RIOT_REGION       - Regional routing host (default: americas)
//!   RIOT_PLATFORM     - Platform host (default: na1)
//!   DATA_DIR          - Storage tiers root (default: data)
//!   EXPORT_DIR        - Aggregate export directory (default: export)
//!   DISCORD_BOT_TOKEN / DISCORD_CHANNEL_ID - Key recovery channel (optional)
//!   REPLICA_DB_PATH   - SQLite replica (optional)
//!   RUST_LOG          - Logging level (default: info)

use dotenv::dotenv;
use log::{error, info, warn};
use riftstat::aggregator_core::ExportWriter;
use riftstat::api_core::{CredentialValidator, MatchSource, RiotClient};
use riftstat::config::HarvestConfig;
use riftstat::crawler_core::Spider;
use riftstat::key_core::{mask_key, CredentialHandle, DiscordChannel, KeyLifecycleManager, OperatorChannel};
use riftstat::pipeline::{spawn_signal_listener, Orchestrator};
use riftstat::storage_core::StorageRotator;
use riftstat::sync_core::{ReplicaStore, SqliteReplica, SyncHandle};
use std::env;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&rust_log))
        .target(env_logger::Target::Stderr)
        .init();

    let config = match HarvestConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Configuration error: {}", e);
            return Err(e.into());
        }
    };

    info!("🚀 Harvester starting");
    info!("   ├─ Region: {} / {}", config.region, config.platform);
    info!("   ├─ API key: {}", mask_key(&config.api_key));
    info!("   ├─ Seeds: {}", config.seeds.len());
    info!("   ├─ Queue: {} ({} matches per player)", config.queue_id, config.matches_per_player);
    info!("   ├─ Timeline sampling: {:.0}%", config.timeline_sampling_rate * 100.0);
    info!(
        "   ├─ Rank gate: {}",
        config.min_rank_tier.map_or("off".to_string(), |t| format!("{:?}+", t))
    );
    info!("   ├─ Data: {} (rotate every {} matches)", config.data_dir.display(), config.rotation_match_threshold);
    info!("   ├─ Export: {}", config.export_dir.display());
    info!(
        "   ├─ Replica: {}",
        config.replica_db_path.as_ref().map_or("off".to_string(), |p| p.display().to_string())
    );
    info!("   └─ Recovery channel: {}", if config.discord.is_some() { "discord" } else { "none" });

    let cancel = CancellationToken::new();
    let listener = spawn_signal_listener(cancel.clone());

    let credential = CredentialHandle::new(config.api_key.clone());
    let client = Arc::new(RiotClient::new(config.client_config(), credential.clone(), cancel.clone())?);

    let channel: Option<Arc<dyn OperatorChannel>> = match &config.discord {
        Some(discord) => {
            let discord = DiscordChannel::new(discord.bot_token.clone(), discord.channel_id.clone())?;
            Some(Arc::new(discord) as Arc<dyn OperatorChannel>)
        }
        None => {
            warn!("⚠️  No recovery channel configured: an expired key will pause the harvester until restart");
            None
        }
    };

    let validator: Arc<dyn CredentialValidator> = client.clone();
    let keys = KeyLifecycleManager::new(credential, validator, channel, config.key_config());

    let sync = match &config.replica_db_path {
        Some(path) => {
            let replica: Arc<dyn ReplicaStore> = Arc::new(SqliteReplica::open(path)?);
            SyncHandle::spawn(replica, config.sync_batch_size, config.sync_queue_capacity)
        }
        None => SyncHandle::disabled(),
    };

    let storage = StorageRotator::open(&config.data_dir, config.rotation_match_threshold)?;
    let export = ExportWriter::new(&config.export_dir)?;
    let spider = Spider::new(config.spider_config());
    let source: Arc<dyn MatchSource> = client;

    let orchestrator = Orchestrator::new(source, spider, storage, export, keys, sync, config.cycle_pause)?;

    let summary = format!(
        "Region: {} / {}\nSeeds: {}\nKey: {}",
        config.region,
        config.platform,
        config.seeds.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", "),
        mask_key(&config.api_key)
    );

    info!("🔄 Press CTRL+C to shutdown gracefully");
    let result = orchestrator.run(cancel.clone(), summary).await;

    cancel.cancel();
    let _ = listener.await;

    match result {
        Ok(summary) => {
            info!(
                "📊 Run summary: {} cycles, {} matches, {} syncs pushed",
                summary.cycles, summary.matches_collected, summary.sync.snapshots_pushed
            );
            Ok(())
        }
        Err(e) => {
            error!("❌ Harvester stopped on error: {}", e);
            Err(e.into())
        }
    }
}
