//! Restore - decompress cold archives back into the warm tier
//!
//! Restored files are picked up by the next harvester cycle and folded into
//! the totals again, so restore only what needs reprocessing.
//!
//! Usage:
//!   cargo run --release --bin restore -- [--patch 15.24] [--file data/cold/matches_00000003.jsonl.gz]
//!
//! Without `--file`, every cold file is restored. With `--patch`, only lines
//! whose normalized patch matches are kept.
//!
//! Environment variables:
//!   DATA_DIR - Storage tiers root (default: data)
//!   RUST_LOG - Logging level (default: info)

use dotenv::dotenv;
use log::{error, info};
use riftstat::storage_core::{restore_cold_to_warm, StorageLayout, StorageTier};
use std::env;
use std::path::PathBuf;

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|idx| args.get(idx + 1))
        .cloned()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&rust_log))
        .target(env_logger::Target::Stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let patch = arg_value(&args, "--patch");
    let file = arg_value(&args, "--file").map(PathBuf::from);

    let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let layout = StorageLayout::new(&data_dir);
    layout.ensure()?;

    let targets: Vec<PathBuf> = match file {
        Some(path) => vec![path],
        None => layout
            .list(StorageTier::Cold)?
            .into_iter()
            .map(|f| f.path)
            .collect(),
    };

    info!("♻️  Restoring {} cold files", targets.len());
    info!("   ├─ Data: {}", data_dir);
    info!("   └─ Patch filter: {}", patch.as_deref().unwrap_or("none"));

    let warm_dir = layout.tier_dir(StorageTier::Warm);
    let mut written = 0u64;
    let mut failed = 0usize;

    for path in &targets {
        match restore_cold_to_warm(path, &warm_dir, patch.as_deref()) {
            Ok(report) => written += report.lines_written,
            Err(e) => {
                error!("❌ Failed to restore {}: {}", path.display(), e);
                failed += 1;
            }
        }
    }

    info!("✅ Restore complete: {} lines written to {}", written, warm_dir.display());
    if failed > 0 {
        return Err(format!("{} files failed to restore", failed).into());
    }
    Ok(())
}
