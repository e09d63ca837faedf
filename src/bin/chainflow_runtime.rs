//! Chainflow Runtime - feeds, ingestion and particle simulation
//!
//! This binary wires the whole pipeline together:
//! - One feed task per chain (replay capture if configured, synthetic otherwise)
//! - Background USD price refresh for the whale floor
//! - Fixed-rate tick loop: ingest → fair drain → spawn → update → buffers
//!
//! Usage:
//!   cargo run --release --bin chainflow_runtime
//!
//! Environment variables:
//!   CHAINFLOW_CHAINS - Comma-separated chains (default: all)
//!   CHAINFLOW_REPLAY_PATH - JSONL capture to replay (default: synthetic traffic)
//!   CHAINFLOW_PROFILE_PATH - JSON profile overrides
//!   CHAINFLOW_TICK_HZ - Simulation rate (default: 60)
//!   CHAINFLOW_WHALE_USD_FLOOR - Minimum whale size in USD

use chainflow::classifier::price::price_refresh_task;
use chainflow::classifier::{ActivityEstimator, Classifier, ClassifierConfig, HttpPriceFetcher, PriceCache};
use chainflow::feed::{
    load_replay, FeedEvent, FeedSource, FeedSupervisor, ReplaySource, SyntheticConfig,
    SyntheticSource,
};
use chainflow::runtime::{FrameDriver, IngestionHub};
use chainflow::{FairQueue, RuntimeConfig};
use dotenv::dotenv;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize environment and logging
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    info!("🚀 Chainflow Runtime");
    info!("   └─ Version: {}", env!("CARGO_PKG_VERSION"));

    let config = RuntimeConfig::from_env()?;
    let profile = config.load_profile()?;

    info!("✅ Configuration loaded");
    info!(
        "   ├─ Chains: {}",
        config
            .chains
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    info!("   ├─ Pool capacity: {}", config.pool_capacity);
    info!("   ├─ Tick rate: {} Hz (max {} spawns/tick)", config.tick_hz, config.max_spawns_per_tick);
    info!("   ├─ Channel buffer: {} events", config.channel_buffer);
    match config.whale_usd_floor {
        Some(floor) => info!("   └─ Whale USD floor: ${:.0}", floor),
        None => info!("   └─ Whale USD floor: none"),
    }

    // Classifier with profile overrides
    let profiles = profile.chain_profiles(&config.chains);
    let tokens = profile.token_registry();
    let prices = Arc::new(PriceCache::default());
    let classifier = Classifier::new(
        profiles.clone(),
        tokens.clone(),
        prices.clone(),
        ClassifierConfig {
            usd_floor: config.whale_usd_floor,
            ..Default::default()
        },
    );

    // Price refresh only matters when a USD floor is set
    let price_task = if config.whale_usd_floor.is_some() && config.price_interval_ms > 0 {
        let fetcher = Arc::new(HttpPriceFetcher::new(&config.price_url)?);
        Some(tokio::spawn(price_refresh_task(
            prices.clone(),
            fetcher,
            classifier.price_ids(),
            config.price_interval_ms,
        )))
    } else {
        None
    };

    // Feeds
    let (tx, rx) = mpsc::channel::<FeedEvent>(config.channel_buffer);
    let mut supervisor = FeedSupervisor::new(tx.clone());

    let replay = match &config.replay_path {
        Some(path) => Some(load_replay(path)?),
        None => None,
    };

    for chain in &config.chains {
        let chain_profile = profiles
            .get(chain)
            .cloned()
            .unwrap_or_else(|| chainflow::ChainProfile::defaults_for(*chain));

        let source: Box<dyn FeedSource> = match &replay {
            Some(events) => Box::new(
                ReplaySource::new(*chain, events, chain_profile.block_time_ms).with_repeat(true),
            ),
            None => Box::new(SyntheticSource::new(
                chain_profile,
                tokens.tokens_for(*chain).into_iter().cloned().collect(),
                SyntheticConfig {
                    seed: config.seed,
                    ..Default::default()
                },
            )),
        };
        supervisor.spawn(source);
    }
    info!("✅ {} feeds spawned", supervisor.chains().len());

    // Tick-side state
    let hub = IngestionHub::new(classifier, ActivityEstimator::default(), FairQueue::new());
    let mut driver = FrameDriver::new(
        hub,
        rx,
        profile.lifecycle(&config),
        config.max_spawns_per_tick,
        config.seed,
    );

    let mut ticker = interval(config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stats_timer = interval(std::time::Duration::from_millis(config.stats_interval_ms.max(1)));
    let mut last_tick = Instant::now();
    let mut frames = 0u64;
    let mut spawned = 0u64;
    let mut overall_activity = 1.0;
    let mut last_stats = Instant::now();

    info!("🔄 Press CTRL+C to shutdown gracefully");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                let dt = now.duration_since(last_tick).as_secs_f32();
                last_tick = now;

                let stats = driver.tick(dt);
                frames += 1;
                spawned += stats.spawned as u64;
                overall_activity = stats.overall_activity;
            }

            _ = stats_timer.tick() => {
                let elapsed = last_stats.elapsed().as_secs_f64().max(f64::EPSILON);
                let frame = driver.pool();
                let hub = driver.hub();
                info!(
                    "📊 {:.1} fps | {} active ({} whales) | {:.1} spawns/s | queue {} | dropped {} | classified {} rejected {} | activity {:.2}",
                    frames as f64 / elapsed,
                    frame.active_count(),
                    frame.whale_count(),
                    spawned as f64 / elapsed,
                    hub.queue().size(),
                    hub.queue().dropped(),
                    hub.stats().classified,
                    hub.stats().rejected,
                    overall_activity,
                );
                for chain in &config.chains {
                    info!(
                        "   ├─ {}: {} | activity {:.2}",
                        chain,
                        hub.status(*chain),
                        hub.activity().level(*chain)
                    );
                }
                if let Some(latest) = hub.whales().recent(1).next() {
                    info!("   └─ 🐋 Latest whale: {:.2} {} on {} ({})", latest.value, latest.symbol, latest.chain, latest.hash);
                }
                frames = 0;
                spawned = 0;
                last_stats = Instant::now();
            }

            result = &mut shutdown => {
                match result {
                    Ok(()) => {
                        info!("");
                        info!("⚠️  Received CTRL+C, shutting down...");
                    }
                    Err(err) => {
                        error!("❌ Failed to listen for CTRL+C: {}", err);
                    }
                }
                break;
            }
        }
    }

    // Cleanup: stop feeds, then close the channel
    for chain in config.chains.clone() {
        driver.disconnect(&mut supervisor, chain);
    }
    supervisor.shutdown();
    if let Some(task) = price_task {
        task.abort();
    }
    drop(tx);

    let remaining = driver.hub().queue().size();
    if remaining > 0 {
        warn!("⚠️  {} queued transactions discarded at shutdown", remaining);
    }
    info!("✅ Chainflow runtime stopped");
    Ok(())
}
