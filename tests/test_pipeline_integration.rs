//! End-to-end pipeline tests
//!
//! Feeds run as real tokio tasks and deliver through the shared channel; the
//! frame driver ticks on the test task, exactly as the runtime binary does.
//!
//! Key integration points tested:
//! - Replay capture → classifier → fair queue → particle pool
//! - Multiple feeds sharing a single channel
//! - Round-robin spawning across chains with uneven backlogs
//! - Disconnect leaves detector and activity state untouched
//! - Events a stopped feed left in the channel never reach the pool

#[cfg(test)]
mod pipeline_integration_tests {
    use chainflow::classifier::{ActivityEstimator, Classifier};
    use chainflow::engine::LifecycleConfig;
    use chainflow::feed::{
        load_replay, FeedEvent, FeedSupervisor, ReplaySource, SyntheticConfig, SyntheticSource,
    };
    use chainflow::runtime::{FrameDriver, IngestionHub};
    use chainflow::{ChainId, ChainProfile, ConnectionStatus, FairQueue, RawTransactionEvent};
    use std::io::Write;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const ETH: u128 = 1_000_000_000_000_000_000;

    fn raw(chain: ChainId, value: u128, block: u64, n: u32) -> RawTransactionEvent {
        RawTransactionEvent {
            hash: format!("0x{}{:04}{:04}", chain, block, n),
            from: "0x00000000000000000000000000000000000000aa".to_string(),
            to: Some("0x00000000000000000000000000000000000000bb".to_string()),
            value,
            gas_price: 30_000_000_000,
            gas_limit: 21_000,
            block_number: block,
            chain,
            timestamp: 1_700_000_000_000,
            token: None,
        }
    }

    fn driver(capacity: usize, max_spawns: usize) -> (FrameDriver, mpsc::Sender<FeedEvent>) {
        let (tx, rx) = mpsc::channel(256);
        let hub = IngestionHub::new(
            Classifier::with_defaults(),
            ActivityEstimator::default(),
            FairQueue::new(),
        );
        let lifecycle = LifecycleConfig {
            capacity,
            ..Default::default()
        };
        (FrameDriver::new(hub, rx, lifecycle, max_spawns, Some(99)), tx)
    }

    /// Tick until `done` holds or two seconds pass
    async fn tick_until<F>(driver: &mut FrameDriver, mut done: F)
    where
        F: FnMut(&FrameDriver) -> bool,
    {
        for _ in 0..200 {
            driver.tick(1.0 / 60.0);
            if done(driver) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within timeout");
    }

    #[tokio::test]
    async fn test_replay_capture_reaches_particle_pool() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut expected = 0;
        for block in 1..=3u64 {
            for n in 0..4 {
                let value = if block == 2 && n == 0 { 5_000 * ETH } else { ETH / 10 };
                let event = raw(ChainId::Ethereum, value, block, n);
                writeln!(file, "{}", serde_json::to_string(&event).unwrap()).unwrap();
                expected += 1;
            }
        }
        let events = load_replay(file.path()).unwrap();
        assert_eq!(events.len(), expected);

        let (mut driver, tx) = driver(64, 32);
        let mut supervisor = FeedSupervisor::new(tx);
        supervisor.spawn(Box::new(
            ReplaySource::new(ChainId::Ethereum, &events, 12_000).with_speed(0.0),
        ));

        tick_until(&mut driver, |d| d.hub().stats().received == expected as u64).await;
        driver.tick(1.0 / 60.0);

        let hub = driver.hub();
        assert_eq!(hub.stats().classified, expected as u64);
        assert_eq!(hub.stats().whales, 1);
        assert_eq!(hub.whales().len(), 1);
        assert_eq!(driver.pool().active_count(), expected);
        assert_eq!(driver.pool().whale_count(), 1);

        let frame = driver.frame_buffers();
        assert_eq!(frame.active, expected);
        assert_eq!(frame.whale_flags[..frame.active].iter().filter(|f| **f == 1).count(), 1);
        assert_eq!(driver.trail_buffers().active, expected);
    }

    #[tokio::test]
    async fn test_uneven_backlogs_spawn_round_robin() {
        let (mut driver, tx) = driver(256, 6);

        tx.send(FeedEvent::Batch {
            chain: ChainId::Polygon,
            epoch: 1,
            events: (0..70).map(|n| raw(ChainId::Polygon, ETH, 1, n)).collect(),
        })
        .await
        .unwrap();
        tx.send(FeedEvent::Batch {
            chain: ChainId::Base,
            epoch: 1,
            events: (0..5).map(|n| raw(ChainId::Base, ETH / 100, 1, n)).collect(),
        })
        .await
        .unwrap();
        tx.send(FeedEvent::Batch {
            chain: ChainId::Arbitrum,
            epoch: 1,
            events: (0..20).map(|n| raw(ChainId::Arbitrum, ETH / 100, 1, n)).collect(),
        })
        .await
        .unwrap();

        let stats = driver.tick(1.0 / 60.0);
        assert_eq!(stats.spawned, 6);

        // Polygon's 70-item backlog was trimmed to 30; the others kept everything
        let queue = driver.hub().queue();
        assert_eq!(queue.len_for(ChainId::Polygon), 30 - 2);
        assert_eq!(queue.len_for(ChainId::Base), 5 - 2);
        assert_eq!(queue.len_for(ChainId::Arbitrum), 20 - 2);

        let frame = driver.frame_buffers();
        let mut per_chain = std::collections::HashMap::new();
        for i in 0..frame.active {
            let slot = frame.slot_of(i).unwrap();
            let chain = driver.pool().particle(slot).unwrap().chain;
            *per_chain.entry(chain).or_insert(0) += 1;
        }
        assert_eq!(per_chain.get(&ChainId::Polygon), Some(&2));
        assert_eq!(per_chain.get(&ChainId::Base), Some(&2));
        assert_eq!(per_chain.get(&ChainId::Arbitrum), Some(&2));
    }

    #[tokio::test]
    async fn test_multiple_synthetic_feeds_single_channel() {
        let (mut driver, tx) = driver(512, 64);
        let mut supervisor = FeedSupervisor::new(tx);

        for chain in [ChainId::Arbitrum, ChainId::Base] {
            supervisor.spawn(Box::new(SyntheticSource::new(
                ChainProfile::defaults_for(chain),
                Vec::new(),
                SyntheticConfig {
                    seed: Some(17),
                    ..Default::default()
                },
            )));
        }

        tick_until(&mut driver, |d| {
            let hub = d.hub();
            hub.activity().baseline(ChainId::Arbitrum).is_some()
                && hub.activity().baseline(ChainId::Base).is_some()
        })
        .await;

        assert!(driver.pool().active_count() > 0);
        supervisor.shutdown();
    }

    #[tokio::test]
    async fn test_disconnect_twice_keeps_state() {
        let (mut driver, tx) = driver(64, 16);
        let mut supervisor = FeedSupervisor::new(tx);
        supervisor.spawn(Box::new(SyntheticSource::new(
            ChainProfile::defaults_for(ChainId::Optimism),
            Vec::new(),
            SyntheticConfig {
                seed: Some(23),
                ..Default::default()
            },
        )));

        tick_until(&mut driver, |d| d.hub().stats().batches > 0).await;

        driver.disconnect(&mut supervisor, ChainId::Optimism);
        driver.tick(1.0 / 60.0);
        let detector = driver.hub().classifier().detector().clone();
        let baseline = driver.hub().activity().baseline(ChainId::Optimism);
        let level = driver.hub().activity().level(ChainId::Optimism);

        driver.disconnect(&mut supervisor, ChainId::Optimism);
        driver.tick(1.0 / 60.0);
        assert_eq!(driver.hub().classifier().detector(), &detector);
        assert_eq!(driver.hub().activity().baseline(ChainId::Optimism), baseline);
        assert_eq!(driver.hub().activity().level(ChainId::Optimism), level);
        assert!(!supervisor.is_running(ChainId::Optimism));
    }

    #[tokio::test]
    async fn test_disconnect_with_unpumped_feed_events() {
        let (mut driver, tx) = driver(64, 32);
        let mut supervisor = FeedSupervisor::new(tx);
        supervisor.spawn(Box::new(SyntheticSource::new(
            ChainProfile::defaults_for(ChainId::Optimism),
            Vec::new(),
            SyntheticConfig {
                seed: Some(31),
                ..Default::default()
            },
        )));

        // let the feed fill the channel without ticking
        tokio::time::sleep(Duration::from_millis(50)).await;

        driver.disconnect(&mut supervisor, ChainId::Optimism);
        let stats = driver.tick(1.0 / 60.0);

        assert!(stats.pumped >= 2);
        assert_eq!(stats.spawned, 0);
        assert_eq!(stats.active, 0);
        assert_eq!(driver.hub().stats().classified, 0);
        assert!(driver.hub().stats().discarded >= 1);
        assert!(driver.hub().activity().baseline(ChainId::Optimism).is_none());
        assert_eq!(driver.hub().status(ChainId::Optimism), ConnectionStatus::Disconnected);
    }
}
