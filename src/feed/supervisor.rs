//! Owns one tokio task per chain feed
//!
//! Each spawned task gets the next value of a supervisor-wide epoch counter
//! and stamps it on everything it sends. `next_epoch` is the fence the hub
//! uses on disconnect: anything stamped below it came from a stopped task.

use super::{ConnectionStatus, FeedEvent, FeedSink, FeedSource};
use crate::chains::ChainId;
use crate::error::FeedError;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct FeedTask {
    epoch: u64,
    handle: JoinHandle<()>,
}

pub struct FeedSupervisor {
    tx: mpsc::Sender<FeedEvent>,
    tasks: HashMap<ChainId, FeedTask>,
    next_epoch: u64,
}

impl FeedSupervisor {
    pub fn new(tx: mpsc::Sender<FeedEvent>) -> Self {
        Self {
            tx,
            tasks: HashMap::new(),
            next_epoch: 1,
        }
    }

    /// Start a feed; an existing feed for the same chain is replaced
    pub fn spawn(&mut self, mut source: Box<dyn FeedSource>) {
        let chain = source.chain();
        let kind = source.kind();
        if let Some(previous) = self.tasks.remove(&chain) {
            previous.handle.abort();
        }

        let epoch = self.next_epoch;
        self.next_epoch += 1;
        let sink = FeedSink::new(chain, self.tx.clone()).with_epoch(epoch);
        log::info!(
            "🚀 Starting {} feed for {} (epoch {})",
            kind.as_str(),
            chain,
            epoch
        );

        let handle = tokio::spawn(async move {
            match source.run(sink).await {
                Ok(()) => log::info!("✅ {} feed for {} completed", kind.as_str(), chain),
                Err(FeedError::ChannelClosed) => {
                    log::debug!("{} feed for {} stopped: channel closed", kind.as_str(), chain)
                }
                Err(e) => log::error!("❌ {} feed for {} failed: {}", kind.as_str(), chain, e),
            }
        });
        self.tasks.insert(chain, FeedTask { epoch, handle });
    }

    /// Stop a chain's feed. Safe to call repeatedly; returns whether a
    /// running feed was stopped.
    pub fn disconnect(&mut self, chain: ChainId) -> bool {
        let Some(task) = self.tasks.remove(&chain) else {
            return false;
        };
        task.handle.abort();
        log::info!("🔌 Disconnected {} feed", chain);

        // best effort; the hub is also fenced directly by the frame driver
        let _ = self.tx.try_send(FeedEvent::Status {
            chain,
            epoch: task.epoch,
            status: ConnectionStatus::Disconnected,
        });
        true
    }

    pub fn is_running(&self, chain: ChainId) -> bool {
        self.tasks
            .get(&chain)
            .map(|t| !t.handle.is_finished())
            .unwrap_or(false)
    }

    /// Epoch of the chain's running feed
    pub fn epoch(&self, chain: ChainId) -> Option<u64> {
        self.tasks.get(&chain).map(|t| t.epoch)
    }

    /// Epoch the next spawned feed will get; every existing task is below it
    pub fn next_epoch(&self) -> u64 {
        self.next_epoch
    }

    pub fn chains(&self) -> Vec<ChainId> {
        let mut chains: Vec<ChainId> = self.tasks.keys().copied().collect();
        chains.sort();
        chains
    }

    pub fn shutdown(&mut self) {
        for (chain, task) in self.tasks.drain() {
            task.handle.abort();
            log::debug!("Stopped {} feed", chain);
        }
    }
}

impl Drop for FeedSupervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::ChainProfile;
    use crate::feed::synthetic::{SyntheticConfig, SyntheticSource};

    fn synthetic(chain: ChainId) -> Box<dyn FeedSource> {
        Box::new(SyntheticSource::new(
            ChainProfile::defaults_for(chain),
            Vec::new(),
            SyntheticConfig {
                seed: Some(11),
                ..Default::default()
            },
        ))
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut supervisor = FeedSupervisor::new(tx);
        supervisor.spawn(synthetic(ChainId::Optimism));

        // wait until the feed is producing
        let first = rx.recv().await.unwrap();
        assert_eq!(first.chain(), ChainId::Optimism);
        assert!(supervisor.is_running(ChainId::Optimism));

        assert!(supervisor.disconnect(ChainId::Optimism));
        assert!(!supervisor.disconnect(ChainId::Optimism));
        assert!(!supervisor.is_running(ChainId::Optimism));
        assert!(supervisor.chains().is_empty());

        let mut disconnects = 0;
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.epoch(), 1);
            if matches!(
                event,
                FeedEvent::Status {
                    status: ConnectionStatus::Disconnected,
                    ..
                }
            ) {
                disconnects += 1;
            }
        }
        assert_eq!(disconnects, 1);
    }

    #[tokio::test]
    async fn test_spawn_replaces_existing_feed() {
        let (tx, _rx) = mpsc::channel(64);
        let mut supervisor = FeedSupervisor::new(tx);
        supervisor.spawn(synthetic(ChainId::Base));
        supervisor.spawn(synthetic(ChainId::Base));
        supervisor.spawn(synthetic(ChainId::Bsc));

        assert_eq!(supervisor.chains(), vec![ChainId::Base, ChainId::Bsc]);
        assert_eq!(supervisor.epoch(ChainId::Base), Some(2));
        assert_eq!(supervisor.epoch(ChainId::Bsc), Some(3));
        assert_eq!(supervisor.next_epoch(), 4);
        supervisor.shutdown();
        assert!(supervisor.chains().is_empty());
    }
}
