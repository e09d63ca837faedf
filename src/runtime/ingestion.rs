//! Ingestion hub - the single append path from feeds into the queue
//!
//! Every feed task sends `FeedEvent`s into one mpsc channel. The hub drains
//! that channel from the tick with `try_recv` (never blocking) and, per batch:
//! 1. Classifies each raw event (malformed ones are dropped)
//! 2. Records the batch size in the activity estimator
//! 3. Copies whales into the whale history
//! 4. Pushes the classified batch into the fair queue
//!
//! Status events only update the per-chain connection map. Disconnecting a
//! chain raises its epoch fence: anything stamped with an older epoch, batch
//! or status, is dropped on arrival. Events an aborted task left in the
//! channel therefore never reach the classifier, and a replacement feed
//! (spawned with a newer epoch) is accepted without further bookkeeping.
//!
//! `pump` handles at most `max_events_per_pump` events per call so a flooded
//! channel cannot stretch a single tick; the rest wait for the next one.

use super::whale_history::WhaleHistory;
use crate::chains::ChainId;
use crate::classifier::{ActivityEstimator, Classifier};
use crate::feed::{ConnectionStatus, FeedEvent};
use crate::queue::FairQueue;
use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::TryRecvError};

pub const DEFAULT_MAX_EVENTS_PER_PUMP: usize = 256;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestStats {
    pub batches: u64,
    pub received: u64,
    pub classified: u64,
    pub rejected: u64,
    pub whales: u64,
    /// Batches discarded because they predate their chain's epoch fence
    pub discarded: u64,
}

pub struct IngestionHub {
    classifier: Classifier,
    activity: ActivityEstimator,
    queue: FairQueue,
    whales: WhaleHistory,
    statuses: HashMap<ChainId, ConnectionStatus>,
    /// Lowest feed epoch still accepted per chain
    fences: HashMap<ChainId, u64>,
    stats: IngestStats,
    max_events_per_pump: usize,

    /// Timestamp function in unix ms (mockable for tests)
    now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl IngestionHub {
    pub fn new(classifier: Classifier, activity: ActivityEstimator, queue: FairQueue) -> Self {
        Self::new_with_timestamp_fn(
            classifier,
            activity,
            queue,
            Box::new(|| chrono::Utc::now().timestamp_millis()),
        )
    }

    pub fn new_with_timestamp_fn(
        classifier: Classifier,
        activity: ActivityEstimator,
        queue: FairQueue,
        now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
    ) -> Self {
        Self {
            classifier,
            activity,
            queue,
            whales: WhaleHistory::default(),
            statuses: HashMap::new(),
            fences: HashMap::new(),
            stats: IngestStats::default(),
            max_events_per_pump: DEFAULT_MAX_EVENTS_PER_PUMP,
            now_fn,
        }
    }

    pub fn with_max_events_per_pump(mut self, max: usize) -> Self {
        self.max_events_per_pump = max.max(1);
        self
    }

    /// Apply what is waiting in the channel, up to the per-pump cap; returns
    /// the number of events handled
    pub fn pump(&mut self, rx: &mut mpsc::Receiver<FeedEvent>) -> usize {
        let mut handled = 0;
        while handled < self.max_events_per_pump {
            match rx.try_recv() {
                Ok(event) => {
                    self.handle(event);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::debug!("Feed channel closed");
                    break;
                }
            }
        }
        handled
    }

    pub fn handle(&mut self, event: FeedEvent) {
        let (chain, epoch) = (event.chain(), event.epoch());
        if epoch < self.fence(chain) {
            log::trace!("Dropping stale {} event from epoch {}", chain, epoch);
            if matches!(event, FeedEvent::Batch { .. }) {
                self.stats.discarded += 1;
            }
            return;
        }

        match event {
            FeedEvent::Status { status, .. } => {
                if status == ConnectionStatus::Disconnected {
                    self.raise_fence(chain, epoch + 1);
                }
                self.set_status(chain, status);
            }
            FeedEvent::Batch { events, .. } => {
                if events.is_empty() {
                    return;
                }

                let now = (self.now_fn)();
                let classified = self.classifier.classify_batch(&events);

                self.stats.batches += 1;
                self.stats.received += events.len() as u64;
                self.stats.classified += classified.len() as u64;
                self.stats.rejected += (events.len() - classified.len()) as u64;

                self.activity
                    .record_at(chain, classified.len() as u32, now);

                for tx in classified.iter().filter(|tx| tx.is_whale) {
                    self.whales.record(tx);
                    self.stats.whales += 1;
                }

                self.queue.push(classified);
            }
        }
    }

    /// Mark a chain disconnected and drop everything stamped below `fence`.
    /// Repeat calls change nothing further; the fence never moves back.
    pub fn disconnect(&mut self, chain: ChainId, fence: u64) {
        self.raise_fence(chain, fence);
        self.set_status(chain, ConnectionStatus::Disconnected);
    }

    /// Lowest epoch currently accepted for `chain`
    pub fn fence(&self, chain: ChainId) -> u64 {
        self.fences.get(&chain).copied().unwrap_or(0)
    }

    fn raise_fence(&mut self, chain: ChainId, fence: u64) {
        let current = self.fences.entry(chain).or_insert(0);
        *current = (*current).max(fence);
    }

    fn set_status(&mut self, chain: ChainId, status: ConnectionStatus) {
        let previous = self.statuses.insert(chain, status.clone());
        if previous.as_ref() != Some(&status) {
            log::info!("📡 {} → {}", chain, status);
        }
    }

    /// Connection status of a chain; chains never heard from are `Connecting`
    pub fn status(&self, chain: ChainId) -> ConnectionStatus {
        self.statuses
            .get(&chain)
            .cloned()
            .unwrap_or(ConnectionStatus::Connecting)
    }

    pub fn statuses(&self) -> &HashMap<ChainId, ConnectionStatus> {
        &self.statuses
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn classifier_mut(&mut self) -> &mut Classifier {
        &mut self.classifier
    }

    pub fn activity(&self) -> &ActivityEstimator {
        &self.activity
    }

    pub fn activity_mut(&mut self) -> &mut ActivityEstimator {
        &mut self.activity
    }

    pub fn queue(&self) -> &FairQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut FairQueue {
        &mut self.queue
    }

    pub fn whales(&self) -> &WhaleHistory {
        &self.whales
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }
}
