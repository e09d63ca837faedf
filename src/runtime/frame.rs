//! One simulation frame
//!
//! `FrameDriver::tick` runs the whole cooperative step in order:
//! 1. Pump the feed channel into the ingestion hub
//! 2. Retry transactions deferred by earlier ticks, then drain up to
//!    `max_spawns_per_tick` fresh ones from the queue
//! 3. Spawn a particle per transaction
//! 4. Advance the pool by `dt`
//! 5. Rewrite the frame and trail buffers
//!
//! Retries never eat into the drain budget. A deferred non-whale waits for a
//! free slot, while a whale behind it in the queue can still displace an
//! older whale on the same tick.
//!
//! Nothing in a tick awaits, so it can be driven from any timer.

use super::ingestion::IngestionHub;
use crate::chains::ChainId;
use crate::engine::{FrameBuffers, LifecycleConfig, ParticlePool, SpawnPlanner, TrailBuffers};
use crate::feed::{FeedEvent, FeedSupervisor};
use crate::types::ClassifiedTransaction;
use std::collections::VecDeque;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    /// Feed events applied this tick
    pub pumped: usize,
    pub spawned: usize,
    /// Transactions waiting for a free slot after this tick
    pub deferred: usize,
    pub active: usize,
    pub whales: usize,
    pub trails: usize,
    pub queue_depth: usize,
    /// Cross-chain activity level, smoothed once per tick
    pub overall_activity: f64,
}

pub struct FrameDriver {
    hub: IngestionHub,
    rx: mpsc::Receiver<FeedEvent>,
    pool: ParticlePool,
    planner: SpawnPlanner,
    frame: FrameBuffers,
    trails: TrailBuffers,
    deferred: VecDeque<ClassifiedTransaction>,
    max_spawns_per_tick: usize,
    frame_count: u64,
}

impl FrameDriver {
    pub fn new(
        hub: IngestionHub,
        rx: mpsc::Receiver<FeedEvent>,
        lifecycle: LifecycleConfig,
        max_spawns_per_tick: usize,
        seed: Option<u64>,
    ) -> Self {
        let pool = ParticlePool::new(lifecycle);
        let frame = pool.frame_buffers();
        let trails = pool.trail_buffers();
        Self {
            hub,
            rx,
            pool,
            planner: SpawnPlanner::new(seed),
            frame,
            trails,
            deferred: VecDeque::new(),
            max_spawns_per_tick: max_spawns_per_tick.max(1),
            frame_count: 0,
        }
    }

    pub fn tick(&mut self, dt: f32) -> FrameStats {
        self.frame_count += 1;
        let pumped = self.hub.pump(&mut self.rx);

        let mut batch: Vec<ClassifiedTransaction> = self.deferred.drain(..).collect();
        batch.extend(self.hub.queue_mut().drain(self.max_spawns_per_tick));

        let overall_activity = self.hub.activity_mut().overall_level();
        let mut spawned = 0;
        for tx in batch {
            let profile = self.hub.classifier().profile(tx.chain);
            let level = self.hub.activity().level(tx.chain);
            let params = self.planner.plan(&tx, &profile, level, self.pool.config());

            match self.pool.spawn(params) {
                Some(_) => spawned += 1,
                None => self.defer(tx),
            }
        }

        self.pool.update(dt);
        let active = self.pool.write_buffers(&mut self.frame);
        let trails = self.pool.write_trail_buffers(&mut self.trails);

        FrameStats {
            frame: self.frame_count,
            pumped,
            spawned,
            deferred: self.deferred.len(),
            active,
            whales: self.pool.whale_count(),
            trails,
            queue_depth: self.hub.queue().size(),
            overall_activity,
        }
    }

    /// Hold a transaction that found no slot; only one tick's budget is kept
    fn defer(&mut self, tx: ClassifiedTransaction) {
        if self.deferred.len() >= self.max_spawns_per_tick {
            self.deferred.pop_front();
        }
        self.deferred.push_back(tx);
    }

    /// Stop a chain's feed and fence off everything it already sent; safe to
    /// repeat
    pub fn disconnect(&mut self, supervisor: &mut FeedSupervisor, chain: ChainId) {
        supervisor.disconnect(chain);
        self.hub.disconnect(chain, supervisor.next_epoch());
    }

    /// New lifecycle tuning, applied from the next tick
    pub fn set_lifecycle(&mut self, config: LifecycleConfig) {
        self.pool.set_config(config);
    }

    pub fn hub(&self) -> &IngestionHub {
        &self.hub
    }

    pub fn hub_mut(&mut self) -> &mut IngestionHub {
        &mut self.hub
    }

    pub fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    pub fn frame_buffers(&self) -> &FrameBuffers {
        &self.frame
    }

    pub fn trail_buffers(&self) -> &TrailBuffers {
        &self.trails
    }
}
