//! Fair multiplexed queue
//!
//! Classified transactions are buffered per source chain and drained one per
//! chain per rotation step, so a chain with a huge backlog cannot crowd the
//! others out of a frame's spawn budget.
//!
//! Overflow is handled per chain: when a sub-queue grows past `cap` it is cut
//! back to `target`, keeping every whale and the newest non-whales. This is the
//! pipeline's only backpressure.

use crate::chains::ChainId;
use crate::types::ClassifiedTransaction;
use std::collections::{HashMap, VecDeque};

pub const DEFAULT_SUB_QUEUE_CAP: usize = 60;
pub const DEFAULT_TRIM_TARGET: usize = 30;

#[derive(Debug, Clone)]
pub struct FairQueue {
    queues: HashMap<ChainId, VecDeque<ClassifiedTransaction>>,
    /// Chains in first-seen order; drives the rotation
    order: Vec<ChainId>,
    cursor: usize,
    cap: usize,
    target: usize,
    dropped: u64,
}

impl FairQueue {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_SUB_QUEUE_CAP, DEFAULT_TRIM_TARGET)
    }

    pub fn with_limits(cap: usize, target: usize) -> Self {
        Self {
            queues: HashMap::new(),
            order: Vec::new(),
            cursor: 0,
            cap,
            target: target.min(cap),
            dropped: 0,
        }
    }

    /// Append a batch; items are routed to their chain's sub-queue
    pub fn push(&mut self, batch: Vec<ClassifiedTransaction>) {
        let mut touched: Vec<ChainId> = Vec::new();

        for tx in batch {
            let chain = tx.chain;
            if !self.queues.contains_key(&chain) {
                self.order.push(chain);
            }
            self.queues.entry(chain).or_default().push_back(tx);
            if !touched.contains(&chain) {
                touched.push(chain);
            }
        }

        for chain in touched {
            self.trim(chain);
        }
    }

    /// Take up to `max` items, one chain at a time in rotation
    pub fn drain(&mut self, max: usize) -> Vec<ClassifiedTransaction> {
        let mut out = Vec::with_capacity(max.min(self.size()));
        if self.order.is_empty() {
            return out;
        }

        let chains = self.order.len();
        let mut empty_streak = 0;

        while out.len() < max && empty_streak < chains {
            let chain = self.order[self.cursor];
            self.cursor = (self.cursor + 1) % chains;

            match self.queues.get_mut(&chain).and_then(|q| q.pop_front()) {
                Some(tx) => {
                    out.push(tx);
                    empty_streak = 0;
                }
                None => empty_streak += 1,
            }
        }

        out
    }

    pub fn size(&self) -> usize {
        self.queues.values().map(|q| q.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn len_for(&self, chain: ChainId) -> usize {
        self.queues.get(&chain).map(|q| q.len()).unwrap_or(0)
    }

    /// Non-whale items discarded by overflow trimming so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        for q in self.queues.values_mut() {
            q.clear();
        }
    }

    fn trim(&mut self, chain: ChainId) {
        let Some(queue) = self.queues.get_mut(&chain) else {
            return;
        };
        if queue.len() <= self.cap {
            return;
        }

        let whales = queue.iter().filter(|tx| tx.is_whale).count();
        let keep_regular = self.target.saturating_sub(whales);
        let regular_total = queue.len() - whales;
        // newest non-whales survive: skip the oldest ones
        let mut skip_regular = regular_total.saturating_sub(keep_regular);

        let before = queue.len();
        queue.retain(|tx| {
            if tx.is_whale {
                return true;
            }
            if skip_regular > 0 {
                skip_regular -= 1;
                return false;
            }
            true
        });

        let removed = before - queue.len();
        self.dropped += removed as u64;
        log::debug!(
            "✂️  Trimmed {} queue: dropped {} regular, kept {} whales ({} total)",
            chain,
            removed,
            whales,
            queue.len()
        );
    }
}

impl Default for FairQueue {
    fn default() -> Self {
        Self::new()
    }
}
