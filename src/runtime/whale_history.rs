use crate::chains::ChainId;
use crate::types::ClassifiedTransaction;
use std::collections::VecDeque;

pub const DEFAULT_WHALE_HISTORY: usize = 100;

/// Subset of a whale transaction kept for inspection after its particle dies
#[derive(Debug, Clone, PartialEq)]
pub struct WhaleRecord {
    pub hash: String,
    pub chain: ChainId,
    pub symbol: String,
    pub value: f64,
    pub block_number: u64,
    pub timestamp: i64,
}

impl From<&ClassifiedTransaction> for WhaleRecord {
    fn from(tx: &ClassifiedTransaction) -> Self {
        Self {
            hash: tx.hash.clone(),
            chain: tx.chain,
            symbol: tx.symbol.clone(),
            value: tx.value,
            block_number: tx.block_number,
            timestamp: tx.timestamp,
        }
    }
}

/// Bounded most-recent-first list of whales
#[derive(Debug, Clone)]
pub struct WhaleHistory {
    records: VecDeque<WhaleRecord>,
    capacity: usize,
}

impl WhaleHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, tx: &ClassifiedTransaction) {
        if self.records.len() == self.capacity {
            self.records.pop_back();
        }
        self.records.push_front(WhaleRecord::from(tx));
    }

    /// Newest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &WhaleRecord> {
        self.records.iter().take(n)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for WhaleHistory {
    fn default() -> Self {
        Self::new(DEFAULT_WHALE_HISTORY)
    }
}
