//! Synthetic traffic generator
//!
//! Produces one batch per block time with values spread log-uniformly below
//! the chain's whale threshold, plus an occasional outlier above it. Used when
//! no live or replay feed is configured and as the fallback once a live feed
//! exhausts its reconnect attempts.

use super::{ConnectionStatus, FeedSink, FeedSource, SourceKind};
use crate::chains::{ChainId, ChainProfile};
use crate::error::FeedError;
use crate::tokens::TokenProfile;
use crate::types::{RawTransactionEvent, TokenTransfer};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::time::interval;

/// Fastest emission cadence, so 250ms chains don't flood the channel
const MIN_BLOCK_INTERVAL_MS: u64 = 250;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    pub min_per_block: usize,
    pub max_per_block: usize,
    /// Chance that a transaction is sized above the whale threshold
    pub whale_chance: f64,
    /// Chance that a transaction is a token transfer (when tokens are known)
    pub token_chance: f64,
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            min_per_block: 3,
            max_per_block: 15,
            whale_chance: 0.02,
            token_chance: 0.3,
            seed: None,
        }
    }
}

pub struct SyntheticSource {
    profile: ChainProfile,
    tokens: Vec<TokenProfile>,
    config: SyntheticConfig,
    rng: StdRng,
    block_number: u64,
}

impl SyntheticSource {
    pub fn new(profile: ChainProfile, tokens: Vec<TokenProfile>, config: SyntheticConfig) -> Self {
        let rng = match config.seed {
            // mix the chain in so seeded chains don't mirror each other
            Some(seed) => StdRng::seed_from_u64(seed ^ (profile.chain as u64).wrapping_mul(0x9E37_79B9)),
            None => StdRng::from_entropy(),
        };
        Self {
            profile,
            tokens,
            config,
            rng,
            block_number: 1,
        }
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    /// Generate the next block's worth of transactions
    pub fn next_block(&mut self) -> Vec<RawTransactionEvent> {
        let lo = self.config.min_per_block;
        let hi = self.config.max_per_block.max(lo);
        let count = self.rng.gen_range(lo..=hi);
        let timestamp = chrono::Utc::now().timestamp_millis();

        let events = (0..count).map(|_| self.transaction(timestamp)).collect();
        self.block_number += 1;
        events
    }

    fn transaction(&mut self, timestamp: i64) -> RawTransactionEvent {
        let whale = self.rng.gen_bool(self.config.whale_chance.clamp(0.0, 1.0));
        let use_token =
            !self.tokens.is_empty() && self.rng.gen_bool(self.config.token_chance.clamp(0.0, 1.0));

        let (value, token) = if use_token {
            let index = self.rng.gen_range(0..self.tokens.len());
            let token = self.tokens[index].clone();
            let amount = self.magnitude(token.whale_threshold, whale);
            let transfer = TokenTransfer {
                contract: token.contract,
                raw_amount: to_base_units(amount, token.decimals),
                decimals: token.decimals,
                symbol: token.symbol,
                is_stablecoin: token.is_stablecoin,
            };
            (0, Some(transfer))
        } else {
            let amount = self.magnitude(self.profile.whale_threshold, whale);
            (to_base_units(amount, self.profile.native_decimals), None)
        };

        let gas_gwei: f64 = self.rng.gen_range(0.05..80.0);

        RawTransactionEvent {
            hash: format!("0x{}", hex::encode(self.rng.gen::<[u8; 32]>())),
            from: format!("0x{}", hex::encode(self.rng.gen::<[u8; 20]>())),
            to: Some(format!("0x{}", hex::encode(self.rng.gen::<[u8; 20]>()))),
            value,
            gas_price: (gas_gwei * 1e9) as u128,
            gas_limit: if token.is_some() { 65_000 } else { 21_000 },
            block_number: self.block_number,
            chain: self.profile.chain,
            timestamp,
            token,
        }
    }

    /// Log-uniform amount: four decades below the threshold, or up to 5x
    /// above it for whales
    fn magnitude(&mut self, threshold: f64, whale: bool) -> f64 {
        let top = threshold.max(1e-9).log10();
        let exponent = if whale {
            self.rng.gen_range(top..top + 0.7)
        } else {
            self.rng.gen_range(top - 4.0..top - 0.1)
        };
        10f64.powf(exponent)
    }
}

fn to_base_units(amount: f64, decimals: u8) -> u128 {
    (amount * 10f64.powi(decimals as i32)) as u128
}

#[async_trait]
impl FeedSource for SyntheticSource {
    fn chain(&self) -> ChainId {
        self.profile.chain
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Synthetic
    }

    async fn run(&mut self, sink: FeedSink) -> Result<(), FeedError> {
        let block_ms = self.profile.block_time_ms.max(MIN_BLOCK_INTERVAL_MS);
        log::info!(
            "🎲 Synthetic feed for {} (block every {}ms)",
            self.profile.chain,
            block_ms
        );
        sink.status(ConnectionStatus::Simulated).await?;

        let mut timer = interval(Duration::from_millis(block_ms));
        loop {
            timer.tick().await;
            let batch = self.next_block();
            sink.emit(batch).await?;
        }
    }
}
