//! Smoothed per-chain transaction rate
//!
//! Levels are relative: 1.0 means "this chain is as busy as it usually is".
//! Downstream motion only multiplies by these values, so a chain that never
//! reports simply stays at 1.0.

use crate::chains::ChainId;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityConfig {
    pub window_ms: i64,
    /// Fraction of the gap the baseline moves per record
    pub baseline_step: f64,
    pub baseline_floor: f64,
    /// Per-record smoothing applied to each chain's level
    pub level_smoothing: f64,
    /// Per-read smoothing applied to the cross-chain level
    pub overall_smoothing: f64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            window_ms: 5_000,
            baseline_step: 0.01,
            baseline_floor: 1.0,
            level_smoothing: 0.08,
            overall_smoothing: 0.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ActivityState {
    buckets: VecDeque<(i64, u32)>,
    baseline: Option<f64>,
    level: f64,
}

impl ActivityState {
    fn new() -> Self {
        Self {
            buckets: VecDeque::new(),
            baseline: None,
            level: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActivityEstimator {
    states: HashMap<ChainId, ActivityState>,
    overall: Option<f64>,
    config: ActivityConfig,
}

impl ActivityEstimator {
    pub fn new(config: ActivityConfig) -> Self {
        Self {
            states: HashMap::new(),
            overall: None,
            config,
        }
    }

    /// Record `count` transactions for `chain` at the current wall clock
    pub fn record(&mut self, chain: ChainId, count: u32) {
        self.record_at(chain, count, chrono::Utc::now().timestamp_millis());
    }

    pub fn record_at(&mut self, chain: ChainId, count: u32, now_ms: i64) {
        let cfg = &self.config;
        let state = self.states.entry(chain).or_insert_with(ActivityState::new);

        state.buckets.push_back((now_ms, count));
        let cutoff = now_ms - cfg.window_ms;
        while matches!(state.buckets.front(), Some((ts, _)) if *ts < cutoff) {
            state.buckets.pop_front();
        }

        let total: u64 = state.buckets.iter().map(|(_, c)| *c as u64).sum();
        let raw_rate = total as f64 / (cfg.window_ms as f64 / 1000.0);

        let baseline = match state.baseline {
            None => raw_rate.max(cfg.baseline_floor),
            Some(b) => (b + (raw_rate - b) * cfg.baseline_step).max(cfg.baseline_floor),
        };
        state.baseline = Some(baseline);

        let raw_level = raw_rate / baseline;
        state.level += (raw_level - state.level) * cfg.level_smoothing;
    }

    /// Smoothed level for one chain (1.0 when nothing has been recorded)
    pub fn level(&self, chain: ChainId) -> f64 {
        self.states.get(&chain).map(|s| s.level).unwrap_or(1.0)
    }

    /// Cross-chain level, smoothed more slowly than the per-chain levels
    pub fn overall_level(&mut self) -> f64 {
        if self.states.is_empty() {
            return self.overall.unwrap_or(1.0);
        }
        let avg = self.states.values().map(|s| s.level).sum::<f64>() / self.states.len() as f64;
        let next = match self.overall {
            None => avg,
            Some(prev) => prev + (avg - prev) * self.config.overall_smoothing,
        };
        self.overall = Some(next);
        next
    }

    pub fn baseline(&self, chain: ChainId) -> Option<f64> {
        self.states.get(&chain).and_then(|s| s.baseline)
    }

    pub fn chains(&self) -> Vec<ChainId> {
        let mut chains: Vec<ChainId> = self.states.keys().copied().collect();
        chains.sort();
        chains
    }
}
