//! Runtime configuration from environment variables and an optional JSON
//! profile file

use crate::chains::{ChainId, ChainProfile, ChainProfileOverride};
use crate::classifier::price::DEFAULT_PRICE_URL;
use crate::engine::LifecycleConfig;
use crate::error::ConfigError;
use crate::tokens::{TokenProfile, TokenRegistry};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the chainflow runtime
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Chains to stream
    pub chains: Vec<ChainId>,

    /// Particle pool size
    pub pool_capacity: usize,

    /// Simulation ticks per second
    pub tick_hz: u32,

    /// Upper bound on spawns per tick
    pub max_spawns_per_tick: usize,

    /// Feed channel buffer size (events)
    pub channel_buffer: usize,

    /// Minimum whale size in USD
    pub whale_usd_floor: Option<f64>,

    /// JSON file with chain overrides, extra tokens and lifecycle tuning
    pub profile_path: Option<PathBuf>,

    /// JSONL capture to replay instead of synthetic traffic
    pub replay_path: Option<PathBuf>,

    pub price_url: String,

    /// Price refresh interval in milliseconds (0 disables refresh)
    pub price_interval_ms: u64,

    /// Seed for synthetic traffic and spawn layout
    pub seed: Option<u64>,

    /// Stats log interval in milliseconds
    pub stats_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            chains: ChainId::all().to_vec(),
            pool_capacity: 2_000,
            tick_hz: 60,
            max_spawns_per_tick: 12,
            channel_buffer: 1_024,
            whale_usd_floor: None,
            profile_path: None,
            replay_path: None,
            price_url: DEFAULT_PRICE_URL.to_string(),
            price_interval_ms: 60_000,
            seed: None,
            stats_interval_ms: 10_000,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `CHAINFLOW_CHAINS` (default: all chains, comma-separated)
    /// - `CHAINFLOW_POOL_CAPACITY` (default: 2000)
    /// - `CHAINFLOW_TICK_HZ` (default: 60)
    /// - `CHAINFLOW_MAX_SPAWNS_PER_TICK` (default: 12)
    /// - `CHAINFLOW_CHANNEL_BUFFER` (default: 1024)
    /// - `CHAINFLOW_WHALE_USD_FLOOR` (default: unset)
    /// - `CHAINFLOW_PROFILE_PATH` (default: unset)
    /// - `CHAINFLOW_REPLAY_PATH` (default: unset)
    /// - `CHAINFLOW_PRICE_URL` (default: CoinGecko public API)
    /// - `CHAINFLOW_PRICE_INTERVAL_MS` (default: 60000)
    /// - `CHAINFLOW_SEED` (default: unset, random)
    /// - `CHAINFLOW_STATS_INTERVAL_MS` (default: 10000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let chains = match lookup("CHAINFLOW_CHAINS") {
            Some(list) => parse_chains(&list)?,
            None => defaults.chains,
        };

        let config = Self {
            chains,
            pool_capacity: parse_or(&lookup, "CHAINFLOW_POOL_CAPACITY", defaults.pool_capacity),
            tick_hz: parse_or(&lookup, "CHAINFLOW_TICK_HZ", defaults.tick_hz),
            max_spawns_per_tick: parse_or(
                &lookup,
                "CHAINFLOW_MAX_SPAWNS_PER_TICK",
                defaults.max_spawns_per_tick,
            ),
            channel_buffer: parse_or(&lookup, "CHAINFLOW_CHANNEL_BUFFER", defaults.channel_buffer),
            whale_usd_floor: lookup("CHAINFLOW_WHALE_USD_FLOOR").and_then(|s| s.trim().parse().ok()),
            profile_path: lookup("CHAINFLOW_PROFILE_PATH")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            replay_path: lookup("CHAINFLOW_REPLAY_PATH")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            price_url: lookup("CHAINFLOW_PRICE_URL").unwrap_or(defaults.price_url),
            price_interval_ms: parse_or(
                &lookup,
                "CHAINFLOW_PRICE_INTERVAL_MS",
                defaults.price_interval_ms,
            ),
            seed: lookup("CHAINFLOW_SEED").and_then(|s| s.trim().parse().ok()),
            stats_interval_ms: parse_or(
                &lookup,
                "CHAINFLOW_STATS_INTERVAL_MS",
                defaults.stats_interval_ms,
            ),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.chains.is_empty() {
            return Err(ConfigError::InvalidValue("CHAINFLOW_CHAINS is empty".to_string()));
        }
        if self.pool_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "CHAINFLOW_POOL_CAPACITY must be > 0".to_string(),
            ));
        }
        if self.tick_hz == 0 {
            return Err(ConfigError::InvalidValue("CHAINFLOW_TICK_HZ must be > 0".to_string()));
        }
        if let Some(floor) = self.whale_usd_floor {
            if !floor.is_finite() || floor < 0.0 {
                return Err(ConfigError::InvalidValue(format!(
                    "CHAINFLOW_WHALE_USD_FLOOR must be a positive number, got {}",
                    floor
                )));
            }
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_hz as f64)
    }

    /// Load the profile file if one is configured
    pub fn load_profile(&self) -> Result<ProfileFile, ConfigError> {
        match &self.profile_path {
            Some(path) => ProfileFile::load(path),
            None => Ok(ProfileFile::default()),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                log::warn!("⚠️  Invalid {}='{}', using default {}", key, raw, default);
                default
            }
        },
        None => default,
    }
}

fn parse_chains(list: &str) -> Result<Vec<ChainId>, ConfigError> {
    let mut chains = Vec::new();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let chain: ChainId = name.parse()?;
        if !chains.contains(&chain) {
            chains.push(chain);
        }
    }
    Ok(chains)
}

/// Optional JSON profile file
///
/// ```json
/// {
///   "chains": { "ethereum": { "whaleThreshold": 250.0 } },
///   "tokens": [ { "chain": "base", "contract": "0x...", "symbol": "DEGEN", ... } ],
///   "lifecycle": { "capacity": 4000, "swirl": 0.5 }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileFile {
    pub chains: HashMap<ChainId, ChainProfileOverride>,
    pub tokens: Vec<TokenProfile>,
    pub lifecycle: Option<LifecycleConfig>,
}

impl ProfileFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ProfileRead {
            path: path.display().to_string(),
            source,
        })?;
        let profile: Self = serde_json::from_str(&raw)?;
        log::info!(
            "📋 Loaded profile {} ({} chain overrides, {} tokens)",
            path.display(),
            profile.chains.len(),
            profile.tokens.len()
        );
        Ok(profile)
    }

    /// Default profiles for `chains` with this file's overrides applied
    pub fn chain_profiles(&self, chains: &[ChainId]) -> HashMap<ChainId, ChainProfile> {
        chains
            .iter()
            .map(|chain| {
                let mut profile = ChainProfile::defaults_for(*chain);
                if let Some(overrides) = self.chains.get(chain) {
                    profile.apply(overrides);
                }
                (*chain, profile)
            })
            .collect()
    }

    /// Default token registry plus this file's tokens
    pub fn token_registry(&self) -> TokenRegistry {
        let mut registry = TokenRegistry::with_defaults();
        for token in &self.tokens {
            registry.insert(token.clone());
        }
        registry
    }

    /// Lifecycle tuning; the environment's pool capacity wins over the file
    pub fn lifecycle(&self, runtime: &RuntimeConfig) -> LifecycleConfig {
        let mut lifecycle = self.lifecycle.clone().unwrap_or_default();
        lifecycle.capacity = runtime.pool_capacity;
        lifecycle
    }
}
