//! Transaction classification
//!
//! Converts `RawTransactionEvent`s into `ClassifiedTransaction`s:
//! 1. Reduce raw integers to human units
//! 2. Feed the magnitude into the per-key `WhaleDetector`
//! 3. Decide whale status (adaptive threshold + cooldown)
//! 4. Derive the visual descriptor (size, intensity, heat, color)
//!
//! Malformed records are rejected here and never reach the queue.

pub mod activity;
pub mod price;
pub mod whale;

pub use activity::{ActivityConfig, ActivityEstimator};
pub use price::{HttpPriceFetcher, PriceCache, PriceFetcher};
pub use whale::{WhaleDetector, WhaleDetectorConfig};

use crate::chains::{ChainId, ChainProfile, Rgb};
use crate::error::ClassifyError;
use crate::tokens::{fallback_accent, TokenRegistry};
use crate::types::{
    detection_key, scale_down, ClassifiedTransaction, RawTransactionEvent, VisualDescriptor,
};
use std::collections::HashMap;
use std::sync::Arc;

const MAX_TOKEN_DECIMALS: u8 = 36;
const WEI_PER_GWEI: f64 = 1e9;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Log-scale ceiling for stablecoin amounts
    pub stable_ceiling: f64,
    /// Ceiling for tokens missing from the registry
    pub unknown_token_ceiling: f64,
    pub size_exponent: f64,
    pub intensity_exponent: f64,
    pub gas_ceiling_gwei: f64,
    /// Static threshold for stablecoins missing from the registry
    pub stable_threshold: f64,
    /// Static threshold for volatile tokens missing from the registry
    pub unknown_token_threshold: f64,
    /// Minimum whale size in USD, converted through the price cache
    pub usd_floor: Option<f64>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            stable_ceiling: 10_000_000.0,
            unknown_token_ceiling: 1_000_000.0,
            size_exponent: 0.5,
            intensity_exponent: 0.4,
            gas_ceiling_gwei: 100.0,
            stable_threshold: 250_000.0,
            unknown_token_threshold: 1_000_000.0,
            usd_floor: None,
        }
    }
}

/// Asset-level parameters resolved for one transaction
struct AssetTerms {
    symbol: String,
    value: f64,
    ceiling: f64,
    static_threshold: f64,
    accent: Rgb,
    price_id: Option<String>,
    is_stablecoin: bool,
}

pub struct Classifier {
    profiles: HashMap<ChainId, ChainProfile>,
    tokens: TokenRegistry,
    detector: WhaleDetector,
    prices: Arc<PriceCache>,
    config: ClassifierConfig,

    /// Timestamp function in unix ms (mockable for tests)
    now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl Classifier {
    pub fn new(
        profiles: HashMap<ChainId, ChainProfile>,
        tokens: TokenRegistry,
        prices: Arc<PriceCache>,
        config: ClassifierConfig,
    ) -> Self {
        Self::new_with_timestamp_fn(
            profiles,
            tokens,
            prices,
            config,
            Box::new(|| chrono::Utc::now().timestamp_millis()),
        )
    }

    pub fn new_with_timestamp_fn(
        profiles: HashMap<ChainId, ChainProfile>,
        tokens: TokenRegistry,
        prices: Arc<PriceCache>,
        config: ClassifierConfig,
        now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
    ) -> Self {
        Self {
            profiles,
            tokens,
            detector: WhaleDetector::default(),
            prices,
            config,
            now_fn,
        }
    }

    /// Classifier with default chain profiles and token registry
    pub fn with_defaults() -> Self {
        let profiles = ChainId::all()
            .into_iter()
            .map(|c| (c, ChainProfile::defaults_for(c)))
            .collect();
        Self::new(
            profiles,
            TokenRegistry::with_defaults(),
            Arc::new(PriceCache::default()),
            ClassifierConfig::default(),
        )
    }

    pub fn classify(
        &mut self,
        raw: &RawTransactionEvent,
    ) -> Result<ClassifiedTransaction, ClassifyError> {
        if raw.hash.is_empty() {
            return Err(ClassifyError::MissingHash(raw.chain));
        }

        let profile = self.profile(raw.chain);
        let terms = self.asset_terms(&profile, raw)?;
        let now = (self.now_fn)();

        let key = detection_key(raw.chain, raw.token.as_ref());
        let floor_units = self.usd_floor_units(&terms, now);

        self.detector.observe(&key, terms.value);
        let is_whale =
            self.detector
                .is_whale(&key, terms.value, terms.static_threshold, floor_units, now);

        if is_whale {
            log::debug!(
                "🐋 Whale on {}: {:.4} {} ({})",
                raw.chain,
                terms.value,
                terms.symbol,
                raw.hash
            );
        }

        let gas_price_gwei = raw.gas_price as f64 / WEI_PER_GWEI;
        let visual = self.visual(&profile, &terms, gas_price_gwei, is_whale);

        Ok(ClassifiedTransaction {
            hash: raw.hash.clone(),
            from: raw.from.clone(),
            to: raw.to.clone(),
            value: terms.value,
            gas_price_gwei,
            gas_limit: raw.gas_limit,
            block_number: raw.block_number,
            chain: raw.chain,
            timestamp: raw.timestamp,
            token: raw.token.clone(),
            symbol: terms.symbol,
            is_whale,
            visual,
        })
    }

    /// Classify a batch, silently dropping records that fail validation
    pub fn classify_batch(&mut self, batch: &[RawTransactionEvent]) -> Vec<ClassifiedTransaction> {
        batch
            .iter()
            .filter_map(|raw| match self.classify(raw) {
                Ok(tx) => Some(tx),
                Err(e) => {
                    log::debug!("Dropping transaction {}: {}", raw.hash, e);
                    None
                }
            })
            .collect()
    }

    pub fn profile(&self, chain: ChainId) -> ChainProfile {
        self.profiles
            .get(&chain)
            .cloned()
            .unwrap_or_else(|| ChainProfile::defaults_for(chain))
    }

    pub fn detector(&self) -> &WhaleDetector {
        &self.detector
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub fn set_usd_floor(&mut self, usd_floor: Option<f64>) {
        self.config.usd_floor = usd_floor;
    }

    /// Replace one chain's profile; detector history is kept
    pub fn set_profile(&mut self, profile: ChainProfile) {
        self.profiles.insert(profile.chain, profile);
    }

    /// Every price id the USD floor may need, deduplicated and sorted
    pub fn price_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .profiles
            .values()
            .map(|p| p.price_id.clone())
            .chain(
                self.profiles
                    .keys()
                    .flat_map(|chain| self.tokens.tokens_for(*chain))
                    .filter_map(|t| t.price_id.clone()),
            )
            .filter(|id| !id.is_empty())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    fn asset_terms(
        &self,
        profile: &ChainProfile,
        raw: &RawTransactionEvent,
    ) -> Result<AssetTerms, ClassifyError> {
        let terms = match &raw.token {
            None => AssetTerms {
                symbol: profile.native_symbol.clone(),
                value: scale_down(raw.value, profile.native_decimals),
                ceiling: profile.value_ceiling,
                static_threshold: profile.whale_threshold,
                accent: profile.accent,
                price_id: Some(profile.price_id.clone()),
                is_stablecoin: false,
            },
            Some(token) => {
                if token.decimals > MAX_TOKEN_DECIMALS {
                    return Err(ClassifyError::UnsupportedDecimals(token.decimals));
                }
                let known = self
                    .tokens
                    .by_contract(raw.chain, &token.contract)
                    .or_else(|| self.tokens.by_symbol(raw.chain, &token.symbol));

                let ceiling = if token.is_stablecoin {
                    self.config.stable_ceiling
                } else {
                    self.config.unknown_token_ceiling
                };
                let fallback_threshold = if token.is_stablecoin {
                    self.config.stable_threshold
                } else {
                    self.config.unknown_token_threshold
                };

                AssetTerms {
                    symbol: token.symbol.to_uppercase(),
                    value: token.amount(),
                    ceiling: match known {
                        // registry tokens priced like the native asset use the chain ceiling
                        Some(p) if !p.is_stablecoin && p.price_id.as_deref() == Some(profile.price_id.as_str()) => {
                            profile.value_ceiling
                        }
                        _ => ceiling,
                    },
                    static_threshold: known
                        .map(|p| p.whale_threshold)
                        .unwrap_or(fallback_threshold),
                    accent: known
                        .map(|p| p.accent)
                        .unwrap_or_else(|| fallback_accent(&token.symbol)),
                    price_id: known.and_then(|p| p.price_id.clone()),
                    is_stablecoin: token.is_stablecoin,
                }
            }
        };

        if !terms.value.is_finite() {
            return Err(ClassifyError::NonFiniteValue(raw.hash.clone()));
        }
        Ok(terms)
    }

    fn usd_floor_units(&self, terms: &AssetTerms, now_ms: i64) -> Option<f64> {
        let floor = self.config.usd_floor?;
        let price = if terms.is_stablecoin {
            1.0
        } else {
            self.prices.get(terms.price_id.as_deref()?, now_ms)?
        };
        Some(floor / price)
    }

    fn visual(
        &self,
        profile: &ChainProfile,
        terms: &AssetTerms,
        gas_price_gwei: f64,
        is_whale: bool,
    ) -> VisualDescriptor {
        let heat = (gas_price_gwei / self.config.gas_ceiling_gwei).clamp(0.0, 1.0) as f32;

        let (size, intensity) = if is_whale {
            (1.0, 1.0)
        } else {
            let ratio = log_ratio(terms.value, terms.ceiling);
            (
                ratio.powf(self.config.size_exponent).clamp(0.0, 1.0) as f32,
                ratio.powf(self.config.intensity_exponent).clamp(0.0, 1.0) as f32,
            )
        };

        let mix = (0.25 + 0.75 * heat).clamp(0.0, 1.0);
        let color = profile.primary.lerp(terms.accent, mix);

        VisualDescriptor {
            size,
            intensity,
            heat,
            color,
        }
    }
}

/// `ln(1 + value) / ln(1 + ceiling)`, zero for non-positive input
fn log_ratio(value: f64, ceiling: f64) -> f64 {
    if value <= 0.0 || ceiling <= 0.0 {
        return 0.0;
    }
    (value.ln_1p() / ceiling.ln_1p()).max(0.0)
}
