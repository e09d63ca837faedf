//! USD price cache used to convert the whale USD floor into asset units
//!
//! The classifier reads the cache synchronously on every transaction; a
//! background task refreshes it from a `PriceFetcher`.
//!
//! ## API Reference
//!
//! `HttpPriceFetcher` speaks the CoinGecko `simple/price` shape:
//! `GET {base}/simple/price?ids=ethereum,bitcoin&vs_currencies=usd`
//! → `{"ethereum":{"usd":3120.5},"bitcoin":{"usd":64000.0}}`

use crate::error::PriceError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

pub const DEFAULT_PRICE_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Clone, Copy)]
struct PriceEntry {
    usd: f64,
    updated_ms: i64,
}

/// Thread-safe price map with a freshness window
#[derive(Debug)]
pub struct PriceCache {
    entries: RwLock<HashMap<String, PriceEntry>>,
    ttl_ms: i64,
}

impl PriceCache {
    pub fn new(ttl_ms: i64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl_ms,
        }
    }

    pub fn set(&self, price_id: &str, usd: f64, now_ms: i64) {
        if !usd.is_finite() || usd <= 0.0 {
            log::debug!("Ignoring invalid price for {}: {}", price_id, usd);
            return;
        }
        self.entries.write().insert(
            price_id.to_string(),
            PriceEntry {
                usd,
                updated_ms: now_ms,
            },
        );
    }

    /// Fresh USD price, or `None` when missing or older than the TTL
    pub fn get(&self, price_id: &str, now_ms: i64) -> Option<f64> {
        let entries = self.entries.read();
        let entry = entries.get(price_id)?;
        if now_ms - entry.updated_ms > self.ttl_ms {
            return None;
        }
        Some(entry.usd)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for PriceCache {
    fn default() -> Self {
        // 10 minutes: prices only gate the whale floor, staleness is tolerable
        Self::new(10 * 60 * 1000)
    }
}

#[async_trait]
pub trait PriceFetcher: Send + Sync {
    async fn fetch(&self, price_ids: &[String]) -> Result<HashMap<String, f64>, PriceError>;
}

pub struct HttpPriceFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPriceFetcher {
    pub fn new(base_url: &str) -> Result<Self, PriceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    usd: Option<f64>,
}

#[async_trait]
impl PriceFetcher for HttpPriceFetcher {
    async fn fetch(&self, price_ids: &[String]) -> Result<HashMap<String, f64>, PriceError> {
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            self.base_url,
            price_ids.join(",")
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(PriceError::Api(format!("status {}", response.status())));
        }

        let quotes: HashMap<String, UsdQuote> = response.json().await?;
        Ok(quotes
            .into_iter()
            .filter_map(|(id, quote)| quote.usd.map(|usd| (id, usd)))
            .collect())
    }
}

/// Periodically refresh `cache` with prices for `price_ids`
///
/// Runs until the task is aborted. Fetch failures are logged and the previous
/// prices stay in place until their TTL lapses.
pub async fn price_refresh_task(
    cache: Arc<PriceCache>,
    fetcher: Arc<dyn PriceFetcher>,
    price_ids: Vec<String>,
    interval_ms: u64,
) {
    if price_ids.is_empty() {
        log::info!("💰 No price ids configured, price refresh disabled");
        return;
    }

    log::info!(
        "💰 Starting price refresh (interval: {}ms, ids: {})",
        interval_ms,
        price_ids.join(",")
    );
    let mut timer = interval(Duration::from_millis(interval_ms));

    loop {
        timer.tick().await;
        match fetcher.fetch(&price_ids).await {
            Ok(prices) => {
                let now = chrono::Utc::now().timestamp_millis();
                for (id, usd) in &prices {
                    cache.set(id, *usd, now);
                }
                log::debug!("✅ Refreshed {} prices", prices.len());
            }
            Err(e) => {
                log::warn!("⚠️  Price refresh failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedFetcher;

    #[async_trait]
    impl PriceFetcher for FixedFetcher {
        async fn fetch(&self, ids: &[String]) -> Result<HashMap<String, f64>, PriceError> {
            Ok(ids.iter().map(|id| (id.clone(), 2_000.0)).collect())
        }
    }

    #[test]
    fn test_cache_respects_ttl() {
        let cache = PriceCache::new(1_000);
        cache.set("ethereum", 3_000.0, 10_000);

        assert_eq!(cache.get("ethereum", 10_500), Some(3_000.0));
        assert_eq!(cache.get("ethereum", 11_001), None);
        assert_eq!(cache.get("bitcoin", 10_500), None);
    }

    #[test]
    fn test_cache_ignores_invalid_prices() {
        let cache = PriceCache::default();
        cache.set("ethereum", f64::NAN, 0);
        cache.set("bitcoin", -1.0, 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_task_populates_cache() {
        let cache = Arc::new(PriceCache::default());
        let handle = tokio::spawn(price_refresh_task(
            cache.clone(),
            Arc::new(FixedFetcher),
            vec!["ethereum".to_string()],
            50,
        ));

        // first interval tick fires immediately
        for _ in 0..50 {
            if !cache.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        let now = chrono::Utc::now().timestamp_millis();
        assert_eq!(cache.get("ethereum", now), Some(2_000.0));
    }
}
