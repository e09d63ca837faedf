//! Token registry and ERC-20 transfer log decoding
//!
//! Transports hand us raw `Transfer` logs; only fungible transfers of known
//! contracts survive decoding. Everything else (unknown contracts, ERC-721
//! shaped logs, truncated topics) is rejected with a `DecodeError`.
//! `transfer_events` is the transport-facing entry point: it turns a
//! transaction's logs into `RawTransactionEvent`s and drops the rejects.

use crate::chains::{ChainId, Rgb};
use crate::error::DecodeError;
use crate::types::{RawTransactionEvent, TokenTransfer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

const MAX_DECIMALS: u8 = 36;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenProfile {
    pub chain: ChainId,
    pub contract: String,
    pub symbol: String,
    pub decimals: u8,
    pub is_stablecoin: bool,
    pub accent: Rgb,
    /// Static whale threshold in token units
    pub whale_threshold: f64,
    /// Price identifier; stablecoins are priced at 1.0 and leave this empty
    #[serde(default)]
    pub price_id: Option<String>,
}

/// Raw EVM log as delivered by a transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
}

/// Fungible transfer decoded from a log
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTransfer {
    pub from: String,
    pub to: String,
    pub transfer: TokenTransfer,
}

/// Transaction fields a transport knows for the logs it emitted
#[derive(Debug, Clone, PartialEq)]
pub struct LogEnvelope {
    pub hash: String,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub block_number: u64,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    by_contract: HashMap<(ChainId, String), TokenProfile>,
    by_symbol: HashMap<(ChainId, String), String>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the majors on every supported chain
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for profile in default_tokens() {
            registry.insert(profile);
        }
        registry
    }

    pub fn insert(&mut self, mut profile: TokenProfile) {
        profile.contract = profile.contract.to_lowercase();
        profile.symbol = profile.symbol.to_uppercase();
        self.by_symbol.insert(
            (profile.chain, profile.symbol.clone()),
            profile.contract.clone(),
        );
        self.by_contract
            .insert((profile.chain, profile.contract.clone()), profile);
    }

    pub fn by_contract(&self, chain: ChainId, contract: &str) -> Option<&TokenProfile> {
        self.by_contract.get(&(chain, contract.to_lowercase()))
    }

    pub fn by_symbol(&self, chain: ChainId, symbol: &str) -> Option<&TokenProfile> {
        self.by_symbol
            .get(&(chain, symbol.to_uppercase()))
            .and_then(|contract| self.by_contract.get(&(chain, contract.clone())))
    }

    pub fn tokens_for(&self, chain: ChainId) -> Vec<&TokenProfile> {
        let mut tokens: Vec<&TokenProfile> = self
            .by_contract
            .values()
            .filter(|p| p.chain == chain)
            .collect();
        tokens.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        tokens
    }

    pub fn len(&self) -> usize {
        self.by_contract.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_contract.is_empty()
    }

    /// Decode an ERC-20 `Transfer` log into a token transfer
    pub fn decode_transfer_log(
        &self,
        chain: ChainId,
        log: &RawLog,
    ) -> Result<DecodedTransfer, DecodeError> {
        if log.topics.len() < 3 {
            return Err(DecodeError::InsufficientTopics(log.topics.len()));
        }
        if !log.topics[0].eq_ignore_ascii_case(TRANSFER_TOPIC) {
            return Err(DecodeError::NotTransfer);
        }
        // ERC-721 indexes the token id as a fourth topic and carries no data
        if log.topics.len() > 3 {
            return Err(DecodeError::NonFungible);
        }

        let data = hex::decode(strip_0x(&log.data))?;
        if data.is_empty() {
            return Err(DecodeError::NonFungible);
        }

        let profile = self
            .by_contract(chain, &log.address)
            .ok_or_else(|| DecodeError::UnknownContract(log.address.to_lowercase()))?;

        let raw_amount = u128_from_be(&data)?;

        Ok(DecodedTransfer {
            from: topic_to_address(&log.topics[1])?,
            to: topic_to_address(&log.topics[2])?,
            transfer: TokenTransfer {
                contract: profile.contract.clone(),
                raw_amount,
                decimals: profile.decimals.min(MAX_DECIMALS),
                symbol: profile.symbol.clone(),
                is_stablecoin: profile.is_stablecoin,
            },
        })
    }

    /// Decode every log of one transaction into a token event. Logs that are
    /// not fungible transfers of a known contract are dropped.
    pub fn transfer_events(
        &self,
        chain: ChainId,
        envelope: &LogEnvelope,
        logs: &[RawLog],
    ) -> Vec<RawTransactionEvent> {
        logs.iter()
            .filter_map(|raw| match self.decode_transfer_log(chain, raw) {
                Ok(decoded) => Some(RawTransactionEvent {
                    hash: envelope.hash.clone(),
                    from: decoded.from,
                    to: Some(decoded.to),
                    value: 0,
                    gas_price: envelope.gas_price,
                    gas_limit: envelope.gas_limit,
                    block_number: envelope.block_number,
                    chain,
                    timestamp: envelope.timestamp,
                    token: Some(decoded.transfer),
                }),
                Err(e) => {
                    log::debug!("Skipping log {} in {}: {}", raw.address, envelope.hash, e);
                    None
                }
            })
            .collect()
    }
}

/// Deterministic accent color for tokens missing from the registry
pub fn fallback_accent(symbol: &str) -> Rgb {
    let hash = symbol
        .to_uppercase()
        .bytes()
        .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
    let hue = (hash % 360) as f32 / 60.0;
    let x = 1.0 - (hue % 2.0 - 1.0).abs();
    let (r, g, b) = match hue as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    // pastel: mix toward white
    Rgb::new(r, g, b).lerp(Rgb::new(1.0, 1.0, 1.0), 0.35)
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

fn topic_to_address(topic: &str) -> Result<String, DecodeError> {
    let bytes = hex::decode(strip_0x(topic))?;
    let start = bytes.len().saturating_sub(20);
    Ok(format!("0x{}", hex::encode(&bytes[start..])))
}

fn u128_from_be(bytes: &[u8]) -> Result<u128, DecodeError> {
    let significant = if bytes.len() > 16 {
        let (high, low) = bytes.split_at(bytes.len() - 16);
        if high.iter().any(|b| *b != 0) {
            return Err(DecodeError::AmountOverflow);
        }
        low
    } else {
        bytes
    };
    Ok(significant
        .iter()
        .fold(0u128, |acc, b| (acc << 8) | *b as u128))
}

#[allow(clippy::too_many_arguments)]
fn token(
    chain: ChainId,
    contract: &str,
    symbol: &str,
    decimals: u8,
    is_stablecoin: bool,
    accent: u32,
    whale_threshold: f64,
    price_id: Option<&str>,
) -> TokenProfile {
    TokenProfile {
        chain,
        contract: contract.to_string(),
        symbol: symbol.to_string(),
        decimals,
        is_stablecoin,
        accent: Rgb::from_hex(accent),
        whale_threshold,
        price_id: price_id.map(str::to_string),
    }
}

fn default_tokens() -> Vec<TokenProfile> {
    use ChainId::*;
    vec![
        token(Ethereum, "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", "USDC", 6, true, 0x2775CA, 250_000.0, None),
        token(Ethereum, "0xdac17f958d2ee523a2206206994597c13d831ec7", "USDT", 6, true, 0x26A17B, 250_000.0, None),
        token(Ethereum, "0x6b175474e89094c44da98b954eedeac495271d0f", "DAI", 18, true, 0xF5AC37, 250_000.0, None),
        token(Ethereum, "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2", "WETH", 18, false, 0xEC4899, 100.0, Some("ethereum")),
        token(Ethereum, "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599", "WBTC", 8, false, 0xF7931A, 5.0, Some("bitcoin")),
        token(Polygon, "0x3c499c542cef5e3811e1192ce70d8cc03d5c3359", "USDC", 6, true, 0x2775CA, 100_000.0, None),
        token(Polygon, "0xc2132d05d31c914a87c6611c10748aeb04b58e8f", "USDT", 6, true, 0x26A17B, 100_000.0, None),
        token(Arbitrum, "0xaf88d065e77c8cc2239327c5edb3a432268e5831", "USDC", 6, true, 0x2775CA, 100_000.0, None),
        token(Arbitrum, "0x912ce59144191c1204e64559fe8253a0e49e6548", "ARB", 18, false, 0x12AAFF, 250_000.0, Some("arbitrum")),
        token(Optimism, "0x0b2c639c533813f4aa9d7837caf62653d097ff85", "USDC", 6, true, 0x2775CA, 100_000.0, None),
        token(Optimism, "0x4200000000000000000000000000000000000042", "OP", 18, false, 0xFF4D5E, 150_000.0, Some("optimism")),
        token(Base, "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913", "USDC", 6, true, 0x2775CA, 100_000.0, None),
        token(Bsc, "0x55d398326f99059ff775485246999027b3197955", "USDT", 18, true, 0x26A17B, 100_000.0, None),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

    fn padded(addr: &str) -> String {
        format!("0x{:0>64}", strip_0x(addr))
    }

    fn amount_data(amount: u128) -> String {
        format!("0x{:064x}", amount)
    }

    fn usdc_log(amount: u128) -> RawLog {
        RawLog {
            address: USDC.to_uppercase().replace("0X", "0x"),
            topics: vec![
                TRANSFER_TOPIC.to_string(),
                padded("0x1111111111111111111111111111111111111111"),
                padded("0x2222222222222222222222222222222222222222"),
            ],
            data: amount_data(amount),
        }
    }

    #[test]
    fn test_decode_known_transfer() {
        let registry = TokenRegistry::with_defaults();
        let decoded = registry
            .decode_transfer_log(ChainId::Ethereum, &usdc_log(5_000_000_000))
            .unwrap();

        assert_eq!(decoded.transfer.symbol, "USDC");
        assert_eq!(decoded.transfer.raw_amount, 5_000_000_000);
        assert_eq!(decoded.transfer.amount(), 5_000.0);
        assert!(decoded.transfer.is_stablecoin);
        assert_eq!(decoded.from, "0x1111111111111111111111111111111111111111");
        assert_eq!(decoded.to, "0x2222222222222222222222222222222222222222");
    }

    #[test]
    fn test_reject_unknown_contract() {
        let registry = TokenRegistry::with_defaults();
        let mut log = usdc_log(1);
        log.address = "0x000000000000000000000000000000000000dead".to_string();

        assert!(matches!(
            registry.decode_transfer_log(ChainId::Ethereum, &log),
            Err(DecodeError::UnknownContract(_))
        ));
    }

    #[test]
    fn test_reject_nft_shaped_log() {
        let registry = TokenRegistry::with_defaults();
        let mut log = usdc_log(1);
        log.topics.push(padded("0x05"));
        log.data = "0x".to_string();

        assert_eq!(
            registry.decode_transfer_log(ChainId::Ethereum, &log),
            Err(DecodeError::NonFungible)
        );
    }

    #[test]
    fn test_reject_insufficient_topics() {
        let registry = TokenRegistry::with_defaults();
        let mut log = usdc_log(1);
        log.topics.truncate(2);

        assert_eq!(
            registry.decode_transfer_log(ChainId::Ethereum, &log),
            Err(DecodeError::InsufficientTopics(2))
        );
    }

    #[test]
    fn test_reject_amount_overflow() {
        let registry = TokenRegistry::with_defaults();
        let mut log = usdc_log(1);
        log.data = format!("0x01{}", "00".repeat(31));

        assert_eq!(
            registry.decode_transfer_log(ChainId::Ethereum, &log),
            Err(DecodeError::AmountOverflow)
        );
    }

    #[test]
    fn test_transfer_events_drop_rejects() {
        let registry = TokenRegistry::with_defaults();
        let envelope = LogEnvelope {
            hash: "0xfeed".to_string(),
            gas_price: 25_000_000_000,
            gas_limit: 65_000,
            block_number: 19_000_000,
            timestamp: 1_700_000_000_000,
        };
        let mut unknown = usdc_log(1);
        unknown.address = "0x000000000000000000000000000000000000dead".to_string();
        let mut truncated = usdc_log(1);
        truncated.topics.truncate(1);

        let events = registry.transfer_events(
            ChainId::Ethereum,
            &envelope,
            &[unknown, usdc_log(2_500_000), truncated],
        );

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.hash, "0xfeed");
        assert_eq!(event.value, 0);
        assert_eq!(event.block_number, 19_000_000);
        assert_eq!(event.from, "0x1111111111111111111111111111111111111111");
        assert_eq!(event.token.as_ref().map(|t| t.amount()), Some(2.5));
    }

    #[test]
    fn test_symbol_lookup_is_case_insensitive() {
        let registry = TokenRegistry::with_defaults();
        let usdc = registry.by_symbol(ChainId::Base, "usdc").unwrap();
        assert_eq!(usdc.decimals, 6);
        assert!(registry.by_symbol(ChainId::Base, "WBTC").is_none());
    }

    #[test]
    fn test_fallback_accent_is_stable() {
        assert_eq!(fallback_accent("pepe"), fallback_accent("PEPE"));
        let c = fallback_accent("PEPE");
        for channel in c.to_array() {
            assert!((0.0..=1.0).contains(&channel));
        }
    }
}
