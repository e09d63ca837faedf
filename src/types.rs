//! Transaction records flowing through the pipeline

use crate::chains::{ChainId, Rgb};
use serde::{Deserialize, Serialize};

/// ERC-20 style token movement attached to a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    pub contract: String,
    /// Raw integer amount (before applying `decimals`)
    pub raw_amount: u128,
    pub decimals: u8,
    pub symbol: String,
    pub is_stablecoin: bool,
}

impl TokenTransfer {
    pub fn amount(&self) -> f64 {
        scale_down(self.raw_amount, self.decimals)
    }
}

/// Transaction as delivered by a source adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransactionEvent {
    pub hash: String,
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    /// Native value in base units (wei)
    pub value: u128,
    /// Gas price in base units (wei)
    pub gas_price: u128,
    pub gas_limit: u64,
    pub block_number: u64,
    pub chain: ChainId,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    #[serde(default)]
    pub token: Option<TokenTransfer>,
}

/// Visual parameters derived by the classifier, all in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualDescriptor {
    pub size: f32,
    pub intensity: f32,
    pub heat: f32,
    pub color: Rgb,
}

/// Transaction reduced to display units and tagged for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedTransaction {
    pub hash: String,
    pub from: String,
    pub to: Option<String>,
    /// Value in human units (native coin, or token amount for transfers)
    pub value: f64,
    pub gas_price_gwei: f64,
    pub gas_limit: u64,
    pub block_number: u64,
    pub chain: ChainId,
    pub timestamp: i64,
    pub token: Option<TokenTransfer>,
    /// Asset symbol the value is expressed in
    pub symbol: String,
    pub is_whale: bool,
    pub visual: VisualDescriptor,
}

impl ClassifiedTransaction {
    /// Whale-detection key: `chain` for native, `chain:SYMBOL` for tokens
    pub fn detection_key(&self) -> String {
        detection_key(self.chain, self.token.as_ref())
    }
}

pub fn detection_key(chain: ChainId, token: Option<&TokenTransfer>) -> String {
    match token {
        Some(t) => format!("{}:{}", chain.as_str(), t.symbol.to_uppercase()),
        None => chain.as_str().to_string(),
    }
}

/// Convert a raw integer amount to human units
pub fn scale_down(raw: u128, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}
