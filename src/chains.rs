//! Chain identities, palettes and motion personalities

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainId {
    Ethereum,
    Polygon,
    Arbitrum,
    Optimism,
    Base,
    Bsc,
}

impl ChainId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainId::Ethereum => "ethereum",
            ChainId::Polygon => "polygon",
            ChainId::Arbitrum => "arbitrum",
            ChainId::Optimism => "optimism",
            ChainId::Base => "base",
            ChainId::Bsc => "bsc",
        }
    }

    pub fn all() -> [ChainId; 6] {
        [
            ChainId::Ethereum,
            ChainId::Polygon,
            ChainId::Arbitrum,
            ChainId::Optimism,
            ChainId::Base,
            ChainId::Bsc,
        ]
    }
}

/// Accepts canonical names and common tickers, case-insensitively
impl FromStr for ChainId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ethereum" | "eth" => Ok(ChainId::Ethereum),
            "polygon" | "matic" => Ok(ChainId::Polygon),
            "arbitrum" | "arb" => Ok(ChainId::Arbitrum),
            "optimism" | "op" => Ok(ChainId::Optimism),
            "base" => Ok(ChainId::Base),
            "bsc" | "bnb" => Ok(ChainId::Bsc),
            _ => Err(ConfigError::UnknownChain(s.trim().to_string())),
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linear RGB color with channels in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Build from a packed 0xRRGGBB value
    pub fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as f32 / 255.0,
            g: ((hex >> 8) & 0xFF) as f32 / 255.0,
            b: (hex & 0xFF) as f32 / 255.0,
        }
    }

    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        Rgb {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
        }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// Per-chain motion multipliers. 1.0 everywhere is "neutral".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Personality {
    pub speed: f32,
    pub damping: f32,
    pub glow: f32,
    pub spread: f32,
    pub smoothing: f32,
    pub energy_half_life: f32,
}

impl Default for Personality {
    fn default() -> Self {
        Self {
            speed: 1.0,
            damping: 1.0,
            glow: 1.0,
            spread: 1.0,
            smoothing: 1.0,
            energy_half_life: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainProfile {
    pub chain: ChainId,
    pub native_symbol: String,
    pub native_decimals: u8,
    /// Static whale threshold in native units, used while the detector is cold
    pub whale_threshold: f64,
    pub block_time_ms: u64,
    pub primary: Rgb,
    pub accent: Rgb,
    /// Log-scale ceiling for native value normalization
    pub value_ceiling: f64,
    /// Identifier used for USD price lookups
    pub price_id: String,
    pub personality: Personality,
}

impl ChainProfile {
    pub fn defaults_for(chain: ChainId) -> Self {
        match chain {
            ChainId::Ethereum => Self {
                chain,
                native_symbol: "ETH".to_string(),
                native_decimals: 18,
                whale_threshold: 100.0,
                block_time_ms: 12_000,
                primary: Rgb::from_hex(0x627EEA),
                accent: Rgb::from_hex(0xC0CCFF),
                value_ceiling: 1_000.0,
                price_id: "ethereum".to_string(),
                personality: Personality {
                    speed: 0.8,
                    damping: 1.2,
                    glow: 1.2,
                    spread: 1.0,
                    smoothing: 1.2,
                    energy_half_life: 1.3,
                },
            },
            ChainId::Polygon => Self {
                chain,
                native_symbol: "POL".to_string(),
                native_decimals: 18,
                whale_threshold: 100_000.0,
                block_time_ms: 2_000,
                primary: Rgb::from_hex(0x8247E5),
                accent: Rgb::from_hex(0xC9A7FF),
                value_ceiling: 1_000_000.0,
                price_id: "polygon-ecosystem-token".to_string(),
                personality: Personality {
                    speed: 1.1,
                    damping: 0.9,
                    glow: 0.9,
                    spread: 1.2,
                    smoothing: 0.9,
                    energy_half_life: 0.9,
                },
            },
            ChainId::Arbitrum => Self {
                chain,
                native_symbol: "ETH".to_string(),
                native_decimals: 18,
                whale_threshold: 50.0,
                block_time_ms: 250,
                primary: Rgb::from_hex(0x28A0F0),
                accent: Rgb::from_hex(0x9FD8FF),
                value_ceiling: 1_000.0,
                price_id: "ethereum".to_string(),
                personality: Personality {
                    speed: 1.3,
                    damping: 0.8,
                    glow: 1.0,
                    spread: 0.9,
                    smoothing: 0.8,
                    energy_half_life: 0.8,
                },
            },
            ChainId::Optimism => Self {
                chain,
                native_symbol: "ETH".to_string(),
                native_decimals: 18,
                whale_threshold: 50.0,
                block_time_ms: 2_000,
                primary: Rgb::from_hex(0xFF0420),
                accent: Rgb::from_hex(0xFF9AA6),
                value_ceiling: 1_000.0,
                price_id: "ethereum".to_string(),
                personality: Personality {
                    speed: 1.0,
                    damping: 1.0,
                    glow: 1.1,
                    spread: 1.0,
                    smoothing: 1.0,
                    energy_half_life: 1.0,
                },
            },
            ChainId::Base => Self {
                chain,
                native_symbol: "ETH".to_string(),
                native_decimals: 18,
                whale_threshold: 50.0,
                block_time_ms: 2_000,
                primary: Rgb::from_hex(0x0052FF),
                accent: Rgb::from_hex(0x7FA8FF),
                value_ceiling: 1_000.0,
                price_id: "ethereum".to_string(),
                personality: Personality {
                    speed: 1.05,
                    damping: 1.0,
                    glow: 1.0,
                    spread: 1.1,
                    smoothing: 1.0,
                    energy_half_life: 1.0,
                },
            },
            ChainId::Bsc => Self {
                chain,
                native_symbol: "BNB".to_string(),
                native_decimals: 18,
                whale_threshold: 500.0,
                block_time_ms: 3_000,
                primary: Rgb::from_hex(0xF0B90B),
                accent: Rgb::from_hex(0xFFE08A),
                value_ceiling: 10_000.0,
                price_id: "binancecoin".to_string(),
                personality: Personality {
                    speed: 1.2,
                    damping: 0.85,
                    glow: 0.95,
                    spread: 1.15,
                    smoothing: 0.9,
                    energy_half_life: 0.85,
                },
            },
        }
    }

    /// Apply the non-empty fields of an override on top of this profile
    pub fn apply(&mut self, o: &ChainProfileOverride) {
        if let Some(v) = o.whale_threshold {
            self.whale_threshold = v;
        }
        if let Some(v) = o.block_time_ms {
            self.block_time_ms = v;
        }
        if let Some(v) = o.primary {
            self.primary = v;
        }
        if let Some(v) = o.accent {
            self.accent = v;
        }
        if let Some(v) = o.value_ceiling {
            self.value_ceiling = v;
        }
        if let Some(v) = o.personality {
            self.personality = v;
        }
    }
}

/// Partial chain profile read from the JSON profile file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainProfileOverride {
    pub whale_threshold: Option<f64>,
    pub block_time_ms: Option<u64>,
    pub primary: Option<Rgb>,
    pub accent: Option<Rgb>,
    pub value_ceiling: Option<f64>,
    pub personality: Option<Personality>,
}
