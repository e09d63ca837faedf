use thiserror::Error;

use crate::chains::ChainId;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    #[error("Failed to read profile file {path}: {source}")]
    ProfileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse profile file: {0}")]
    ProfileParse(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timed out after {0}ms waiting for first event")]
    FirstEventTimeout(u64),

    #[error("Stream closed by remote")]
    StreamClosed,

    #[error("Maximum retry attempts exceeded")]
    MaxRetries,

    #[error("Feed channel closed")]
    ChannelClosed,

    #[error("Replay file error: {0}")]
    Replay(#[from] std::io::Error),

    #[error("Malformed replay line {line}: {source}")]
    ReplayLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug, PartialEq)]
pub enum ClassifyError {
    #[error("Empty transaction hash on {0}")]
    MissingHash(ChainId),

    #[error("Unsupported token decimals: {0}")]
    UnsupportedDecimals(u8),

    #[error("Non-finite value for {0}")]
    NonFiniteValue(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("Log has {0} topics, a transfer needs at least 3")]
    InsufficientTopics(usize),

    #[error("NFT-shaped transfer log (indexed token id)")]
    NonFungible,

    #[error("Unknown token contract {0}")]
    UnknownContract(String),

    #[error("Not a Transfer event")]
    NotTransfer,

    #[error("Invalid hex payload: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("Transfer amount exceeds 128 bits")]
    AmountOverflow,
}

#[derive(Error, Debug)]
pub enum PriceError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Price API error: {0}")]
    Api(String),
}
