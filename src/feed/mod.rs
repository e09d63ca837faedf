//! Transaction feeds
//!
//! A feed produces `RawTransactionEvent` batches for one chain and pushes
//! them, together with connection status changes, into a shared mpsc
//! channel. Feeds never touch classifier or engine state; the ingestion hub
//! on the tick side is the only consumer.
//!
//! Providers:
//! - `SyntheticSource`: seeded random traffic shaped by the chain profile
//! - `ReplaySource`: JSONL capture of `RawTransactionEvent`s
//! - `LiveSource`: any `Transport`, wrapped in the reconnect policy with a
//!   permanent fallback to synthetic traffic

pub mod backoff;
pub mod live;
pub mod replay;
pub mod supervisor;
pub mod synthetic;

pub use backoff::{ExponentialBackoff, ReconnectPolicy};
pub use live::{LiveSource, Transport};
pub use replay::{load_replay, ReplaySource};
pub use supervisor::FeedSupervisor;
pub use synthetic::{SyntheticConfig, SyntheticSource};

use crate::chains::ChainId;
use crate::error::FeedError;
use crate::types::RawTransactionEvent;
use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Error(String),
    /// Running on synthetic traffic
    Simulated,
    Disconnected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting { .. } => "reconnecting",
            ConnectionStatus::Error(_) => "error",
            ConnectionStatus::Simulated => "simulated",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Reconnecting { attempt } => write!(f, "reconnecting (attempt {})", attempt),
            ConnectionStatus::Error(msg) => write!(f, "error: {}", msg),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Batch {
        chain: ChainId,
        epoch: u64,
        events: Vec<RawTransactionEvent>,
    },
    Status {
        chain: ChainId,
        epoch: u64,
        status: ConnectionStatus,
    },
}

impl FeedEvent {
    pub fn chain(&self) -> ChainId {
        match self {
            FeedEvent::Batch { chain, .. } | FeedEvent::Status { chain, .. } => *chain,
        }
    }

    pub fn epoch(&self) -> u64 {
        match self {
            FeedEvent::Batch { epoch, .. } | FeedEvent::Status { epoch, .. } => *epoch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Synthetic,
    Replay,
    Live,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Synthetic => "synthetic",
            SourceKind::Replay => "replay",
            SourceKind::Live => "live",
        }
    }
}

/// Sending half handed to a feed; stamps every event with the feed's chain
/// and epoch
#[derive(Debug, Clone)]
pub struct FeedSink {
    chain: ChainId,
    epoch: u64,
    tx: mpsc::Sender<FeedEvent>,
}

impl FeedSink {
    pub fn new(chain: ChainId, tx: mpsc::Sender<FeedEvent>) -> Self {
        Self { chain, epoch: 0, tx }
    }

    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn chain(&self) -> ChainId {
        self.chain
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Send a batch; empty batches are skipped
    pub async fn emit(&self, events: Vec<RawTransactionEvent>) -> Result<(), FeedError> {
        if events.is_empty() {
            return Ok(());
        }
        self.tx
            .send(FeedEvent::Batch {
                chain: self.chain,
                epoch: self.epoch,
                events,
            })
            .await
            .map_err(|_| FeedError::ChannelClosed)
    }

    pub async fn status(&self, status: ConnectionStatus) -> Result<(), FeedError> {
        log::debug!("📡 {} feed status: {}", self.chain, status);
        self.tx
            .send(FeedEvent::Status {
                chain: self.chain,
                epoch: self.epoch,
                status,
            })
            .await
            .map_err(|_| FeedError::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
pub trait FeedSource: Send {
    fn chain(&self) -> ChainId;

    fn kind(&self) -> SourceKind;

    /// Produce events until the source is exhausted or the channel closes
    async fn run(&mut self, sink: FeedSink) -> Result<(), FeedError>;
}
