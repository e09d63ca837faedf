//! Live feed wrapper: reconnect policy around an external transport
//!
//! ```text
//! Connecting → connect() ─ok→ Connected → first batch (timeout 4×block) → stream
//!      ↑                                                                   │ error / close
//!      └──── Reconnecting{n} ← backoff 2s, 4s, 8s, 16s, 32s ←──────────────┘
//!                                   │ exhausted
//!                                   ↓
//!                       Simulated (synthetic fallback, rest of session)
//! ```

use super::backoff::{ExponentialBackoff, ReconnectPolicy};
use super::synthetic::SyntheticSource;
use super::{ConnectionStatus, FeedSink, FeedSource, SourceKind};
use crate::chains::ChainId;
use crate::error::FeedError;
use crate::types::RawTransactionEvent;
use async_trait::async_trait;
use tokio::time::timeout;

/// The raw network connection (websocket subscription, HTTP polling, ...)
///
/// Native transfers map straight onto `RawTransactionEvent`. Token transfers
/// arrive as logs and go through `TokenRegistry::transfer_events`, which
/// keeps fungible transfers of known contracts and drops everything else.
#[async_trait]
pub trait Transport: Send {
    async fn connect(&mut self, chain: ChainId) -> Result<(), FeedError>;

    /// Next batch of transactions; `Ok(None)` when the remote closed the stream
    async fn next_batch(&mut self) -> Result<Option<Vec<RawTransactionEvent>>, FeedError>;
}

pub struct LiveSource {
    chain: ChainId,
    transport: Box<dyn Transport>,
    policy: ReconnectPolicy,
    block_time_ms: u64,
    fallback: SyntheticSource,
}

impl LiveSource {
    pub fn new(
        chain: ChainId,
        transport: Box<dyn Transport>,
        block_time_ms: u64,
        fallback: SyntheticSource,
    ) -> Self {
        Self {
            chain,
            transport,
            policy: ReconnectPolicy::default(),
            block_time_ms,
            fallback,
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// One connection lifetime. Returns once the stream fails or closes.
    async fn stream_once(
        &mut self,
        sink: &FeedSink,
        backoff: &mut ExponentialBackoff,
    ) -> Result<(), FeedError> {
        self.transport.connect(self.chain).await?;
        sink.status(ConnectionStatus::Connected).await?;
        log::info!("✅ Connected to {} feed", self.chain);

        let first_wait = ReconnectPolicy::first_event_timeout(self.block_time_ms);
        let first = timeout(first_wait, self.transport.next_batch())
            .await
            .map_err(|_| FeedError::FirstEventTimeout(first_wait.as_millis() as u64))??;

        // only a delivering connection counts as recovered
        backoff.reset();
        match first {
            Some(batch) => sink.emit(batch).await?,
            None => return Err(FeedError::StreamClosed),
        }

        loop {
            match self.transport.next_batch().await? {
                Some(batch) => sink.emit(batch).await?,
                None => return Err(FeedError::StreamClosed),
            }
        }
    }
}

#[async_trait]
impl FeedSource for LiveSource {
    fn chain(&self) -> ChainId {
        self.chain
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Live
    }

    async fn run(&mut self, sink: FeedSink) -> Result<(), FeedError> {
        let mut backoff = ExponentialBackoff::new(self.policy.clone());
        sink.status(ConnectionStatus::Connecting).await?;

        loop {
            match self.stream_once(&sink, &mut backoff).await {
                Err(FeedError::ChannelClosed) => return Err(FeedError::ChannelClosed),
                Err(e) => {
                    log::error!("❌ {} feed error: {}", self.chain, e);
                    sink.status(ConnectionStatus::Error(e.to_string())).await?;
                }
                Ok(()) => {}
            }

            match backoff.sleep().await {
                Ok(attempt) => {
                    sink.status(ConnectionStatus::Reconnecting { attempt }).await?;
                }
                Err(_) => {
                    log::warn!(
                        "⚠️  {} feed gave up after {} attempts, switching to synthetic traffic",
                        self.chain,
                        self.policy.max_attempts
                    );
                    return self.fallback.run(sink).await;
                }
            }
        }
    }
}
