//! Replay of captured transactions
//!
//! Input is JSONL, one `RawTransactionEvent` per line (blank lines ignored).
//! A replay source keeps the events for its chain and re-emits them one block
//! at a time, paced by the chain's block time divided by `speed`.

use super::{ConnectionStatus, FeedSink, FeedSource, SourceKind};
use crate::chains::ChainId;
use crate::error::FeedError;
use crate::types::RawTransactionEvent;
use async_trait::async_trait;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;

/// Load a JSONL capture; any malformed line fails the load
pub fn load_replay(path: impl AsRef<Path>) -> Result<Vec<RawTransactionEvent>, FeedError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut events = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let event = serde_json::from_str(trimmed).map_err(|source| FeedError::ReplayLine {
            line: index + 1,
            source,
        })?;
        events.push(event);
    }

    log::info!(
        "📼 Loaded {} replay events from {}",
        events.len(),
        path.as_ref().display()
    );
    Ok(events)
}

pub struct ReplaySource {
    chain: ChainId,
    blocks: Vec<Vec<RawTransactionEvent>>,
    block_time_ms: u64,
    speed: f64,
    repeat: bool,
}

impl ReplaySource {
    /// Keep `chain`'s events, grouped into consecutive blocks
    pub fn new(chain: ChainId, events: &[RawTransactionEvent], block_time_ms: u64) -> Self {
        let mut blocks: Vec<Vec<RawTransactionEvent>> = Vec::new();
        for event in events.iter().filter(|e| e.chain == chain) {
            match blocks.last_mut() {
                Some(block) if block[0].block_number == event.block_number => {
                    block.push(event.clone())
                }
                _ => blocks.push(vec![event.clone()]),
            }
        }

        Self {
            chain,
            blocks,
            block_time_ms,
            speed: 1.0,
            repeat: false,
        }
    }

    /// Playback speed multiplier; 0 disables pacing
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed.max(0.0);
        self
    }

    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    fn pace(&self) -> Option<Duration> {
        if self.speed <= 0.0 {
            return None;
        }
        Some(Duration::from_millis(
            (self.block_time_ms as f64 / self.speed) as u64,
        ))
    }
}

#[async_trait]
impl FeedSource for ReplaySource {
    fn chain(&self) -> ChainId {
        self.chain
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Replay
    }

    async fn run(&mut self, sink: FeedSink) -> Result<(), FeedError> {
        log::info!(
            "📼 Replaying {} blocks for {} (speed {}x, repeat: {})",
            self.blocks.len(),
            self.chain,
            self.speed,
            self.repeat
        );
        sink.status(ConnectionStatus::Connected).await?;

        loop {
            for block in &self.blocks {
                sink.emit(block.clone()).await?;
                if let Some(delay) = self.pace() {
                    sleep(delay).await;
                }
            }
            if !self.repeat || self.blocks.is_empty() {
                break;
            }
        }

        log::info!("📼 Replay for {} finished", self.chain);
        sink.status(ConnectionStatus::Disconnected).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedEvent;
    use std::io::Write;
    use tokio::sync::mpsc;

    fn event(chain: ChainId, block: u64, n: u32) -> RawTransactionEvent {
        RawTransactionEvent {
            hash: format!("0x{}{}", block, n),
            from: "0x1".to_string(),
            to: None,
            value: 1_000,
            gas_price: 1_000_000_000,
            gas_limit: 21_000,
            block_number: block,
            chain,
            timestamp: 0,
            token: None,
        }
    }

    #[test]
    fn test_load_replay_reports_bad_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", serde_json::to_string(&event(ChainId::Base, 1, 0)).unwrap()).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "{{not json").unwrap();

        match load_replay(file.path()) {
            Err(FeedError::ReplayLine { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected ReplayLine error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_replay_missing_file() {
        assert!(matches!(
            load_replay("/nonexistent/chainflow.jsonl"),
            Err(FeedError::Replay(_))
        ));
    }

    #[test]
    fn test_groups_blocks_per_chain() {
        let events = vec![
            event(ChainId::Ethereum, 1, 0),
            event(ChainId::Ethereum, 1, 1),
            event(ChainId::Polygon, 9, 0),
            event(ChainId::Ethereum, 2, 0),
        ];
        let source = ReplaySource::new(ChainId::Ethereum, &events, 12_000);
        assert_eq!(source.block_count(), 2);
        assert_eq!(source.blocks[0].len(), 2);
    }

    #[tokio::test]
    async fn test_replay_emits_blocks_then_disconnects() {
        let events = vec![
            event(ChainId::Base, 1, 0),
            event(ChainId::Base, 1, 1),
            event(ChainId::Base, 2, 0),
        ];
        let mut source = ReplaySource::new(ChainId::Base, &events, 2_000).with_speed(0.0);
        let (tx, mut rx) = mpsc::channel(16);

        source.run(FeedSink::new(ChainId::Base, tx)).await.unwrap();

        let mut received = Vec::new();
        while let Ok(event) = rx.try_recv() {
            received.push(event);
        }
        assert_eq!(received.len(), 4);
        assert!(matches!(
            &received[1],
            FeedEvent::Batch { events, .. } if events.len() == 2
        ));
        assert_eq!(
            received[3],
            FeedEvent::Status {
                chain: ChainId::Base,
                epoch: 0,
                status: ConnectionStatus::Disconnected
            }
        );
    }
}
