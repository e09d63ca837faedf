use crate::error::FeedError;
use std::time::Duration;
use tokio::time::sleep;

const FIRST_EVENT_BLOCKS: u64 = 4;
const FIRST_EVENT_MIN_MS: u64 = 8_000;
const FIRST_EVENT_MAX_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay_ms: u64,
    pub multiplier: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2_000,
            multiplier: 2,
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry `attempt` (0-based)
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        self.initial_delay_ms
            .saturating_mul(self.multiplier.saturating_pow(attempt))
    }

    /// How long to wait for the first event after connecting: four block
    /// times, clamped to [8s, 60s]
    pub fn first_event_timeout(block_time_ms: u64) -> Duration {
        let ms = block_time_ms
            .saturating_mul(FIRST_EVENT_BLOCKS)
            .clamp(FIRST_EVENT_MIN_MS, FIRST_EVENT_MAX_MS);
        Duration::from_millis(ms)
    }
}

#[derive(Debug)]
pub struct ExponentialBackoff {
    policy: ReconnectPolicy,
    current_attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            current_attempt: 0,
        }
    }

    /// Sleep for the next delay; fails once every attempt is used
    pub async fn sleep(&mut self) -> Result<u32, FeedError> {
        if self.current_attempt >= self.policy.max_attempts {
            return Err(FeedError::MaxRetries);
        }

        let delay = self.policy.delay_ms(self.current_attempt);
        log::warn!(
            "⏳ Retry attempt {} of {} in {}ms",
            self.current_attempt + 1,
            self.policy.max_attempts,
            delay
        );

        sleep(Duration::from_millis(delay)).await;
        self.current_attempt += 1;
        Ok(self.current_attempt)
    }

    pub fn attempt(&self) -> u32 {
        self.current_attempt
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }
}
