//! Adaptive per-key whale detection
//!
//! Each detection key (`chain` or `chain:SYMBOL`) keeps its own sample ring.
//! Until a key has seen enough samples it is "cold" and uses the static
//! threshold; once warm the bar is the 95th percentile of recent magnitudes
//! amplified by 2.0, never below the static threshold.
//!
//! A cooldown after each trigger doubles the bar so a burst of large
//! transfers produces one alert instead of dozens.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct WhaleDetectorConfig {
    /// Samples kept per key
    pub capacity: usize,
    /// Samples needed before the percentile threshold is used
    pub warm_samples: usize,
    pub percentile: f64,
    pub amplification: f64,
    pub cooldown_ms: i64,
    /// Threshold multiplier applied while cooling down
    pub cooldown_multiplier: f64,
}

impl Default for WhaleDetectorConfig {
    fn default() -> Self {
        Self {
            capacity: 200,
            warm_samples: 20,
            percentile: 0.95,
            amplification: 2.0,
            cooldown_ms: 3_000,
            cooldown_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct DetectorState {
    samples: Vec<f64>,
    head: usize,
    sorted: Vec<f64>,
    sorted_dirty: bool,
    last_trigger_ms: Option<i64>,
}

impl DetectorState {
    fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            head: 0,
            sorted: Vec::with_capacity(capacity),
            sorted_dirty: false,
            last_trigger_ms: None,
        }
    }

    fn push(&mut self, value: f64, capacity: usize) {
        if self.samples.len() < capacity {
            self.samples.push(value);
        } else {
            self.samples[self.head] = value;
        }
        self.head = (self.head + 1) % capacity;
        self.sorted_dirty = true;
    }

    fn percentile(&mut self, p: f64) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        if self.sorted_dirty {
            self.sorted.clear();
            self.sorted.extend_from_slice(&self.samples);
            self.sorted.sort_by(|a, b| a.total_cmp(b));
            self.sorted_dirty = false;
        }
        let n = self.sorted.len();
        let idx = ((p * n as f64).floor() as usize).min(n - 1);
        Some(self.sorted[idx])
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WhaleDetector {
    states: HashMap<String, DetectorState>,
    config: WhaleDetectorConfig,
}

impl WhaleDetector {
    pub fn new(config: WhaleDetectorConfig) -> Self {
        Self {
            states: HashMap::new(),
            config: WhaleDetectorConfig {
                capacity: config.capacity.max(1),
                ..config
            },
        }
    }

    /// Record a magnitude for `key`
    pub fn observe(&mut self, key: &str, value: f64) {
        if !value.is_finite() {
            return;
        }
        let capacity = self.config.capacity.max(1);
        self.state_mut(key).push(value, capacity);
    }

    /// Current whale bar for `key` in asset units
    ///
    /// `floor_units` is the user's USD floor already converted to asset units
    /// (None when no floor is set or no price is known).
    pub fn threshold(&mut self, key: &str, static_threshold: f64, floor_units: Option<f64>) -> f64 {
        let warm_samples = self.config.warm_samples;
        let percentile = self.config.percentile;
        let amplification = self.config.amplification;

        let base = match self.states.get_mut(key) {
            Some(state) if state.samples.len() >= warm_samples => state
                .percentile(percentile)
                .map(|p| (p * amplification).max(static_threshold))
                .unwrap_or(static_threshold),
            _ => static_threshold,
        };

        match floor_units {
            Some(floor) if floor.is_finite() => base.max(floor),
            _ => base,
        }
    }

    /// Decide whether `value` is a whale for `key` at `now_ms`
    ///
    /// Does not record the sample; call `observe` first. A positive result
    /// starts the key's cooldown.
    pub fn is_whale(
        &mut self,
        key: &str,
        value: f64,
        static_threshold: f64,
        floor_units: Option<f64>,
        now_ms: i64,
    ) -> bool {
        let mut bar = self.threshold(key, static_threshold, floor_units);

        let cooldown_ms = self.config.cooldown_ms;
        let cooling = self
            .states
            .get(key)
            .and_then(|s| s.last_trigger_ms)
            .map(|last| now_ms - last < cooldown_ms)
            .unwrap_or(false);
        if cooling {
            bar *= self.config.cooldown_multiplier;
        }

        let fired = value >= bar;
        if fired {
            self.state_mut(key).last_trigger_ms = Some(now_ms);
        }
        fired
    }

    pub fn is_warm(&self, key: &str) -> bool {
        self.sample_count(key) >= self.config.warm_samples
    }

    pub fn sample_count(&self, key: &str) -> usize {
        self.states.get(key).map(|s| s.samples.len()).unwrap_or(0)
    }

    pub fn key_count(&self) -> usize {
        self.states.len()
    }

    pub fn config(&self) -> &WhaleDetectorConfig {
        &self.config
    }

    fn state_mut(&mut self, key: &str) -> &mut DetectorState {
        let capacity = self.config.capacity;
        self.states
            .entry(key.to_string())
            .or_insert_with(|| DetectorState::new(capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "ethereum";

    #[test]
    fn test_cold_detector_uses_static_threshold() {
        let mut detector = WhaleDetector::default();

        detector.observe(KEY, 5.0);
        assert!(detector.is_whale(KEY, 5.0, 5.0, None, 0));

        let mut detector = WhaleDetector::default();
        detector.observe(KEY, 4.999);
        assert!(!detector.is_whale(KEY, 4.999, 5.0, None, 0));
    }

    #[test]
    fn test_warm_detector_uses_amplified_percentile() {
        let mut detector = WhaleDetector::default();

        // 180 small samples then 20 at 8.0: p95 (index 190) is 8.0
        for _ in 0..180 {
            detector.observe(KEY, 1.0);
        }
        for _ in 0..20 {
            detector.observe(KEY, 8.0);
        }
        assert!(detector.is_warm(KEY));
        assert_eq!(detector.threshold(KEY, 5.0, None), 16.0);

        detector.observe(KEY, 14.999);
        assert!(!detector.is_whale(KEY, 14.999, 5.0, None, 1_000));

        detector.observe(KEY, 16.0);
        assert!(detector.is_whale(KEY, 16.0, 5.0, None, 2_000));
    }

    #[test]
    fn test_static_threshold_is_a_floor_when_warm() {
        let mut detector = WhaleDetector::default();
        for _ in 0..50 {
            detector.observe(KEY, 0.1);
        }
        assert_eq!(detector.threshold(KEY, 5.0, None), 5.0);
    }

    #[test]
    fn test_usd_floor_raises_threshold() {
        let mut detector = WhaleDetector::default();
        assert_eq!(detector.threshold(KEY, 5.0, Some(12.5)), 12.5);
        assert_eq!(detector.threshold(KEY, 5.0, Some(1.0)), 5.0);
    }

    #[test]
    fn test_cooldown_doubles_bar() {
        let mut detector = WhaleDetector::default();

        assert!(detector.is_whale(KEY, 6.0, 5.0, None, 10_000));
        // within 3s: needs 10.0
        assert!(!detector.is_whale(KEY, 9.0, 5.0, None, 11_000));
        assert!(detector.is_whale(KEY, 10.0, 5.0, None, 12_000));
        // cooldown restarted at 12_000; 15_000 is outside it
        assert!(detector.is_whale(KEY, 5.0, 5.0, None, 15_000));
    }

    #[test]
    fn test_keys_are_independent() {
        let mut detector = WhaleDetector::default();
        assert!(detector.is_whale("ethereum", 6.0, 5.0, None, 0));
        assert!(detector.is_whale("ethereum:USDC", 6.0, 5.0, None, 0));
        assert_eq!(detector.key_count(), 2);
    }

    #[test]
    fn test_ring_buffer_keeps_last_capacity_samples() {
        let mut detector = WhaleDetector::new(WhaleDetectorConfig {
            capacity: 4,
            warm_samples: 4,
            ..Default::default()
        });
        for v in [100.0, 100.0, 100.0, 100.0, 1.0, 1.0, 1.0, 1.0] {
            detector.observe(KEY, v);
        }
        assert_eq!(detector.sample_count(KEY), 4);
        // old 100s were overwritten: bar is 1.0 * 2.0, floored by static 0.5
        assert_eq!(detector.threshold(KEY, 0.5, None), 2.0);
    }
}
