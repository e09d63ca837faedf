use serde::Deserialize;

/// Tuning for the particle lifecycle. Times are seconds, distances are world
/// units. Every field has a default so profile files can override a subset.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LifecycleConfig {
    pub capacity: usize,
    /// Seconds between trail samples
    pub trail_interval: f32,
    /// Fraction of velocity left after one second
    pub damping_rate: f32,
    pub energy_half_life: f32,

    /// Spawn ease duration for normal particles
    pub spawn_ramp: f32,
    /// Fraction of life at which normal particles start shrinking
    pub peak_fraction: f32,
    pub size_fade_exponent: f32,
    pub opacity_fade_exponent: f32,
    /// Fraction of life after which opacity follows energy
    pub fade_start: f32,

    pub min_opacity: f32,
    pub min_energy: f32,
    pub min_size: f32,

    pub whale_rise: f32,
    pub whale_fall: f32,
    pub max_whales: usize,

    pub attraction_radius: f32,
    pub attraction_strength: f32,
    /// 0 = pure pull, 1 = pure orbit
    pub swirl: f32,
    pub min_distance: f32,

    /// Speed at which trails reach full visibility
    pub trail_speed_ref: f32,

    pub cluster_radius: f32,
    pub spawn_spread: f32,
    pub base_speed: f32,
    pub base_size: f32,
    pub size_range: f32,
    pub whale_size: f32,
    pub base_max_age: f32,
    pub whale_max_age: f32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            capacity: 2_000,
            trail_interval: 0.06,
            damping_rate: 0.35,
            energy_half_life: 2.5,

            spawn_ramp: 0.35,
            peak_fraction: 0.6,
            size_fade_exponent: 2.0,
            opacity_fade_exponent: 1.5,
            fade_start: 0.5,

            min_opacity: 0.01,
            min_energy: 0.02,
            min_size: 0.005,

            whale_rise: 0.8,
            whale_fall: 1.5,
            max_whales: 6,

            attraction_radius: 6.0,
            attraction_strength: 2.5,
            swirl: 0.35,
            min_distance: 0.5,

            trail_speed_ref: 2.0,

            cluster_radius: 8.0,
            spawn_spread: 1.5,
            base_speed: 1.5,
            base_size: 0.08,
            size_range: 0.25,
            whale_size: 0.6,
            base_max_age: 6.0,
            whale_max_age: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override() {
        let cfg: LifecycleConfig =
            serde_json::from_str(r#"{"capacity": 64, "swirl": 0.8}"#).unwrap();
        assert_eq!(cfg.capacity, 64);
        assert_eq!(cfg.swirl, 0.8);
        assert_eq!(cfg.trail_interval, 0.06);
        assert_eq!(cfg.max_whales, 6);
    }
}
