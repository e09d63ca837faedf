//! Turns classified transactions into spawn parameters
//!
//! Each chain owns a cluster on a ring around the origin. Particles start
//! scattered inside their chain's cluster and fly outward at a speed scaled
//! by the chain's personality and its current activity level. Whales start at
//! the cluster center and barely move so the rest of the swarm can orbit them.

use super::config::LifecycleConfig;
use super::particle::{ParticleMeta, SpawnParams};
use crate::chains::{ChainId, ChainProfile};
use crate::types::ClassifiedTransaction;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

/// Activity multiplier bounds applied to spawn speed
const ACTIVITY_MIN: f64 = 0.5;
const ACTIVITY_MAX: f64 = 3.0;
const WHALE_DRIFT: f32 = 0.1;

pub struct SpawnPlanner {
    rng: StdRng,
}

impl SpawnPlanner {
    /// Seeded planners produce identical layouts for identical input
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn cluster_center(chain: ChainId, radius: f32) -> Vec3 {
        let chains = ChainId::all();
        let index = chains.iter().position(|c| *c == chain).unwrap_or(0);
        let angle = index as f32 / chains.len() as f32 * TAU;
        Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius)
    }

    pub fn plan(
        &mut self,
        tx: &ClassifiedTransaction,
        profile: &ChainProfile,
        activity_level: f64,
        cfg: &LifecycleConfig,
    ) -> SpawnParams {
        let personality = &profile.personality;
        let visual = &tx.visual;
        let center = Self::cluster_center(tx.chain, cfg.cluster_radius);
        let activity = activity_level.clamp(ACTIVITY_MIN, ACTIVITY_MAX) as f32;

        let meta = Some(ParticleMeta {
            hash: tx.hash.clone(),
            symbol: tx.symbol.clone(),
            value: tx.value,
            block_number: tx.block_number,
            timestamp: tx.timestamp,
        });

        if tx.is_whale {
            return SpawnParams {
                position: center,
                velocity: self.unit_vector() * WHALE_DRIFT * personality.speed,
                color: visual.color,
                size: cfg.whale_size * (1.0 + visual.size) * personality.glow,
                energy: 1.0,
                max_age: cfg.whale_max_age,
                is_whale: true,
                chain: tx.chain,
                damping_multiplier: personality.damping,
                half_life_multiplier: personality.energy_half_life,
                meta,
            };
        }

        let spread = cfg.spawn_spread * personality.spread;
        let offset = self.unit_vector() * spread * self.rng.gen_range(0.0f32..1.0).sqrt();
        let direction = (offset + self.unit_vector() * 0.5).normalize_or_zero();
        let speed = cfg.base_speed * personality.speed * activity * (0.6 + 0.4 * visual.intensity);

        SpawnParams {
            position: center + offset,
            velocity: direction * speed,
            color: visual.color,
            size: cfg.base_size + cfg.size_range * visual.size,
            energy: 0.4 + 0.6 * visual.intensity,
            max_age: cfg.base_max_age * (0.7 + 0.6 * visual.intensity),
            is_whale: false,
            chain: tx.chain,
            damping_multiplier: personality.damping,
            half_life_multiplier: personality.energy_half_life,
            meta,
        }
    }

    fn unit_vector(&mut self) -> Vec3 {
        let theta = self.rng.gen_range(0.0..TAU);
        let z: f32 = self.rng.gen_range(-1.0..1.0);
        let r = (1.0 - z * z).sqrt();
        Vec3::new(r * theta.cos(), z, r * theta.sin())
    }
}
