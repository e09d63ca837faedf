//! Fixed-capacity particle pool
//!
//! The pool never allocates after construction: slots are recycled in place
//! and the output buffers are sized to the capacity up front. One `update`
//! call advances every slot by `dt` seconds with frame-rate independent
//! damping and decay, then runs the whale attraction pass against the
//! positions computed in the same call.

pub mod buffers;
pub mod config;
pub mod easing;
pub mod particle;
pub mod spawn;

pub use buffers::{FrameBuffers, TrailBuffers};
pub use config::LifecycleConfig;
pub use particle::{Particle, ParticleMeta, SpawnParams, TRAIL_LEN};
pub use spawn::SpawnPlanner;

use easing::{ease_in_cubic, ease_out_cubic, smoothstep};
use glam::Vec3;
use std::f32::consts::LN_2;

const DISTANCE_EPSILON: f32 = 1e-6;

pub struct ParticlePool {
    particles: Vec<Particle>,
    config: LifecycleConfig,
    /// (position, glow) of whales collected during the current update
    whales: Vec<(Vec3, f32)>,
}

impl ParticlePool {
    pub fn new(config: LifecycleConfig) -> Self {
        let capacity = config.capacity.max(1);
        let max_whales = config.max_whales;
        Self {
            particles: (0..capacity).map(|_| Particle::inactive()).collect(),
            config,
            whales: Vec::with_capacity(max_whales),
        }
    }

    pub fn capacity(&self) -> usize {
        self.particles.len()
    }

    pub fn active_count(&self) -> usize {
        self.particles.iter().filter(|p| p.active).count()
    }

    pub fn whale_count(&self) -> usize {
        self.particles.iter().filter(|p| p.active && p.is_whale).count()
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Swap tuning; applies from the next `update`. Capacity is fixed at
    /// construction and is not changed here.
    pub fn set_config(&mut self, config: LifecycleConfig) {
        self.whales = Vec::with_capacity(config.max_whales);
        self.config = config;
    }

    pub fn particle(&self, slot: usize) -> Option<&Particle> {
        self.particles.get(slot).filter(|p| p.active)
    }

    pub fn frame_buffers(&self) -> FrameBuffers {
        FrameBuffers::new(self.capacity())
    }

    pub fn trail_buffers(&self) -> TrailBuffers {
        TrailBuffers::new(self.capacity())
    }

    /// Place a particle and return its slot
    ///
    /// Uses the first inactive slot, otherwise evicts the most expired
    /// particle. Whales are only evictable by an incoming whale. Returns
    /// `None` when nothing may be evicted (a normal spawn into a pool full of
    /// whales); the caller decides whether to retry later.
    pub fn spawn(&mut self, params: SpawnParams) -> Option<usize> {
        let slot = match self.particles.iter().position(|p| !p.active) {
            Some(free) => free,
            None => self.eviction_candidate(params.is_whale)?,
        };

        if self.particles[slot].active {
            log::trace!(
                "♻️  Evicting slot {} (whale: {}, ratio {:.2})",
                slot,
                self.particles[slot].is_whale,
                self.particles[slot].expiry_ratio()
            );
        }
        self.particles[slot].reset(params);
        Some(slot)
    }

    fn eviction_candidate(&self, incoming_whale: bool) -> Option<usize> {
        self.particles
            .iter()
            .enumerate()
            .filter(|(_, p)| incoming_whale || !p.is_whale)
            .max_by(|(_, a), (_, b)| a.expiry_ratio().total_cmp(&b.expiry_ratio()))
            .map(|(slot, _)| slot)
    }

    pub fn update(&mut self, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }

        let cfg = &self.config;
        let damping_log = cfg.damping_rate.clamp(1e-4, 1.0).ln();
        self.whales.clear();

        for p in self.particles.iter_mut().filter(|p| p.active) {
            p.age += dt;
            if p.age >= p.max_age {
                p.deactivate();
                continue;
            }

            p.trail_timer += dt;
            if p.trail_timer >= cfg.trail_interval {
                p.trail_timer %= cfg.trail_interval.max(f32::EPSILON);
                p.push_trail();
            }

            p.position += p.velocity * dt;
            p.velocity *= (damping_log * p.damping_multiplier * dt).exp();

            let half_life = (cfg.energy_half_life * p.half_life_multiplier).max(1e-3);
            p.energy *= (-dt * LN_2 / half_life).exp();

            let ramp_done = if p.is_whale {
                let rise = ease_in_cubic(p.age / cfg.whale_rise.max(f32::EPSILON));
                let fall = ease_out_cubic((p.max_age - p.age) / cfg.whale_fall.max(f32::EPSILON));
                p.glow = rise * fall;
                p.size = p.target_size * p.glow;
                p.opacity = p.glow;
                p.age >= cfg.whale_rise
            } else {
                let life = p.age / p.max_age;
                let ramp = ease_out_cubic(p.age / cfg.spawn_ramp.max(f32::EPSILON));
                p.size = p.target_size * envelope(ramp, life, cfg.peak_fraction, cfg.size_fade_exponent);

                let opacity = envelope(ramp, life, cfg.peak_fraction, cfg.opacity_fade_exponent);
                let energy_weight = smoothstep(cfg.fade_start, 1.0, life);
                p.opacity = opacity + (opacity * p.energy - opacity) * energy_weight;
                p.age >= cfg.spawn_ramp
            };

            if ramp_done
                && (p.opacity < cfg.min_opacity || p.energy < cfg.min_energy || p.size < cfg.min_size)
            {
                p.deactivate();
                continue;
            }

            if p.is_whale && self.whales.len() < cfg.max_whales {
                self.whales.push((p.position, p.glow));
            }
        }

        if self.whales.is_empty() {
            return;
        }

        for p in self.particles.iter_mut().filter(|p| p.active && !p.is_whale) {
            let mut force = Vec3::ZERO;
            for &(whale_pos, glow) in &self.whales {
                let offset = whale_pos - p.position;
                let dist = offset.length();
                if dist > cfg.attraction_radius || glow <= 0.0 {
                    continue;
                }

                let guarded = dist.max(cfg.min_distance).max(DISTANCE_EPSILON);
                let falloff = 1.0 - smoothstep(0.0, cfg.attraction_radius, dist);
                let magnitude = cfg.attraction_strength * glow * falloff / (guarded * guarded);

                let radial = if dist > DISTANCE_EPSILON {
                    offset / dist
                } else {
                    Vec3::ZERO
                };
                let tangent = radial.cross(Vec3::Y);
                force += (radial * (1.0 - cfg.swirl) + tangent * cfg.swirl) * magnitude;
            }
            p.velocity += force * dt;
        }
    }

    /// Serialize active particles in slot order; returns the count written
    pub fn write_buffers(&self, out: &mut FrameBuffers) -> usize {
        let limit = out.capacity();
        let mut n = 0;

        for (slot, p) in self.particles.iter().enumerate().filter(|(_, p)| p.active) {
            if n >= limit {
                break;
            }
            out.positions[n * 3..n * 3 + 3].copy_from_slice(&p.position.to_array());
            out.colors[n * 3..n * 3 + 3].copy_from_slice(&p.color.to_array());
            out.sizes[n] = p.size;
            out.opacities[n] = p.opacity;
            out.energies[n] = p.energy;
            out.whale_flags[n] = p.is_whale as u8;
            out.index_map[n] = slot;
            n += 1;
        }

        out.active = n;
        n
    }

    /// Serialize trails, newest sample first; returns the particle count
    pub fn write_trail_buffers(&self, out: &mut TrailBuffers) -> usize {
        let limit = out.capacity();
        let speed_ref = self.config.trail_speed_ref.max(f32::EPSILON);
        let mut n = 0;

        for (slot, p) in self.particles.iter().enumerate().filter(|(_, p)| p.active) {
            if n >= limit {
                break;
            }
            let visibility = (p.velocity.length() / speed_ref).clamp(0.0, 1.0);
            let fill = p.trail_fill();

            for k in 0..TRAIL_LEN {
                let sample = n * TRAIL_LEN + k;
                out.positions[sample * 3..sample * 3 + 3]
                    .copy_from_slice(&p.trail_sample(k).to_array());

                let freshness = if k < fill {
                    1.0 - smoothstep(0.0, 1.0, k as f32 / (TRAIL_LEN - 1) as f32)
                } else {
                    0.0
                };
                out.alphas[sample] = freshness * visibility * p.opacity;
            }
            out.colors[n * 3..n * 3 + 3].copy_from_slice(&p.color.to_array());
            out.index_map[n] = slot;
            n += 1;
        }

        out.active = n;
        n
    }
}

/// Spawn ramp until `peak`, then `1 - u^exponent` over the rest of life
fn envelope(ramp: f32, life: f32, peak: f32, exponent: f32) -> f32 {
    if life <= peak {
        return ramp;
    }
    let u = ((life - peak) / (1.0 - peak).max(f32::EPSILON)).clamp(0.0, 1.0);
    ramp * (1.0 - u.powf(exponent))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(capacity: usize) -> ParticlePool {
        ParticlePool::new(LifecycleConfig {
            capacity,
            ..Default::default()
        })
    }

    fn whale_at(position: Vec3) -> SpawnParams {
        SpawnParams {
            position,
            is_whale: true,
            size: 0.6,
            max_age: 10.0,
            ..Default::default()
        }
    }

    fn normal_at(position: Vec3) -> SpawnParams {
        SpawnParams {
            position,
            ..Default::default()
        }
    }

    #[test]
    fn test_capacity_is_never_exceeded() {
        let mut pool = pool(8);
        for i in 0..100 {
            let params = SpawnParams {
                is_whale: i % 5 == 0,
                ..Default::default()
            };
            pool.spawn(params);
            assert!(pool.active_count() <= pool.capacity());
            pool.update(0.05);
        }
        assert_eq!(pool.capacity(), 8);
    }

    #[test]
    fn test_first_fit_uses_inactive_slot() {
        let mut pool = pool(4);
        assert_eq!(pool.spawn(normal_at(Vec3::ZERO)), Some(0));
        assert_eq!(pool.spawn(normal_at(Vec3::ZERO)), Some(1));
        pool.particles[0].deactivate();
        assert_eq!(pool.spawn(normal_at(Vec3::ZERO)), Some(0));
    }

    #[test]
    fn test_eviction_picks_most_expired_non_whale() {
        let mut pool = pool(3);
        pool.spawn(whale_at(Vec3::ZERO));
        pool.spawn(normal_at(Vec3::ZERO));
        pool.spawn(normal_at(Vec3::ZERO));

        pool.particles[0].age = 9.9; // whale, ratio 0.99
        pool.particles[1].age = 1.0;
        pool.particles[2].age = 3.0;

        assert_eq!(pool.spawn(normal_at(Vec3::ONE)), Some(2));
        assert!(pool.particles[0].is_whale && pool.particles[0].active);
    }

    #[test]
    fn test_normal_spawn_into_whale_pool_is_deferred() {
        let mut pool = pool(3);
        for ratio in [0.9, 0.5, 0.1] {
            let slot = pool.spawn(whale_at(Vec3::ZERO)).unwrap();
            pool.particles[slot].age = ratio * pool.particles[slot].max_age;
        }

        assert_eq!(pool.spawn(normal_at(Vec3::ONE)), None);
        assert_eq!(pool.whale_count(), 3);
        assert!((pool.particles[0].expiry_ratio() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_whale_evicts_most_expired_whale() {
        let mut pool = pool(3);
        for ratio in [0.5, 0.9, 0.1] {
            let slot = pool.spawn(whale_at(Vec3::ZERO)).unwrap();
            pool.particles[slot].age = ratio * pool.particles[slot].max_age;
        }

        assert_eq!(pool.spawn(whale_at(Vec3::ONE)), Some(1));
        assert_eq!(pool.particles[1].age, 0.0);
        assert_eq!(pool.particles[1].position, Vec3::ONE);
    }

    #[test]
    fn test_spawn_starts_invisible() {
        let mut pool = pool(2);
        let slot = pool
            .spawn(SpawnParams {
                size: 0.4,
                ..Default::default()
            })
            .unwrap();
        let p = pool.particle(slot).unwrap();
        assert_eq!(p.size, 0.0);
        assert_eq!(p.opacity, 0.0);
        assert_eq!(p.target_size, 0.4);

        pool.update(0.1);
        let p = pool.particle(slot).unwrap();
        assert!(p.size > 0.0 && p.size < 0.4);
    }

    #[test]
    fn test_energy_decay_is_monotonic() {
        let mut pool = pool(1);
        let slot = pool
            .spawn(SpawnParams {
                velocity: Vec3::new(1.0, 0.0, 0.0),
                max_age: 20.0,
                ..Default::default()
            })
            .unwrap();

        let mut last = pool.particle(slot).unwrap().energy;
        for _ in 0..200 {
            pool.update(1.0 / 60.0);
            let Some(p) = pool.particle(slot) else {
                break;
            };
            assert!(p.energy <= last);
            last = p.energy;
        }
    }

    #[test]
    fn test_damping_is_frame_rate_independent() {
        let params = SpawnParams {
            velocity: Vec3::new(2.0, 0.0, 0.0),
            damping_multiplier: 1.3,
            ..Default::default()
        };

        let mut coarse = pool(1);
        coarse.spawn(params.clone());
        coarse.update(0.1);

        let mut fine = pool(1);
        fine.spawn(params);
        for _ in 0..10 {
            fine.update(0.01);
        }

        let a = coarse.particle(0).unwrap().velocity.x;
        let b = fine.particle(0).unwrap().velocity.x;
        assert!((a - b).abs() < 1e-4, "{} vs {}", a, b);
    }

    #[test]
    fn test_max_age_deactivates() {
        let mut pool = pool(1);
        pool.spawn(SpawnParams {
            max_age: 0.5,
            ..Default::default()
        });
        pool.update(0.3);
        assert_eq!(pool.active_count(), 1);
        pool.update(0.3);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_early_death_waits_for_ramp() {
        let mut pool = pool(1);
        pool.spawn(SpawnParams {
            energy: 0.001,
            ..Default::default()
        });
        // energy is below the floor from the start but the ramp protects it
        pool.update(0.1);
        assert_eq!(pool.active_count(), 1);
        pool.update(0.3);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_whale_attracts_and_swirls() {
        let mut pool = pool(2);
        pool.spawn(whale_at(Vec3::ZERO));
        let slot = pool.spawn(normal_at(Vec3::new(2.0, 0.0, 0.0))).unwrap();

        for _ in 0..10 {
            pool.update(0.1);
        }

        let p = pool.particle(slot).unwrap();
        assert!(p.velocity.x < 0.0, "pulled toward whale: {:?}", p.velocity);
        assert!(p.velocity.z < 0.0, "swirls around whale: {:?}", p.velocity);
        assert!(pool.particle(0).unwrap().glow > 0.0);
    }

    #[test]
    fn test_attraction_ignores_distant_particles() {
        let mut pool = pool(2);
        pool.spawn(whale_at(Vec3::ZERO));
        let slot = pool.spawn(normal_at(Vec3::new(50.0, 0.0, 0.0))).unwrap();

        for _ in 0..10 {
            pool.update(0.1);
        }
        assert_eq!(pool.particle(slot).unwrap().velocity, Vec3::ZERO);
    }

    #[test]
    fn test_write_buffers_maps_slots() {
        let mut pool = pool(4);
        pool.spawn(normal_at(Vec3::new(1.0, 2.0, 3.0)));
        pool.spawn(whale_at(Vec3::ZERO));
        pool.spawn(normal_at(Vec3::new(4.0, 5.0, 6.0)));
        pool.particles[1].deactivate();

        let mut out = pool.frame_buffers();
        assert_eq!(pool.write_buffers(&mut out), 2);
        assert_eq!(out.active, 2);
        assert_eq!(out.slot_of(0), Some(0));
        assert_eq!(out.slot_of(1), Some(2));
        assert_eq!(out.slot_of(2), None);
        assert_eq!(out.position(1), [4.0, 5.0, 6.0]);
        assert_eq!(out.whale_flags[0], 0);
    }

    #[test]
    fn test_trail_buffers_fade_and_fill() {
        let mut pool = pool(1);
        pool.spawn(SpawnParams {
            velocity: Vec3::new(4.0, 0.0, 0.0),
            ..Default::default()
        });

        let mut out = pool.trail_buffers();
        assert_eq!(pool.write_trail_buffers(&mut out), 1);
        // fresh spawn: only the seeded sample counts, and opacity is still 0
        assert!(out.alphas_for(0).iter().all(|a| *a == 0.0));

        for _ in 0..30 {
            pool.update(0.02);
        }
        pool.write_trail_buffers(&mut out);
        let alphas = out.alphas_for(0);
        assert!(alphas[0] > 0.0);
        for pair in alphas.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
        assert_eq!(alphas[TRAIL_LEN - 1], 0.0);
    }

    /// Opacity of a fresh normal particle evaluated at `age`
    fn normal_opacity_at(energy: f32, age: f32) -> f32 {
        let mut pool = pool(1);
        let slot = pool
            .spawn(SpawnParams {
                energy,
                ..Default::default()
            })
            .unwrap();
        pool.particles[slot].age = age - 0.01;
        pool.update(0.01);
        pool.particle(slot).unwrap().opacity
    }

    /// Glow of a long-lived whale evaluated at `age`
    fn whale_glow_at(max_age: f32, age: f32) -> f32 {
        let mut pool = pool(1);
        let slot = pool
            .spawn(SpawnParams {
                max_age,
                half_life_multiplier: 100.0,
                ..whale_at(Vec3::ZERO)
            })
            .unwrap();
        pool.particles[slot].age = age - 0.01;
        pool.update(0.01);
        pool.particle(slot).unwrap().glow
    }

    #[test]
    fn test_energy_keeps_fading_particles_visible() {
        let cfg = LifecycleConfig::default();
        let max_age = SpawnParams::default().max_age;

        // before fade_start energy has no say
        let early = max_age * 0.4;
        assert!(early / max_age < cfg.fade_start);
        assert_eq!(normal_opacity_at(1.0, early), normal_opacity_at(0.5, early));

        let late = max_age * 0.8;
        let bright = normal_opacity_at(1.0, late);
        let dim = normal_opacity_at(0.5, late);
        assert!(bright > dim, "{} vs {}", bright, dim);
        assert!(dim > cfg.min_opacity);

        // the blend weight grows toward the end of life
        let later = max_age * 0.9;
        let ratio_late = dim / bright;
        let ratio_later = normal_opacity_at(0.5, later) / normal_opacity_at(1.0, later);
        assert!(ratio_later < ratio_late);
    }

    #[test]
    fn test_whale_glow_rises_holds_and_falls() {
        let cfg = LifecycleConfig::default();

        let rise: Vec<f32> = [0.2, 0.4, 0.7].iter().map(|a| whale_glow_at(10.0, *a)).collect();
        assert!(rise[0] < rise[1] && rise[1] < rise[2] && rise[2] < 1.0, "{:?}", rise);

        for age in [cfg.whale_rise + 0.1, 5.0, 10.0 - cfg.whale_fall - 0.1] {
            assert!((whale_glow_at(10.0, age) - 1.0).abs() < 1e-5, "age {}", age);
        }

        let fall: Vec<f32> = [1.2, 0.7, 0.2]
            .iter()
            .map(|remaining| whale_glow_at(10.0, 10.0 - remaining))
            .collect();
        assert!(fall[0] > fall[1] && fall[1] > fall[2] && fall[2] > 0.0, "{:?}", fall);
        assert!(fall[0] < 1.0);
    }

    #[test]
    fn test_whale_glow_keyed_on_remaining_life() {
        for age in [0.2, 0.5] {
            let a = whale_glow_at(10.0, age);
            let b = whale_glow_at(14.0, age);
            assert!((a - b).abs() < 1e-4, "rise at {}: {} vs {}", age, a, b);
        }
        for remaining in [1.2, 0.6, 0.2] {
            let a = whale_glow_at(10.0, 10.0 - remaining);
            let b = whale_glow_at(14.0, 14.0 - remaining);
            assert!((a - b).abs() < 1e-3, "fall at {}: {} vs {}", remaining, a, b);
        }
    }
}
