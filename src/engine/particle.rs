use crate::chains::{ChainId, Rgb};
use glam::Vec3;

pub const TRAIL_LEN: usize = 8;

/// Transaction fields kept on a particle for hit-testing
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleMeta {
    pub hash: String,
    pub symbol: String,
    pub value: f64,
    pub block_number: u64,
    pub timestamp: i64,
}

/// Everything needed to start a particle
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnParams {
    pub position: Vec3,
    pub velocity: Vec3,
    pub color: Rgb,
    /// Size the envelope ramps toward
    pub size: f32,
    pub energy: f32,
    pub max_age: f32,
    pub is_whale: bool,
    pub chain: ChainId,
    pub damping_multiplier: f32,
    pub half_life_multiplier: f32,
    pub meta: Option<ParticleMeta>,
}

impl Default for SpawnParams {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            color: Rgb::new(1.0, 1.0, 1.0),
            size: 0.2,
            energy: 1.0,
            max_age: 6.0,
            is_whale: false,
            chain: ChainId::Ethereum,
            damping_multiplier: 1.0,
            half_life_multiplier: 1.0,
            meta: None,
        }
    }
}

/// One pool slot. `active` is the only authority on liveness; the other
/// fields are left stale when a slot is inactive.
#[derive(Debug, Clone)]
pub struct Particle {
    pub active: bool,
    pub position: Vec3,
    pub velocity: Vec3,
    pub color: Rgb,
    pub size: f32,
    pub target_size: f32,
    pub opacity: f32,
    pub energy: f32,
    pub age: f32,
    pub max_age: f32,
    pub is_whale: bool,
    pub chain: ChainId,
    pub damping_multiplier: f32,
    pub half_life_multiplier: f32,
    /// Whale rise × fall envelope; zero for normal particles
    pub glow: f32,
    pub meta: Option<ParticleMeta>,
    trail: [Vec3; TRAIL_LEN],
    /// Next write index
    trail_head: usize,
    trail_fill: usize,
    pub(crate) trail_timer: f32,
}

impl Particle {
    pub fn inactive() -> Self {
        Self {
            active: false,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            color: Rgb::new(0.0, 0.0, 0.0),
            size: 0.0,
            target_size: 0.0,
            opacity: 0.0,
            energy: 0.0,
            age: 0.0,
            max_age: 1.0,
            is_whale: false,
            chain: ChainId::Ethereum,
            damping_multiplier: 1.0,
            half_life_multiplier: 1.0,
            glow: 0.0,
            meta: None,
            trail: [Vec3::ZERO; TRAIL_LEN],
            trail_head: 0,
            trail_fill: 0,
            trail_timer: 0.0,
        }
    }

    /// Reinitialize this slot in place
    pub(crate) fn reset(&mut self, params: SpawnParams) {
        self.active = true;
        self.position = params.position;
        self.velocity = params.velocity;
        self.color = params.color;
        self.size = 0.0;
        self.target_size = params.size.max(0.0);
        self.opacity = 0.0;
        self.energy = params.energy.clamp(0.0, 1.0);
        self.age = 0.0;
        self.max_age = params.max_age.max(f32::EPSILON);
        self.is_whale = params.is_whale;
        self.chain = params.chain;
        self.damping_multiplier = params.damping_multiplier;
        self.half_life_multiplier = params.half_life_multiplier;
        self.glow = 0.0;
        self.meta = params.meta;
        self.seed_trail(params.position);
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
    }

    /// age / max_age; eviction picks the highest
    pub fn expiry_ratio(&self) -> f32 {
        self.age / self.max_age
    }

    fn seed_trail(&mut self, position: Vec3) {
        self.trail = [position; TRAIL_LEN];
        self.trail_head = 1 % TRAIL_LEN;
        self.trail_fill = 1;
        self.trail_timer = 0.0;
    }

    pub(crate) fn push_trail(&mut self) {
        self.trail[self.trail_head] = self.position;
        self.trail_head = (self.trail_head + 1) % TRAIL_LEN;
        self.trail_fill = (self.trail_fill + 1).min(TRAIL_LEN);
    }

    pub fn trail_fill(&self) -> usize {
        self.trail_fill
    }

    /// Trail sample `k` steps back from the newest (k = 0 is newest)
    pub fn trail_sample(&self, k: usize) -> Vec3 {
        let idx = (self.trail_head + TRAIL_LEN - 1 - (k % TRAIL_LEN)) % TRAIL_LEN;
        self.trail[idx]
    }
}
