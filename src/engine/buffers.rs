//! Flat per-frame output buffers handed to the renderer
//!
//! Both buffer sets are allocated once for the pool's capacity and rewritten
//! every tick. Only the first `active` entries are meaningful.

use super::particle::TRAIL_LEN;

#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffers {
    /// xyz per particle
    pub positions: Vec<f32>,
    /// rgb per particle
    pub colors: Vec<f32>,
    pub sizes: Vec<f32>,
    pub opacities: Vec<f32>,
    pub energies: Vec<f32>,
    pub whale_flags: Vec<u8>,
    /// Output index → pool slot
    pub index_map: Vec<usize>,
    pub active: usize,
}

impl FrameBuffers {
    pub fn new(capacity: usize) -> Self {
        Self {
            positions: vec![0.0; capacity * 3],
            colors: vec![0.0; capacity * 3],
            sizes: vec![0.0; capacity],
            opacities: vec![0.0; capacity],
            energies: vec![0.0; capacity],
            whale_flags: vec![0; capacity],
            index_map: vec![0; capacity],
            active: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.sizes.len()
    }

    /// Pool slot behind an output index, for hit-testing
    pub fn slot_of(&self, output_index: usize) -> Option<usize> {
        if output_index < self.active {
            Some(self.index_map[output_index])
        } else {
            None
        }
    }

    pub fn position(&self, output_index: usize) -> [f32; 3] {
        let i = output_index * 3;
        [self.positions[i], self.positions[i + 1], self.positions[i + 2]]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrailBuffers {
    /// xyz per sample, `TRAIL_LEN` samples per particle, newest first
    pub positions: Vec<f32>,
    /// Per-sample alpha: freshness × speed visibility × opacity
    pub alphas: Vec<f32>,
    /// rgb per particle
    pub colors: Vec<f32>,
    pub index_map: Vec<usize>,
    pub active: usize,
}

impl TrailBuffers {
    pub fn new(capacity: usize) -> Self {
        Self {
            positions: vec![0.0; capacity * TRAIL_LEN * 3],
            alphas: vec![0.0; capacity * TRAIL_LEN],
            colors: vec![0.0; capacity * 3],
            index_map: vec![0; capacity],
            active: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.index_map.len()
    }

    /// Alphas of one particle's trail, newest first
    pub fn alphas_for(&self, output_index: usize) -> &[f32] {
        let start = output_index * TRAIL_LEN;
        &self.alphas[start..start + TRAIL_LEN]
    }
}
