//! Angle-of-repose sand automaton
//!
//! Interior cells whose slope to any 8-neighbor exceeds the talus angle
//! shed material to their lower neighbors. The pass is double-buffered
//! and blended with a relaxation factor, so steep piles settle over a
//! few ticks instead of snapping flat.

use crate::heightmap::Heightmap;
use serde::{Deserialize, Serialize};

/// The 8-neighborhood with center distances
const NEIGHBORS: [(i64, i64, f32); 8] = [
    (-1, -1, std::f32::consts::SQRT_2),
    (0, -1, 1.0),
    (1, -1, std::f32::consts::SQRT_2),
    (-1, 0, 1.0),
    (1, 0, 1.0),
    (-1, 1, std::f32::consts::SQRT_2),
    (0, 1, 1.0),
    (1, 1, std::f32::consts::SQRT_2),
];

/// Configuration for the sand automaton
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandConfig {
    /// Maximum stable slope angle in degrees
    pub talus_angle_deg: f32,
    /// Fraction of the excess moved per second
    pub flow_rate: f32,
    /// Hard cap on material moved out of one cell per pass. Empirical;
    /// avalanche shape depends on it.
    pub max_flow: f32,
    /// Blend factor between the old surface and the redistributed one
    pub relaxation: f32,
    /// At most this many lower neighbors receive material
    pub max_recipients: usize,
}

impl Default for SandConfig {
    fn default() -> Self {
        Self {
            talus_angle_deg: 35.0,
            flow_rate: 0.1,
            max_flow: 0.01,
            relaxation: 0.1,
            max_recipients: 4,
        }
    }
}

/// Material delivered to a cell during a pass, used to seed sand
/// particle effects
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SandSpill {
    /// Recipient cell x
    pub x: u32,
    /// Recipient cell y
    pub y: u32,
    /// Material amount delivered (pre-relaxation)
    pub amount: f32,
}

/// Double-buffered slope relaxation over a heightmap
#[derive(Debug)]
pub struct SandSimulator {
    config: SandConfig,
    talus: f32,
    scratch: Vec<f32>,
    spills: Vec<SandSpill>,
}

impl SandSimulator {
    /// Create a simulator for the given configuration
    pub fn new(config: SandConfig) -> Self {
        let talus = config.talus_angle_deg.to_radians().tan();
        Self {
            config,
            talus,
            scratch: Vec::new(),
            spills: Vec::new(),
        }
    }

    /// The active configuration
    pub fn config(&self) -> &SandConfig {
        &self.config
    }

    /// Run one relaxation pass. Returns the spill events of this pass;
    /// the slice is valid until the next call.
    ///
    /// Boundary cells are neither sources nor recipients, so the 1-cell
    /// halo is untouched and the pass conserves mass exactly (up to
    /// float rounding).
    pub fn step(&mut self, map: &mut Heightmap, dt: f32) -> &[SandSpill] {
        self.spills.clear();
        if !dt.is_finite() || dt <= 0.0 {
            return &self.spills;
        }

        let (width, height) = (map.width(), map.height());
        self.scratch.clear();
        self.scratch.extend_from_slice(map.data());

        // Up to 4 recipients per cell
        let mut lower: Vec<(u32, u32, f32, f32)> = Vec::with_capacity(8);

        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let h = map.get(x, y);

                let mut max_slope = 0.0f32;
                for &(dx, dy, dist) in &NEIGHBORS {
                    let nh = map.get((x as i64 + dx) as u32, (y as i64 + dy) as u32);
                    max_slope = max_slope.max((h - nh).abs() / dist);
                }
                if max_slope <= self.talus {
                    continue;
                }

                lower.clear();
                for &(dx, dy, dist) in &NEIGHBORS {
                    let nx = (x as i64 + dx) as u32;
                    let ny = (y as i64 + dy) as u32;
                    // Halo cells never receive material
                    if nx == 0 || ny == 0 || nx == width - 1 || ny == height - 1 {
                        continue;
                    }
                    let nh = map.get(nx, ny);
                    if nh < h {
                        lower.push((nx, ny, nh, dist));
                    }
                }
                if lower.is_empty() {
                    continue;
                }

                lower.sort_by(|a, b| a.2.total_cmp(&b.2));
                lower.truncate(self.config.max_recipients);

                let excess = h - lower[0].2;
                let moved = (excess * self.config.flow_rate * dt).min(self.config.max_flow);
                if moved <= 0.0 {
                    continue;
                }

                let total_weight: f32 = lower.iter().map(|&(_, _, nh, d)| (h - nh) / d).sum();
                if total_weight <= 0.0 {
                    continue;
                }

                let idx = map.index(x, y);
                self.scratch[idx] -= moved;
                for &(nx, ny, nh, d) in &lower {
                    let share = moved * ((h - nh) / d) / total_weight;
                    self.scratch[map.index(nx, ny)] += share;
                    self.spills.push(SandSpill {
                        x: nx,
                        y: ny,
                        amount: share,
                    });
                }
            }
        }

        // A stable surface stays bit-identical
        if self.spills.is_empty() {
            return &self.spills;
        }

        // Relaxation blend toward the redistributed surface. Only the
        // interior can have changed, so the halo is left bit-stable.
        let relax = self.config.relaxation;
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let idx = map.index(x, y);
                let blended = map.get(x, y) * (1.0 - relax) + self.scratch[idx] * relax;
                map.set(x, y, blended);
            }
        }

        &self.spills
    }

    /// Spill events from the most recent pass
    pub fn spills(&self) -> &[SandSpill] {
        &self.spills
    }
}
