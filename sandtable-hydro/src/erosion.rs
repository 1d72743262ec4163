//! Hydraulic erosion: fast-moving water carves the terrain
//!
//! Runs after the water step, reading the cached flow speeds. Height is
//! subtracted unclamped; the orchestrator re-establishes the elevation
//! invariant at tick end.

use crate::water::WaterField;
use glam::Vec2;
use sandtable_terrain::Heightmap;
use serde::{Deserialize, Serialize};

/// Tuning constants for hydraulic erosion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErosionConfig {
    /// Height removed per unit of speed, depth, and time
    pub strength: f32,
    /// Depth required before a cell erodes at all
    pub wet_threshold: f32,
    /// Eroded amount above which sediment particles are seeded
    pub sediment_threshold: f32,
    /// Cap on sediment particles per erosion event
    pub max_sediment_particles: u32,
}

impl Default for ErosionConfig {
    fn default() -> Self {
        Self {
            strength: 1e-3,
            wet_threshold: 0.01,
            sediment_threshold: 1e-3,
            max_sediment_particles: 5,
        }
    }
}

/// A cell that shed noticeable material, used to seed sediment particles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SedimentEvent {
    pub x: u32,
    pub y: u32,
    /// Height removed this tick
    pub amount: f32,
    /// Sediment travel velocity (half the local water velocity)
    pub vel: Vec2,
}

/// Erode the terrain under moving water. Returns the total height
/// removed; events worth a particle effect are appended to `events`
/// (the buffer is cleared first).
pub fn erode(
    terrain: &mut Heightmap,
    water: &WaterField,
    config: &ErosionConfig,
    dt: f32,
    events: &mut Vec<SedimentEvent>,
) -> f64 {
    events.clear();
    if !dt.is_finite() || dt <= 0.0 {
        return 0.0;
    }
    debug_assert_eq!(terrain.width(), water.width());
    debug_assert_eq!(terrain.height(), water.height());

    let mut total = 0.0f64;
    let depths = water.water();
    let flow = water.flow();

    for y in 0..terrain.height() {
        for x in 0..terrain.width() {
            let idx = terrain.index(x, y);
            let depth = depths[idx];
            if depth <= config.wet_threshold {
                continue;
            }

            let speed = flow[idx];
            let eroded = config.strength * speed * depth * dt;
            if eroded <= 0.0 {
                continue;
            }

            terrain.add(x, y, -eroded);
            total += eroded as f64;

            if eroded > config.sediment_threshold {
                events.push(SedimentEvent {
                    x,
                    y,
                    amount: eroded,
                    vel: water.velocity_at(x, y) * 0.5,
                });
            }
        }
    }

    total
}
