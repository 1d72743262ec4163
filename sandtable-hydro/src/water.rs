//! Shallow-water simulation over the sculpted terrain
//!
//! Depth and velocity live in dense per-cell arrays. Each step runs the
//! fixed sequence: rain injection, pressure update from the total
//! surface gradient, semi-Eulerian advection with open boundaries, then
//! evaporation and infiltration. Advection is double-buffered; the
//! per-cell flow speed is cached for rendering and erosion.

use crate::weather::Weather;
use glam::Vec2;
use rand::rngs::StdRng;
use rand::Rng;
use sandtable_terrain::Heightmap;
use serde::{Deserialize, Serialize};

/// Tuning constants for the water simulation. The damping factors are
/// per-tick values calibrated for 60 Hz stepping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterConfig {
    /// Gravitational acceleration driving the pressure update
    pub gravity: f32,
    /// Per-tick velocity damping
    pub friction: f32,
    /// Fraction of a cell's water moved per unit velocity component
    pub transport_rate: f32,
    /// Depth added per second at full precipitation
    pub rain_rate: f32,
    /// Base evaporation depth per second
    pub evaporation_rate: f32,
    /// Ground infiltration depth per second
    pub infiltration_rate: f32,
    /// Depth below which a cell counts as dry
    pub wet_epsilon: f32,
    /// Flow speed above which splash particles may spawn
    pub splash_speed_threshold: f32,
    /// Per-cell chance of a raindrop event while raining
    pub raindrop_chance: f64,
    /// Per-cell chance of a splash event on fast flow
    pub splash_chance: f64,
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self {
            gravity: 9.81,
            friction: 0.95,
            transport_rate: 0.1,
            rain_rate: 1e-3,
            evaporation_rate: 1e-4,
            infiltration_rate: 5e-4,
            wet_epsilon: 1e-3,
            splash_speed_threshold: 0.1,
            raindrop_chance: 0.1,
            splash_chance: 0.05,
        }
    }
}

/// A raindrop sighting, used to seed rain particle effects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RainDrop {
    pub x: u32,
    pub y: u32,
}

/// Fast flow at a cell, used to seed water spray particles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Splash {
    pub x: u32,
    pub y: u32,
    /// Local water velocity at the cell
    pub vel: Vec2,
}

/// Aggregate view of the water state after a step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterStats {
    /// Cells holding more than the wet epsilon
    pub wet_cells: usize,
    /// Sum of all depths
    pub total_water: f64,
    /// Deepest cell
    pub max_depth: f32,
    /// Fastest cell
    pub max_speed: f32,
}

/// Dense water depth and velocity fields over the terrain grid
#[derive(Debug, Clone)]
pub struct WaterField {
    width: u32,
    height: u32,
    config: WaterConfig,
    water: Vec<f32>,
    vel_x: Vec<f32>,
    vel_y: Vec<f32>,
    flow: Vec<f32>,
    scratch: Vec<f32>,
    raindrops: Vec<RainDrop>,
    splashes: Vec<Splash>,
}

impl WaterField {
    /// Create a dry field matching the terrain dimensions
    pub fn new(width: u32, height: u32, config: WaterConfig) -> anyhow::Result<Self> {
        if width <= 1 || height <= 1 {
            return Err(anyhow::anyhow!(
                "Water field dimensions {}x{} are degenerate (need at least 2x2)",
                width,
                height
            ));
        }

        let size = (width * height) as usize;
        Ok(Self {
            width,
            height,
            config,
            water: vec![0.0; size],
            vel_x: vec![0.0; size],
            vel_y: vec![0.0; size],
            flow: vec![0.0; size],
            scratch: vec![0.0; size],
            raindrops: Vec::new(),
            splashes: Vec::new(),
        })
    }

    /// Grid width in cells
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw depth data
    pub fn water(&self) -> &[f32] {
        &self.water
    }

    /// Cached per-cell flow speed from the latest step
    pub fn flow(&self) -> &[f32] {
        &self.flow
    }

    /// Depth at a grid coordinate; out-of-bounds queries return 0
    pub fn depth_at(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.water[(y * self.width + x) as usize]
    }

    /// Water velocity at a grid coordinate; out-of-bounds queries return zero
    pub fn velocity_at(&self, x: u32, y: u32) -> Vec2 {
        if x >= self.width || y >= self.height {
            return Vec2::ZERO;
        }
        let idx = (y * self.width + x) as usize;
        Vec2::new(self.vel_x[idx], self.vel_y[idx])
    }

    /// Pour water onto a cell; out-of-bounds or bad amounts are ignored
    pub fn add_water(&mut self, x: u32, y: u32, amount: f32) {
        if x >= self.width || y >= self.height || !amount.is_finite() || amount <= 0.0 {
            return;
        }
        self.water[(y * self.width + x) as usize] += amount;
    }

    /// Remove water from a cell, clamping at dry
    pub fn drain_water(&mut self, x: u32, y: u32, amount: f32) {
        if x >= self.width || y >= self.height || !amount.is_finite() || amount <= 0.0 {
            return;
        }
        let idx = (y * self.width + x) as usize;
        self.water[idx] = (self.water[idx] - amount).max(0.0);
    }

    /// Advance the water fields by one tick over the given terrain.
    ///
    /// The terrain grid must have the same dimensions as this field.
    pub fn step(&mut self, terrain: &Heightmap, weather: &Weather, dt: f32, rng: &mut StdRng) {
        debug_assert_eq!(terrain.width(), self.width);
        debug_assert_eq!(terrain.height(), self.height);

        self.raindrops.clear();
        self.splashes.clear();
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }

        self.inject_rain(weather, dt, rng);
        self.update_pressure(terrain, dt);
        self.advect();
        self.apply_losses(weather, dt);
        self.cache_flow_and_splash(rng);
    }

    /// Rain falls uniformly; a random sample of wet drops becomes
    /// raindrop events for the particle layer
    fn inject_rain(&mut self, weather: &Weather, dt: f32, rng: &mut StdRng) {
        if weather.precipitation <= 0.0 {
            return;
        }
        let added = weather.precipitation * dt * self.config.rain_rate;

        for y in 0..self.height {
            for x in 0..self.width {
                self.water[(y * self.width + x) as usize] += added;
                if rng.random::<f64>() < self.config.raindrop_chance {
                    self.raindrops.push(RainDrop { x, y });
                }
            }
        }
    }

    /// Accelerate wet cells down the total-surface gradient. Differences
    /// are edge-clamped so shoreline cells on the boundary still drain.
    fn update_pressure(&mut self, terrain: &Heightmap, dt: f32) {
        let g = self.config.gravity;
        let friction = self.config.friction;
        let wet = self.config.wet_epsilon;

        let surface = |terrain: &Heightmap, this: &Self, x: u32, y: u32| -> f32 {
            terrain.get(x, y) + this.water[(y * this.width + x) as usize]
        };

        for y in 0..self.height {
            for x in 0..self.width {
                let idx = (y * self.width + x) as usize;
                if self.water[idx] <= wet {
                    // Dry cells carry no momentum; stale velocity would
                    // keep seeding splashes and erosion
                    self.vel_x[idx] = 0.0;
                    self.vel_y[idx] = 0.0;
                    continue;
                }

                let left = surface(terrain, self, x.saturating_sub(1), y);
                let right = surface(terrain, self, (x + 1).min(self.width - 1), y);
                let up = surface(terrain, self, x, y.saturating_sub(1));
                let down = surface(terrain, self, x, (y + 1).min(self.height - 1));

                let ax = -g * (right - left) / 2.0;
                let ay = -g * (down - up) / 2.0;

                self.vel_x[idx] = (self.vel_x[idx] + ax * dt) * friction;
                self.vel_y[idx] = (self.vel_y[idx] + ay * dt) * friction;
            }
        }
    }

    /// Move water into the 4-neighbor along each velocity component.
    /// Double-buffered; transport past the grid edge is discarded.
    fn advect(&mut self) {
        self.scratch.copy_from_slice(&self.water);
        let rate = self.config.transport_rate;

        for y in 0..self.height {
            for x in 0..self.width {
                let idx = (y * self.width + x) as usize;
                let depth = self.water[idx];
                if depth <= 0.0 {
                    continue;
                }

                let vx = self.vel_x[idx];
                let vy = self.vel_y[idx];
                let mut move_x = rate * depth * vx.abs();
                let mut move_y = rate * depth * vy.abs();

                // Never move more than the cell holds
                let total = move_x + move_y;
                if total > depth && total > 0.0 {
                    let scale = depth / total;
                    move_x *= scale;
                    move_y *= scale;
                }

                if move_x > 0.0 {
                    self.scratch[idx] -= move_x;
                    let tx = x as i64 + if vx > 0.0 { 1 } else { -1 };
                    if tx >= 0 && tx < self.width as i64 {
                        self.scratch[(y * self.width + tx as u32) as usize] += move_x;
                    }
                }
                if move_y > 0.0 {
                    self.scratch[idx] -= move_y;
                    let ty = y as i64 + if vy > 0.0 { 1 } else { -1 };
                    if ty >= 0 && ty < self.height as i64 {
                        self.scratch[(ty as u32 * self.width + x) as usize] += move_y;
                    }
                }
            }
        }

        self.water.copy_from_slice(&self.scratch);
    }

    /// Evaporation scales with temperature and dryness of the air;
    /// infiltration is a constant trickle into the ground
    fn apply_losses(&mut self, weather: &Weather, dt: f32) {
        let evap = (self.config.evaporation_rate
            * dt
            * (weather.temperature_c / 20.0)
            * (1.0 - weather.humidity_pct / 100.0))
            .max(0.0);
        let infil = self.config.infiltration_rate * dt;
        let loss = evap + infil;

        for w in &mut self.water {
            if *w > 0.0 {
                *w = (*w - loss).max(0.0);
            }
        }
    }

    /// Cache flow speeds and sample fast wet cells for splash events
    fn cache_flow_and_splash(&mut self, rng: &mut StdRng) {
        let wet = self.config.wet_epsilon;
        let threshold = self.config.splash_speed_threshold;

        for y in 0..self.height {
            for x in 0..self.width {
                let idx = (y * self.width + x) as usize;
                if self.water[idx] <= wet {
                    self.flow[idx] = 0.0;
                    continue;
                }

                let vx = self.vel_x[idx];
                let vy = self.vel_y[idx];
                let speed = (vx * vx + vy * vy).sqrt();
                self.flow[idx] = speed;

                if speed > threshold && rng.random::<f64>() < self.config.splash_chance {
                    self.splashes.push(Splash {
                        x,
                        y,
                        vel: Vec2::new(vx, vy),
                    });
                }
            }
        }
    }

    /// Raindrop events from the latest step
    pub fn raindrops(&self) -> &[RainDrop] {
        &self.raindrops
    }

    /// Splash events from the latest step
    pub fn splashes(&self) -> &[Splash] {
        &self.splashes
    }

    /// Sum of all depths, accumulated in f64 for conservation checks
    pub fn total_water(&self) -> f64 {
        self.water.iter().map(|&w| w as f64).sum()
    }

    /// Re-establish the depth invariant: every value finite and >= 0
    pub fn clamp_non_negative(&mut self) {
        for w in &mut self.water {
            if !w.is_finite() || *w < 0.0 {
                *w = 0.0;
            }
        }
        for v in self.vel_x.iter_mut().chain(self.vel_y.iter_mut()) {
            if !v.is_finite() {
                *v = 0.0;
            }
        }
    }

    /// Aggregate stats over the current state
    pub fn stats(&self) -> WaterStats {
        let wet = self.config.wet_epsilon;
        let mut wet_cells = 0;
        let mut max_depth = 0.0f32;
        let mut max_speed = 0.0f32;
        for (idx, &w) in self.water.iter().enumerate() {
            if w > wet {
                wet_cells += 1;
            }
            max_depth = max_depth.max(w);
            max_speed = max_speed.max(self.flow[idx]);
        }
        WaterStats {
            wet_cells,
            total_water: self.total_water(),
            max_depth,
            max_speed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use sandtable_terrain::heightmap::HeightmapConfig;

    const DT: f32 = 1.0 / 60.0;

    fn flat_terrain(width: u32, height: u32) -> Heightmap {
        Heightmap::new(HeightmapConfig {
            width,
            height,
            initial_elevation: 0.0,
        })
        .unwrap()
    }

    fn ramp_terrain(width: u32, height: u32) -> Heightmap {
        let mut map = flat_terrain(width, height);
        for y in 0..height {
            for x in 0..width {
                map.set(x, y, 0.5 - x as f32 / (width - 1) as f32);
            }
        }
        map
    }

    #[test]
    fn test_rain_fills_uniformly() {
        let terrain = flat_terrain(10, 10);
        let mut field = WaterField::new(10, 10, WaterConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let weather = Weather {
            precipitation: 1.0,
            ..Default::default()
        };

        for _ in 0..60 {
            field.step(&terrain, &weather, DT, &mut rng);
        }

        // One second of rain at full intensity adds rain_rate depth;
        // evaporation and infiltration take their cut every tick
        let config = WaterConfig::default();
        let evap_per_sec =
            config.evaporation_rate * (20.0 / 20.0) * (1.0 - 50.0 / 100.0);
        let expected = config.rain_rate - evap_per_sec - config.infiltration_rate;
        for &w in field.water() {
            assert!(w > expected * 0.9 && w < expected * 1.1, "depth {}", w);
        }
    }

    #[test]
    fn test_no_rain_means_monotone_water_loss() {
        let terrain = ramp_terrain(12, 8);
        let mut field = WaterField::new(12, 8, WaterConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let weather = Weather::default();

        field.add_water(3, 4, 0.5);
        let mut previous = field.total_water();

        for _ in 0..300 {
            field.step(&terrain, &weather, DT, &mut rng);
            let current = field.total_water();
            assert!(current <= previous + 1e-6);
            previous = current;
        }
    }

    #[test]
    fn test_water_flows_downhill() {
        let width = 10u32;
        let height = 10u32;
        let terrain = ramp_terrain(width, height);
        let mut field = WaterField::new(width, height, WaterConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let weather = Weather::default();

        field.add_water(0, height / 2, 0.5);

        for _ in 0..200 {
            field.step(&terrain, &weather, DT, &mut rng);
        }

        // The source cell drained; water reached the downhill edge
        assert!(field.depth_at(0, height / 2) < 0.05);
        assert!(field.depth_at(width - 1, height / 2) > 0.01);
    }

    #[test]
    fn test_depth_never_negative() {
        let terrain = ramp_terrain(10, 10);
        let mut field = WaterField::new(10, 10, WaterConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let weather = Weather {
            precipitation: 0.3,
            ..Default::default()
        };

        field.add_water(5, 5, 1.0);
        for _ in 0..500 {
            field.step(&terrain, &weather, DT, &mut rng);
            assert!(field.water().iter().all(|&w| w >= 0.0));
        }
    }

    #[test]
    fn test_splash_events_on_fast_flow() {
        let terrain = ramp_terrain(20, 10);
        let mut field = WaterField::new(20, 10, WaterConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let weather = Weather::default();

        // A fat column of water on a slope gets moving quickly
        for y in 0..10 {
            field.add_water(2, y, 0.5);
        }

        let mut saw_splash = false;
        for _ in 0..60 {
            field.step(&terrain, &weather, DT, &mut rng);
            if !field.splashes().is_empty() {
                saw_splash = true;
                for splash in field.splashes() {
                    assert!(splash.vel.length() > field.config.splash_speed_threshold);
                }
            }
        }
        assert!(saw_splash);
    }

    #[test]
    fn test_point_edits_are_bounds_checked() {
        let mut field = WaterField::new(10, 10, WaterConfig::default()).unwrap();

        field.add_water(100, 100, 1.0);
        field.add_water(3, 3, f32::NAN);
        field.add_water(3, 3, -1.0);
        assert_eq!(field.total_water(), 0.0);

        field.add_water(3, 3, 0.25);
        field.drain_water(3, 3, 1.0);
        assert_eq!(field.depth_at(3, 3), 0.0);
    }

    #[test]
    fn test_raindrop_events_only_while_raining() {
        let terrain = flat_terrain(10, 10);
        let mut field = WaterField::new(10, 10, WaterConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(6);

        field.step(&terrain, &Weather::default(), DT, &mut rng);
        assert!(field.raindrops().is_empty());

        let rainy = Weather {
            precipitation: 1.0,
            ..Default::default()
        };
        let mut saw_drop = false;
        for _ in 0..10 {
            field.step(&terrain, &rainy, DT, &mut rng);
            saw_drop |= !field.raindrops().is_empty();
        }
        assert!(saw_drop);
    }
}
