//! Sandtable Simulation Core
//!
//! The orchestrating crate of the sandtable: owns the heightmap, the
//! water fields, the weather, and the particle pool, and advances them
//! in a fixed order once per tick. Hosts talk to [`SandboxSim`] through
//! queued commands and read-only snapshots; a tick is a synchronous,
//! bounded computation with no suspension points.

pub mod commands;
pub mod particles;

pub use commands::Command;
pub use particles::{Particle, ParticleKind, ParticlePool, DEFAULT_POOL_CAPACITY};

use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sandtable_hydro::{
    erode, ErosionConfig, SedimentEvent, WaterConfig, WaterField, Weather, WeatherUpdate,
};
use sandtable_terrain::{
    extract_contours, BrushKind, BrushStroke, ColorRamp, ContourSegment, Heightmap,
    HeightmapConfig, SandConfig, SandSimulator,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Nominal step length; larger ticks are split into sub-steps so the
/// per-tick damping constants keep their 60 Hz meaning
const NOMINAL_STEP: f32 = 1.0 / 60.0;

/// Ticks longer than this are sub-stepped
const MAX_SINGLE_STEP: f32 = 1.0 / 30.0;

/// Hard cap on simulated time per tick; hosts dropping frames for
/// longer than this just lose the remainder
const MAX_TICK_SECONDS: f32 = 1.0;

/// Errors from the read surface
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimError {
    /// The color buffer does not match the grid
    #[error("color buffer holds {actual} bytes but the grid needs {expected}")]
    ColorBufferSize { expected: usize, actual: usize },
}

/// Configuration for the whole simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Terrain grid settings
    pub terrain: HeightmapConfig,
    /// Height-to-color mapping
    pub ramp: ColorRamp,
    /// Water solver tuning
    pub water: WaterConfig,
    /// Sand automaton tuning
    pub sand: SandConfig,
    /// Erosion tuning
    pub erosion: ErosionConfig,
    /// Fixed particle pool size
    pub pool_capacity: usize,
    /// Seed for all stochastic effects; runs with equal seeds and equal
    /// command streams are identical
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            terrain: HeightmapConfig::default(),
            ramp: ColorRamp::topographic(),
            water: WaterConfig::default(),
            sand: SandConfig::default(),
            erosion: ErosionConfig::default(),
            pool_capacity: DEFAULT_POOL_CAPACITY,
            seed: 12345,
        }
    }
}

/// What one tick did, for host-side diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickStats {
    /// Sub-steps the tick was split into
    pub sub_steps: u32,
    /// Commands drained from the queue
    pub commands_drained: usize,
    /// Particles spawned across all effects
    pub particles_spawned: usize,
    /// Wet cells after the tick
    pub wet_cells: usize,
    /// Total height removed by erosion
    pub eroded_height: f64,
}

/// The simulation handle owning all state
///
/// External observers may read snapshots and iterate particles only
/// between ticks; [`SandboxSim::tick`] takes `&mut self`, so the borrow
/// checker enforces exactly that.
pub struct SandboxSim {
    config: SimConfig,
    terrain: Heightmap,
    water: WaterField,
    weather: Weather,
    sand: SandSimulator,
    pool: ParticlePool,
    commands: VecDeque<Command>,
    sediment_events: Vec<SedimentEvent>,
    rng: StdRng,
}

impl SandboxSim {
    /// Create a simulation with a flat starting terrain
    pub fn new(config: SimConfig) -> anyhow::Result<Self> {
        let terrain = Heightmap::new(config.terrain.clone())?;
        Self::with_terrain(config, terrain)
    }

    /// Create a simulation starting from an existing heightmap. The
    /// dimension settings in the config are ignored in favor of the
    /// heightmap's own.
    pub fn with_terrain(config: SimConfig, terrain: Heightmap) -> anyhow::Result<Self> {
        let water = WaterField::new(terrain.width(), terrain.height(), config.water.clone())?;
        let sand = SandSimulator::new(config.sand.clone());
        let pool = ParticlePool::new(config.pool_capacity);
        let rng = StdRng::seed_from_u64(config.seed);

        Ok(Self {
            config,
            terrain,
            water,
            weather: Weather::default(),
            sand,
            pool,
            commands: VecDeque::new(),
            sediment_events: Vec::new(),
            rng,
        })
    }

    /// Queue a sculpting stroke for the next tick
    pub fn enqueue_brush(&mut self, cx: f32, cy: f32, radius: f32, intensity: f32, kind: BrushKind) {
        self.commands
            .push_back(Command::Brush(BrushStroke::new(cx, cy, radius, intensity, kind)));
    }

    /// Queue a partial weather change for the next tick
    pub fn set_weather(&mut self, update: WeatherUpdate) {
        self.commands.push_back(Command::Weather(update));
    }

    /// Queue pouring water onto a cell
    pub fn add_water(&mut self, x: u32, y: u32, amount: f32) {
        self.commands.push_back(Command::AddWater { x, y, amount });
    }

    /// Queue draining water from a cell
    pub fn drain_water(&mut self, x: u32, y: u32, amount: f32) {
        self.commands.push_back(Command::DrainWater { x, y, amount });
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// The tick is total: bad inputs are sanitized, commands are drained
    /// in FIFO order, and the grid invariants hold when it returns.
    /// Ticks longer than 1/30 s run as equal sub-steps of at most
    /// 1/60 s each.
    pub fn tick(&mut self, dt: f32) -> TickStats {
        let mut stats = TickStats::default();

        stats.commands_drained = self.drain_commands();

        let dt = if dt.is_finite() {
            dt.clamp(0.0, MAX_TICK_SECONDS)
        } else {
            0.0
        };
        if dt <= 0.0 {
            return stats;
        }

        let sub_steps = if dt > MAX_SINGLE_STEP {
            (dt / NOMINAL_STEP).ceil() as u32
        } else {
            1
        };
        let sub_dt = dt / sub_steps as f32;
        stats.sub_steps = sub_steps;

        for _ in 0..sub_steps {
            self.sub_step(sub_dt, &mut stats);
        }

        stats.wet_cells = self.water.stats().wet_cells;
        stats
    }

    /// One fixed-order physics step
    fn sub_step(&mut self, dt: f32, stats: &mut TickStats) {
        // Sand avalanches, seeding debris particles
        self.sand.step(&mut self.terrain, dt);
        stats.particles_spawned += seed_sand_particles(
            &mut self.pool,
            &mut self.rng,
            &self.terrain,
            self.sand.spills(),
        );

        // Water: rain, pressure, advection, losses
        self.water
            .step(&self.terrain, &self.weather, dt, &mut self.rng);
        stats.particles_spawned += seed_rain_particles(
            &mut self.pool,
            &mut self.rng,
            &self.terrain,
            self.weather.wind_vector(),
            self.water.raindrops(),
        );
        stats.particles_spawned += seed_splash_particles(
            &mut self.pool,
            &mut self.rng,
            &self.terrain,
            &self.water,
        );

        // Fast water carves the terrain
        stats.eroded_height += erode(
            &mut self.terrain,
            &self.water,
            &self.config.erosion,
            dt,
            &mut self.sediment_events,
        );
        stats.particles_spawned += seed_sediment_particles(
            &mut self.pool,
            &mut self.rng,
            &self.terrain,
            &self.config.erosion,
            &self.sediment_events,
        );

        // Ambient drift; hard wind lofts dust off dry ground
        self.weather.drift(dt, &mut self.rng);
        stats.particles_spawned += seed_dust_particles(
            &mut self.pool,
            &mut self.rng,
            &self.terrain,
            &self.water,
            &self.weather,
            dt,
        );

        // Particle kinematics under the new wind
        self.pool.update(dt, self.weather.wind_vector());

        // Re-establish the field invariants before the tick returns
        self.terrain.clamp_to_limits();
        self.water.clamp_non_negative();
    }

    /// Apply every queued command in arrival order
    fn drain_commands(&mut self) -> usize {
        let mut drained = 0;
        while let Some(command) = self.commands.pop_front() {
            match command {
                Command::Brush(stroke) => stroke.apply(&mut self.terrain),
                Command::Weather(update) => self.weather.apply(&update),
                Command::AddWater { x, y, amount } => self.water.add_water(x, y, amount),
                Command::DrainWater { x, y, amount } => self.water.drain_water(x, y, amount),
            }
            drained += 1;
        }
        drained
    }

    /// The sculpted terrain, valid until the next tick
    pub fn snapshot_height(&self) -> &[f32] {
        self.terrain.data()
    }

    /// Water depths above the terrain, valid until the next tick
    pub fn snapshot_water(&self) -> &[f32] {
        self.water.water()
    }

    /// The terrain grid itself, for samplers and contour consumers
    pub fn heightmap(&self) -> &Heightmap {
        &self.terrain
    }

    /// Current ambient weather
    pub fn weather(&self) -> &Weather {
        &self.weather
    }

    /// Iterate the live particles
    pub fn iter_particles(&self) -> impl Iterator<Item = &Particle> {
        self.pool.iter_active()
    }

    /// Number of live particles
    pub fn particle_count(&self) -> usize {
        self.pool.active_count()
    }

    /// Extract contour segments at fixed elevation intervals
    pub fn extract_contours(
        &self,
        interval: f32,
        min_level: f32,
        max_level: f32,
    ) -> Vec<ContourSegment> {
        extract_contours(&self.terrain, interval, min_level, max_level)
    }

    /// Fill an RGB8 buffer (3 bytes per cell, row-major) with the
    /// height-mapped terrain colors
    pub fn render_color_field(&self, buffer: &mut [u8]) -> Result<(), SimError> {
        let expected = self.terrain.len() * 3;
        if buffer.len() != expected {
            return Err(SimError::ColorBufferSize {
                expected,
                actual: buffer.len(),
            });
        }

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            buffer
                .par_chunks_exact_mut(3)
                .zip(self.terrain.data().par_iter())
                .for_each(|(pixel, &h)| {
                    pixel.copy_from_slice(&self.config.ramp.color_at(h));
                });
        }

        #[cfg(not(feature = "parallel"))]
        for (pixel, &h) in buffer.chunks_exact_mut(3).zip(self.terrain.data().iter()) {
            pixel.copy_from_slice(&self.config.ramp.color_at(h));
        }

        Ok(())
    }

    /// The active configuration
    pub fn config(&self) -> &SimConfig {
        &self.config
    }
}

/// Debris kicked up where avalanching sand lands
fn seed_sand_particles(
    pool: &mut ParticlePool,
    rng: &mut StdRng,
    terrain: &Heightmap,
    spills: &[sandtable_terrain::SandSpill],
) -> usize {
    let mut spawned = 0;
    for spill in spills {
        let count = ((spill.amount * 100.0).floor() as u32).min(10);
        for _ in 0..count {
            let pos = Vec3::new(
                spill.x as f32 + rng.random_range(-0.3..0.3),
                spill.y as f32 + rng.random_range(-0.3..0.3),
                terrain.get(spill.x, spill.y).max(0.0),
            );
            let vel = Vec3::new(
                rng.random_range(-0.25..0.25),
                rng.random_range(-0.25..0.25),
                rng.random_range(0.5..1.5),
            );
            let life = rng.random_range(2.0..5.0);
            let size = rng.random_range(0.3..0.8);
            if pool
                .spawn(ParticleKind::Sand, pos, vel, life, size, [194, 178, 128])
                .is_some()
            {
                spawned += 1;
            }
        }
    }
    spawned
}

/// Falling drops sampled from the rain field
fn seed_rain_particles(
    pool: &mut ParticlePool,
    rng: &mut StdRng,
    terrain: &Heightmap,
    wind: Vec2,
    drops: &[sandtable_hydro::RainDrop],
) -> usize {
    let mut spawned = 0;
    for drop in drops {
        let pos = Vec3::new(
            drop.x as f32 + rng.random_range(-0.5..0.5),
            drop.y as f32 + rng.random_range(-0.5..0.5),
            terrain.get(drop.x, drop.y).max(0.0) + 2.0,
        );
        let vel = Vec3::new(wind.x * 0.1, wind.y * 0.1, rng.random_range(-4.0..-2.0));
        let life = rng.random_range(1.0..2.0);
        let size = rng.random_range(0.1..0.2);
        if pool
            .spawn(ParticleKind::Rain, pos, vel, life, size, [100, 150, 255])
            .is_some()
        {
            spawned += 1;
        }
    }
    spawned
}

/// Spray thrown off fast-flowing water
fn seed_splash_particles(
    pool: &mut ParticlePool,
    rng: &mut StdRng,
    terrain: &Heightmap,
    water: &WaterField,
) -> usize {
    let mut spawned = 0;
    let splashes = water.splashes();
    for splash in splashes {
        let surface = terrain.get(splash.x, splash.y) + water.depth_at(splash.x, splash.y);
        let pos = Vec3::new(splash.x as f32, splash.y as f32, surface.max(0.0));
        let vel = Vec3::new(
            splash.vel.x + rng.random_range(-0.1..0.1),
            splash.vel.y + rng.random_range(-0.1..0.1),
            rng.random_range(0.5..1.0),
        );
        let life = rng.random_range(0.5..1.5);
        let size = rng.random_range(0.2..0.4);
        if pool
            .spawn(ParticleKind::Water, pos, vel, life, size, [120, 170, 255])
            .is_some()
        {
            spawned += 1;
        }
    }
    spawned
}

/// Wind speed above which dry ground sheds dust
const DUST_WIND_THRESHOLD: f32 = 10.0;

/// Dust lofted off dry cells when the wind picks up
fn seed_dust_particles(
    pool: &mut ParticlePool,
    rng: &mut StdRng,
    terrain: &Heightmap,
    water: &WaterField,
    weather: &Weather,
    dt: f32,
) -> usize {
    if weather.wind_speed <= DUST_WIND_THRESHOLD {
        return 0;
    }
    let wind = weather.wind_vector();
    let attempts = ((weather.wind_speed - DUST_WIND_THRESHOLD) * 10.0 * dt).ceil() as u32;

    let mut spawned = 0;
    for _ in 0..attempts {
        let x = rng.random_range(0..terrain.width());
        let y = rng.random_range(0..terrain.height());
        // Wet ground holds its dust down
        if water.depth_at(x, y) > 0.0 {
            continue;
        }

        let pos = Vec3::new(x as f32, y as f32, terrain.get(x, y).max(0.0) + 0.1);
        let vel = Vec3::new(
            wind.x * 0.2 + rng.random_range(-0.2..0.2),
            wind.y * 0.2 + rng.random_range(-0.2..0.2),
            rng.random_range(0.2..0.6),
        );
        let life = rng.random_range(1.0..3.0);
        let size = rng.random_range(0.1..0.3);
        if pool
            .spawn(ParticleKind::Dust, pos, vel, life, size, [180, 170, 150])
            .is_some()
        {
            spawned += 1;
        }
    }
    spawned
}

/// Carved material riding the flow that freed it
fn seed_sediment_particles(
    pool: &mut ParticlePool,
    rng: &mut StdRng,
    terrain: &Heightmap,
    config: &ErosionConfig,
    events: &[SedimentEvent],
) -> usize {
    let mut spawned = 0;
    for event in events {
        let count = ((event.amount / config.sediment_threshold).floor() as u32)
            .max(1)
            .min(config.max_sediment_particles);
        for _ in 0..count {
            let pos = Vec3::new(
                event.x as f32 + rng.random_range(-0.2..0.2),
                event.y as f32 + rng.random_range(-0.2..0.2),
                terrain.get(event.x, event.y).max(0.0),
            );
            let vel = Vec3::new(event.vel.x, event.vel.y, 0.0);
            let life = rng.random_range(1.0..3.0);
            let size = rng.random_range(0.2..0.5);
            if pool
                .spawn(ParticleKind::Sediment, pos, vel, life, size, [139, 115, 85])
                .is_some()
            {
                spawned += 1;
            }
        }
    }
    spawned
}
