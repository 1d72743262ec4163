//! Fixed-capacity particle pool
//!
//! Particles are never allocated at runtime: the pool is pre-sized and
//! spawning reuses inactive slots. When every slot is active, the
//! particle with the least life left is reclaimed, so effects degrade
//! gracefully under pressure instead of growing memory.

use glam::{Vec2, Vec3};

/// Default pool size
pub const DEFAULT_POOL_CAPACITY: usize = 1000;

/// Downward acceleration on airborne particles
const GRAVITY: f32 = 9.81;

/// Per-tick velocity damping, calibrated for 60 Hz stepping
const AIR_DRAG: f32 = 0.98;

/// Lateral velocity kept after ground contact
const GROUND_DAMPING: f32 = 0.5;

/// How strongly wind pushes dust
const WIND_COUPLING: f32 = 0.5;

/// What a particle represents visually
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ParticleKind {
    /// Avalanche debris
    Sand = 0,
    /// Spray from fast-moving water
    Water = 1,
    /// Falling rain
    Rain = 2,
    /// Material carved out by erosion
    Sediment = 3,
    /// Wind-borne dust
    Dust = 4,
}

/// A single pooled particle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    /// Position: x, y in grid coordinates, z is elevation
    pub pos: Vec3,
    /// Velocity in grid units per second
    pub vel: Vec3,
    /// Seconds of life remaining
    pub life: f32,
    /// Life at spawn time
    pub max_life: f32,
    /// Render size
    pub size: f32,
    /// RGB8 tint
    pub color: [u8; 3],
    /// Visual kind
    pub kind: ParticleKind,
    /// Whether the slot is in use
    pub active: bool,
}

impl Particle {
    /// Fade factor for renderers, 1 at spawn and 0 at expiry
    pub fn opacity(&self) -> f32 {
        if self.max_life <= 0.0 {
            return 0.0;
        }
        (self.life / self.max_life).clamp(0.0, 1.0)
    }

    fn inactive() -> Self {
        Self {
            pos: Vec3::ZERO,
            vel: Vec3::ZERO,
            life: 0.0,
            max_life: 0.0,
            size: 0.0,
            color: [0, 0, 0],
            kind: ParticleKind::Sand,
            active: false,
        }
    }
}

/// Pre-sized pool of typed particles
#[derive(Debug, Clone)]
pub struct ParticlePool {
    particles: Vec<Particle>,
}

impl ParticlePool {
    /// Create a pool with the given fixed capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            particles: vec![Particle::inactive(); capacity],
        }
    }

    /// The fixed capacity of the pool
    pub fn capacity(&self) -> usize {
        self.particles.len()
    }

    /// Number of active particles
    pub fn active_count(&self) -> usize {
        self.particles.iter().filter(|p| p.active).count()
    }

    /// Spawn a particle, reusing the first inactive slot. With the pool
    /// full, the active particle with the smallest remaining life is
    /// reclaimed (the first such slot on ties). Returns the slot used,
    /// or `None` only for a zero-capacity pool.
    pub fn spawn(
        &mut self,
        kind: ParticleKind,
        pos: Vec3,
        vel: Vec3,
        life: f32,
        size: f32,
        color: [u8; 3],
    ) -> Option<usize> {
        let slot = match self.particles.iter().position(|p| !p.active) {
            Some(idx) => idx,
            None => {
                let mut best: Option<(usize, f32)> = None;
                for (idx, p) in self.particles.iter().enumerate() {
                    match best {
                        Some((_, life)) if p.life >= life => {}
                        _ => best = Some((idx, p.life)),
                    }
                }
                best?.0
            }
        };

        self.particles[slot] = Particle {
            pos,
            vel,
            life: life.max(0.0),
            max_life: life.max(0.0),
            size,
            color,
            kind,
            active: true,
        };
        Some(slot)
    }

    /// Integrate all active particles by one tick. Dust additionally
    /// feels the wind.
    pub fn update(&mut self, dt: f32, wind: Vec2) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }

        for p in &mut self.particles {
            if !p.active {
                continue;
            }

            p.pos += p.vel * dt;
            p.vel.z -= GRAVITY * dt;
            if p.kind == ParticleKind::Dust {
                p.vel.x += wind.x * WIND_COUPLING * dt;
                p.vel.y += wind.y * WIND_COUPLING * dt;
            }
            p.vel *= AIR_DRAG;

            p.life -= dt;
            if p.life <= 0.0 {
                p.active = false;
                continue;
            }

            if p.pos.z <= 0.0 {
                p.pos.z = 0.0;
                p.vel.z = 0.0;
                p.vel.x *= GROUND_DAMPING;
                p.vel.y *= GROUND_DAMPING;
            }
        }
    }

    /// Iterate the active particles. The iterator is finite and can be
    /// taken as many times as needed between ticks.
    pub fn iter_active(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter().filter(|p| p.active)
    }

    /// Deactivate everything
    pub fn clear(&mut self) {
        for p in &mut self.particles {
            p.active = false;
        }
    }
}
