//! Heightmap storage and sampling

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Hard bound on normalized elevation. Sculpting clamps tighter, but
/// erosion may momentarily push cells past the sculpt range; the grid is
/// re-clamped to this limit at the end of every tick.
pub const ELEVATION_LIMIT: f32 = 2.2;

/// Configuration for the terrain grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightmapConfig {
    /// Grid width in cells
    pub width: u32,
    /// Grid height in cells
    pub height: u32,
    /// Elevation assigned to every cell at construction
    pub initial_elevation: f32,
}

impl Default for HeightmapConfig {
    fn default() -> Self {
        Self {
            width: 100,
            height: 75,
            initial_elevation: 0.0,
        }
    }
}

/// A 2D heightmap storing sculpted terrain elevation, indexed `y * width + x`
#[derive(Debug, Clone, PartialEq)]
pub struct Heightmap {
    data: Vec<f32>,
    width: u32,
    height: u32,
}

impl Heightmap {
    /// Create a new heightmap with the given configuration
    pub fn new(config: HeightmapConfig) -> anyhow::Result<Self> {
        if config.width <= 1 || config.height <= 1 {
            return Err(anyhow::anyhow!(
                "Heightmap dimensions {}x{} are degenerate (need at least 2x2)",
                config.width,
                config.height
            ));
        }
        if !config.initial_elevation.is_finite()
            || config.initial_elevation.abs() > ELEVATION_LIMIT
        {
            return Err(anyhow::anyhow!(
                "Initial elevation {} is outside [-{}, {}]",
                config.initial_elevation,
                ELEVATION_LIMIT,
                ELEVATION_LIMIT
            ));
        }

        let size = (config.width * config.height) as usize;
        Ok(Self {
            data: vec![config.initial_elevation; size],
            width: config.width,
            height: config.height,
        })
    }

    /// Create a heightmap from existing data
    pub fn from_data(data: Vec<f32>, width: u32, height: u32) -> anyhow::Result<Self> {
        if width <= 1 || height <= 1 {
            return Err(anyhow::anyhow!(
                "Heightmap dimensions {}x{} are degenerate (need at least 2x2)",
                width,
                height
            ));
        }
        if data.len() != (width * height) as usize {
            return Err(anyhow::anyhow!(
                "Data size {} doesn't match dimensions {}x{}",
                data.len(),
                width,
                height
            ));
        }

        Ok(Self {
            data,
            width,
            height,
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

    /// Number of cells in the grid
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the grid is empty (never true for a constructed heightmap)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat index of a cell, without bounds checking
    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    /// Raw elevation data
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Get elevation at a grid coordinate; out-of-bounds queries return 0
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.data[(y * self.width + x) as usize]
    }

    /// Get elevation at a flat index; out-of-bounds queries return 0
    pub fn get_at_index(&self, index: usize) -> f32 {
        self.data.get(index).copied().unwrap_or(0.0)
    }

    /// Set elevation at a grid coordinate; out-of-bounds writes are ignored
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, elevation: f32) {
        if x >= self.width || y >= self.height {
            return;
        }
        self.data[(y * self.width + x) as usize] = elevation;
    }

    /// Add a delta to a cell's elevation; out-of-bounds writes are ignored
    #[inline]
    pub fn add(&mut self, x: u32, y: u32, delta: f32) {
        if x >= self.width || y >= self.height {
            return;
        }
        self.data[(y * self.width + x) as usize] += delta;
    }

    /// Sample the heightmap with bilinear interpolation at fractional coordinates
    pub fn sample_bilinear(&self, fx: f32, fy: f32) -> f32 {
        let x = fx.clamp(0.0, self.width as f32 - 1.001);
        let y = fy.clamp(0.0, self.height as f32 - 1.001);

        let x0 = x.floor() as u32;
        let y0 = y.floor() as u32;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        let tx = x.fract();
        let ty = y.fract();

        let h00 = self.get(x0, y0);
        let h10 = self.get(x1, y0);
        let h01 = self.get(x0, y1);
        let h11 = self.get(x1, y1);

        let h0 = h00 * (1.0 - tx) + h10 * tx;
        let h1 = h01 * (1.0 - tx) + h11 * tx;

        h0 * (1.0 - ty) + h1 * ty
    }

    /// Average elevation of the 3x3 neighborhood around a cell, with
    /// coordinates clamped to the grid edge
    pub fn neighborhood_average(&self, x: u32, y: u32) -> f32 {
        let mut sum = 0.0;
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let nx = (x as i64 + dx).clamp(0, self.width as i64 - 1) as u32;
                let ny = (y as i64 + dy).clamp(0, self.height as i64 - 1) as u32;
                sum += self.get(nx, ny);
            }
        }
        sum / 9.0
    }

    /// Central-difference surface normal at a grid coordinate
    pub fn normal_at(&self, x: u32, y: u32) -> Vec3 {
        let left = if x > 0 { self.get(x - 1, y) } else { self.get(x, y) };
        let right = if x < self.width - 1 {
            self.get(x + 1, y)
        } else {
            self.get(x, y)
        };
        let up = if y > 0 { self.get(x, y - 1) } else { self.get(x, y) };
        let down = if y < self.height - 1 {
            self.get(x, y + 1)
        } else {
            self.get(x, y)
        };

        let dx = (right - left) / 2.0;
        let dy = (down - up) / 2.0;

        Vec3::new(-dx, -dy, 1.0).normalize()
    }

    /// Apply a box smoothing filter to the interior of the grid
    pub fn smooth(&mut self, iterations: u32) {
        for _ in 0..iterations {
            let mut new_data = self.data.clone();

            for y in 1..(self.height - 1) {
                for x in 1..(self.width - 1) {
                    let idx = (y * self.width + x) as usize;
                    let w = self.width as usize;

                    let sum = self.data[idx - 1]
                        + self.data[idx + 1]
                        + self.data[idx - w]
                        + self.data[idx + w]
                        + self.data[idx] * 4.0;

                    new_data[idx] = sum / 8.0;
                }
            }

            self.data = new_data;
        }
    }

    /// Re-establish the elevation invariant: every cell finite and within
    /// the hard limit. Non-finite values are scrubbed to 0.
    pub fn clamp_to_limits(&mut self) {
        for h in &mut self.data {
            if !h.is_finite() {
                *h = 0.0;
            } else {
                *h = h.clamp(-ELEVATION_LIMIT, ELEVATION_LIMIT);
            }
        }
    }

    /// Total terrain mass (sum of all elevations), accumulated in f64 so
    /// conservation checks are not drowned by summation error
    pub fn total_mass(&self) -> f64 {
        self.data.iter().map(|&h| h as f64).sum()
    }

    /// Minimum and maximum elevation currently in the grid
    pub fn min_max(&self) -> (f32, f32) {
        let min = self.data.iter().copied().fold(f32::INFINITY, f32::min);
        let max = self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_heightmap_creation() {
        let config = HeightmapConfig::default();
        let map = Heightmap::new(config).unwrap();

        assert_eq!(map.width(), 100);
        assert_eq!(map.height(), 75);
        assert_eq!(map.data().len(), 100 * 75);
    }

    #[test]
    fn test_degenerate_dimensions_rejected() {
        let config = HeightmapConfig {
            width: 1,
            height: 75,
            initial_elevation: 0.0,
        };
        assert!(Heightmap::new(config).is_err());

        let config = HeightmapConfig {
            width: 100,
            height: 0,
            initial_elevation: 0.0,
        };
        assert!(Heightmap::new(config).is_err());
    }

    #[test]
    fn test_from_data_size_mismatch() {
        assert!(Heightmap::from_data(vec![0.0; 7], 3, 3).is_err());
        assert!(Heightmap::from_data(vec![0.0; 9], 3, 3).is_ok());
    }

    #[test]
    fn test_get_set_and_bounds() {
        let mut map = Heightmap::new(HeightmapConfig::default()).unwrap();

        map.set(5, 3, 1.25);
        assert_eq!(map.get(5, 3), 1.25);

        // Out-of-bounds queries are total and return the documented default
        assert_eq!(map.get(1000, 0), 0.0);
        assert_eq!(map.get(0, 1000), 0.0);
        map.set(1000, 1000, 9.0); // silently ignored
        assert_eq!(map.total_mass(), 1.25f32 as f64);
    }

    #[test]
    fn test_bilinear_sampling() {
        let mut map = Heightmap::from_data(vec![0.0; 9], 3, 3).unwrap();
        map.set(1, 0, 1.0);
        map.set(1, 1, 1.0);

        assert_relative_eq!(map.sample_bilinear(0.5, 0.5), 0.5);
        assert_relative_eq!(map.sample_bilinear(1.0, 1.0), 1.0);
    }

    #[test]
    fn test_neighborhood_average_edge_clamp() {
        let mut map = Heightmap::from_data(vec![0.0; 9], 3, 3).unwrap();
        map.set(0, 0, 0.9);

        // At the corner, the clamped 3x3 window samples (0,0) four times
        assert_relative_eq!(map.neighborhood_average(0, 0), 0.9 * 4.0 / 9.0);
        // Interior window samples it exactly once
        assert_relative_eq!(map.neighborhood_average(1, 1), 0.9 / 9.0);
    }

    #[test]
    fn test_clamp_to_limits_scrubs_bad_values() {
        let mut map = Heightmap::from_data(vec![0.0; 9], 3, 3).unwrap();
        map.set(0, 0, f32::NAN);
        map.set(1, 0, 5.0);
        map.set(2, 0, -5.0);

        map.clamp_to_limits();

        assert_eq!(map.get(0, 0), 0.0);
        assert_eq!(map.get(1, 0), ELEVATION_LIMIT);
        assert_eq!(map.get(2, 0), -ELEVATION_LIMIT);
    }

    #[test]
    fn test_normal_points_up_on_flat_ground() {
        let map = Heightmap::new(HeightmapConfig::default()).unwrap();
        let normal = map.normal_at(10, 10);
        assert_relative_eq!(normal.z, 1.0);
    }

    #[test]
    fn test_smooth_reduces_spike() {
        let mut map = Heightmap::from_data(vec![0.0; 25], 5, 5).unwrap();
        map.set(2, 2, 1.0);

        map.smooth(1);

        assert!(map.get(2, 2) < 1.0);
        assert!(map.get(1, 2) > 0.0);
    }
}
