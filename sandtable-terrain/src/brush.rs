//! Sculpting brushes applied to the heightmap

use crate::heightmap::Heightmap;
use serde::{Deserialize, Serialize};

/// Base elevation change per full-intensity brush application
const SCULPT_RATE: f32 = 0.02;

/// Sculpting clamps to this range; the hard invariant limit is wider to
/// leave headroom for erosion
const SCULPT_LIMIT: f32 = 2.0;

/// What a brush stroke does to the terrain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrushKind {
    /// Push terrain up
    Raise,
    /// Dig terrain down
    Lower,
    /// Blend toward the local neighborhood average
    Smooth,
}

/// A single queued sculpting operation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrushStroke {
    /// Disc center x in grid coordinates; may lie outside the grid
    pub cx: f32,
    /// Disc center y in grid coordinates; may lie outside the grid
    pub cy: f32,
    /// Disc radius in cells
    pub radius: f32,
    /// Stroke strength in [0, 1]
    pub intensity: f32,
    /// Operation applied inside the disc
    pub kind: BrushKind,
}

impl BrushStroke {
    /// Create a stroke
    pub fn new(cx: f32, cy: f32, radius: f32, intensity: f32, kind: BrushKind) -> Self {
        Self {
            cx,
            cy,
            radius,
            intensity,
            kind,
        }
    }

    /// Apply this stroke to the heightmap.
    ///
    /// Every cell inside the Euclidean disc is modified with a linear
    /// falloff from the center. Centers outside the grid are legal; only
    /// the intersected region is touched. Strokes with non-finite or
    /// non-positive parameters are dropped.
    pub fn apply(&self, map: &mut Heightmap) {
        if !self.cx.is_finite()
            || !self.cy.is_finite()
            || !self.radius.is_finite()
            || !self.intensity.is_finite()
            || self.radius <= 0.0
        {
            return;
        }
        let intensity = self.intensity.clamp(0.0, 1.0);
        if intensity == 0.0 {
            return;
        }

        let min_x = (self.cx - self.radius).floor().max(0.0) as u32;
        let min_y = (self.cy - self.radius).floor().max(0.0) as u32;
        let max_x = ((self.cx + self.radius).ceil() as i64).min(map.width() as i64 - 1);
        let max_y = ((self.cy + self.radius).ceil() as i64).min(map.height() as i64 - 1);
        if max_x < 0 || max_y < 0 {
            return;
        }

        let radius_sq = self.radius * self.radius;
        for y in min_y..=max_y as u32 {
            for x in min_x..=max_x as u32 {
                let dx = x as f32 - self.cx;
                let dy = y as f32 - self.cy;
                let dist_sq = dx * dx + dy * dy;
                if dist_sq > radius_sq {
                    continue;
                }

                let falloff = 1.0 - dist_sq.sqrt() / self.radius;
                let delta = intensity * falloff * SCULPT_RATE;

                match self.kind {
                    BrushKind::Raise => {
                        let h = map.get(x, y);
                        map.set(x, y, (h + delta).min(SCULPT_LIMIT));
                    }
                    BrushKind::Lower => {
                        let h = map.get(x, y);
                        map.set(x, y, (h - delta).max(-SCULPT_LIMIT));
                    }
                    BrushKind::Smooth => {
                        let h = map.get(x, y);
                        let avg = map.neighborhood_average(x, y);
                        map.set(x, y, h * (1.0 - delta) + avg * delta);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightmap::HeightmapConfig;

    fn flat_map() -> Heightmap {
        Heightmap::new(HeightmapConfig {
            width: 20,
            height: 20,
            initial_elevation: 0.0,
        })
        .unwrap()
    }

    #[test]
    fn test_raise_peaks_at_center() {
        let mut map = flat_map();
        BrushStroke::new(10.0, 10.0, 4.0, 1.0, BrushKind::Raise).apply(&mut map);

        let center = map.get(10, 10);
        assert_eq!(center, SCULPT_RATE);
        assert!(map.get(12, 10) < center);
        assert!(map.get(12, 10) > 0.0);
        // Outside the disc nothing happens
        assert_eq!(map.get(16, 10), 0.0);
    }

    #[test]
    fn test_raise_clamps_at_sculpt_limit() {
        let mut map = flat_map();
        let stroke = BrushStroke::new(10.0, 10.0, 3.0, 1.0, BrushKind::Raise);
        for _ in 0..200 {
            stroke.apply(&mut map);
        }
        assert_eq!(map.get(10, 10), SCULPT_LIMIT);
    }

    #[test]
    fn test_lower_clamps_at_negative_limit() {
        let mut map = flat_map();
        let stroke = BrushStroke::new(10.0, 10.0, 3.0, 1.0, BrushKind::Lower);
        for _ in 0..200 {
            stroke.apply(&mut map);
        }
        assert_eq!(map.get(10, 10), -SCULPT_LIMIT);
    }

    #[test]
    fn test_off_grid_center_affects_intersection() {
        let mut map = flat_map();
        BrushStroke::new(-2.0, 10.0, 5.0, 1.0, BrushKind::Raise).apply(&mut map);

        // The disc pokes into the left edge
        assert!(map.get(0, 10) > 0.0);
        assert!(map.get(2, 10) > 0.0);
        assert_eq!(map.get(5, 10), 0.0);
    }

    #[test]
    fn test_far_off_grid_stroke_is_noop() {
        let mut map = flat_map();
        BrushStroke::new(-100.0, -100.0, 5.0, 1.0, BrushKind::Raise).apply(&mut map);
        assert_eq!(map.total_mass(), 0.0);
    }

    #[test]
    fn test_smooth_flattens_spike() {
        let mut map = flat_map();
        map.set(10, 10, 1.0);

        BrushStroke::new(10.0, 10.0, 3.0, 1.0, BrushKind::Smooth).apply(&mut map);

        assert!(map.get(10, 10) < 1.0);
    }

    #[test]
    fn test_bad_parameters_are_dropped() {
        let mut map = flat_map();
        BrushStroke::new(f32::NAN, 10.0, 3.0, 1.0, BrushKind::Raise).apply(&mut map);
        BrushStroke::new(10.0, 10.0, -1.0, 1.0, BrushKind::Raise).apply(&mut map);
        BrushStroke::new(10.0, 10.0, 3.0, f32::INFINITY, BrushKind::Raise).apply(&mut map);
        assert_eq!(map.total_mass(), 0.0);
    }
}
