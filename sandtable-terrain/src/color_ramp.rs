//! Height-to-color mapping via an ordered ramp of interpolation stops

use serde::{Deserialize, Serialize};

/// A single stop on a color ramp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    /// Elevation at which this stop applies
    pub height: f32,
    /// RGB8 color at the stop
    pub color: [u8; 3],
}

impl ColorStop {
    /// Create a new stop
    pub fn new(height: f32, color: [u8; 3]) -> Self {
        Self { height, color }
    }
}

/// Ordered sequence of color stops with piecewise-linear lookup.
///
/// Queries below the first stop or above the last saturate to the
/// endpoint colors. Channel interpolation rounds half away from zero,
/// so the midpoint of a black-to-white ramp resolves to 128.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorRamp {
    stops: Vec<ColorStop>,
}

impl ColorRamp {
    /// Create a ramp from stops; requires at least two stops with
    /// strictly increasing heights
    pub fn new(stops: Vec<ColorStop>) -> anyhow::Result<Self> {
        if stops.len() < 2 {
            return Err(anyhow::anyhow!(
                "Color ramp needs at least 2 stops, got {}",
                stops.len()
            ));
        }
        for pair in stops.windows(2) {
            if !pair[0].height.is_finite() || !pair[1].height.is_finite() {
                return Err(anyhow::anyhow!("Color ramp stop heights must be finite"));
            }
            if pair[0].height >= pair[1].height {
                return Err(anyhow::anyhow!(
                    "Color ramp stops must be strictly increasing ({} >= {})",
                    pair[0].height,
                    pair[1].height
                ));
            }
        }

        Ok(Self { stops })
    }

    /// The stops of this ramp
    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// Look up the color for an elevation.
    ///
    /// The ramp is short (a handful of stops), so the segment search is a
    /// linear scan.
    pub fn color_at(&self, height: f32) -> [u8; 3] {
        let first = self.stops[0];
        let last = self.stops[self.stops.len() - 1];

        if !height.is_finite() || height <= first.height {
            return first.color;
        }
        if height >= last.height {
            return last.color;
        }

        for pair in self.stops.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            if height <= hi.height {
                let t = (height - lo.height) / (hi.height - lo.height);
                return [
                    lerp_channel(lo.color[0], hi.color[0], t),
                    lerp_channel(lo.color[1], hi.color[1], t),
                    lerp_channel(lo.color[2], hi.color[2], t),
                ];
            }
        }

        last.color
    }

    /// Classic sandbox topography: deep water through shoreline, grass,
    /// and rock up to snow-capped peaks
    pub fn topographic() -> Self {
        Self {
            stops: vec![
                ColorStop::new(-2.0, [8, 24, 88]),
                ColorStop::new(-1.0, [20, 60, 160]),
                ColorStop::new(-0.25, [60, 130, 210]),
                ColorStop::new(0.0, [194, 178, 128]),
                ColorStop::new(0.35, [90, 160, 60]),
                ColorStop::new(0.9, [120, 100, 70]),
                ColorStop::new(1.5, [150, 150, 150]),
                ColorStop::new(2.0, [255, 255, 255]),
            ],
        }
    }

    /// Plain elevation ramp from black to white
    pub fn grayscale() -> Self {
        Self {
            stops: vec![
                ColorStop::new(-2.0, [0, 0, 0]),
                ColorStop::new(2.0, [255, 255, 255]),
            ],
        }
    }
}

#[inline]
fn lerp_channel(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_needs_two_stops() {
        assert!(ColorRamp::new(vec![]).is_err());
        assert!(ColorRamp::new(vec![ColorStop::new(0.0, [0, 0, 0])]).is_err());
    }

    #[test]
    fn test_ramp_rejects_non_monotonic_stops() {
        let stops = vec![
            ColorStop::new(0.0, [0, 0, 0]),
            ColorStop::new(0.0, [10, 10, 10]),
        ];
        assert!(ColorRamp::new(stops).is_err());

        let stops = vec![
            ColorStop::new(1.0, [0, 0, 0]),
            ColorStop::new(0.0, [10, 10, 10]),
        ];
        assert!(ColorRamp::new(stops).is_err());
    }

    #[test]
    fn test_stop_colors_are_exact() {
        let ramp = ColorRamp::new(vec![
            ColorStop::new(-1.0, [10, 20, 30]),
            ColorStop::new(0.0, [40, 50, 60]),
            ColorStop::new(1.0, [70, 80, 90]),
        ])
        .unwrap();

        assert_eq!(ramp.color_at(-1.0), [10, 20, 30]);
        assert_eq!(ramp.color_at(0.0), [40, 50, 60]);
        assert_eq!(ramp.color_at(1.0), [70, 80, 90]);
    }

    #[test]
    fn test_midpoint_rounding() {
        let ramp = ColorRamp::new(vec![
            ColorStop::new(0.0, [0, 0, 0]),
            ColorStop::new(1.0, [255, 255, 255]),
        ])
        .unwrap();

        // 127.5 rounds half away from zero
        assert_eq!(ramp.color_at(0.5), [128, 128, 128]);
    }

    #[test]
    fn test_out_of_range_saturates() {
        let ramp = ColorRamp::grayscale();
        assert_eq!(ramp.color_at(-100.0), [0, 0, 0]);
        assert_eq!(ramp.color_at(100.0), [255, 255, 255]);
        assert_eq!(ramp.color_at(f32::NAN), [0, 0, 0]);
    }

    #[test]
    fn test_interpolation_is_continuous_at_stops() {
        let ramp = ColorRamp::topographic();
        for stop in ramp.stops() {
            let just_below = ramp.color_at(stop.height - 1e-4);
            let just_above = ramp.color_at(stop.height + 1e-4);
            for c in 0..3 {
                assert!((just_below[c] as i16 - stop.color[c] as i16).abs() <= 1);
                assert!((just_above[c] as i16 - stop.color[c] as i16).abs() <= 1);
            }
        }
    }
}
