//! Weather state forcing precipitation, evaporation, and wind effects

use glam::Vec2;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Ambient weather scalars.
///
/// All fields are clamped to their documented ranges on every mutation.
/// Precipitation is an externally commanded control (the rain toggle)
/// and does not drift; everything else wanders randomly each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    /// Wind speed in m/s, in [0, 20]
    pub wind_speed: f32,
    /// Wind direction in degrees, in [0, 360)
    pub wind_dir_deg: f32,
    /// Relative humidity in percent, in [0, 100]
    pub humidity_pct: f32,
    /// Air temperature in degrees Celsius, in [-10, 45]
    pub temperature_c: f32,
    /// Rain intensity, in [0, 1]
    pub precipitation: f32,
    /// Barometric pressure in hPa, in [950, 1050]
    pub pressure_hpa: f32,
}

impl Default for Weather {
    fn default() -> Self {
        Self {
            wind_speed: 3.0,
            wind_dir_deg: 90.0,
            humidity_pct: 50.0,
            temperature_c: 20.0,
            precipitation: 0.0,
            pressure_hpa: 1013.25,
        }
    }
}

/// Partial weather assignment; `None` fields retain their current value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherUpdate {
    pub wind_speed: Option<f32>,
    pub wind_dir_deg: Option<f32>,
    pub humidity_pct: Option<f32>,
    pub temperature_c: Option<f32>,
    pub precipitation: Option<f32>,
    pub pressure_hpa: Option<f32>,
}

impl Weather {
    /// Calm, dry conditions
    pub fn clear() -> Self {
        Self::default()
    }

    /// Heavy rain with strong gusts
    pub fn storm() -> Self {
        Self {
            wind_speed: 15.0,
            wind_dir_deg: 240.0,
            humidity_pct: 95.0,
            temperature_c: 12.0,
            precipitation: 1.0,
            pressure_hpa: 980.0,
        }
    }

    /// Apply a partial update, clamping every assigned field. Non-finite
    /// values are ignored.
    pub fn apply(&mut self, update: &WeatherUpdate) {
        if let Some(v) = update.wind_speed.filter(|v| v.is_finite()) {
            self.wind_speed = v.clamp(0.0, 20.0);
        }
        if let Some(v) = update.wind_dir_deg.filter(|v| v.is_finite()) {
            self.wind_dir_deg = v.rem_euclid(360.0);
        }
        if let Some(v) = update.humidity_pct.filter(|v| v.is_finite()) {
            self.humidity_pct = v.clamp(0.0, 100.0);
        }
        if let Some(v) = update.temperature_c.filter(|v| v.is_finite()) {
            self.temperature_c = v.clamp(-10.0, 45.0);
        }
        if let Some(v) = update.precipitation.filter(|v| v.is_finite()) {
            self.precipitation = v.clamp(0.0, 1.0);
        }
        if let Some(v) = update.pressure_hpa.filter(|v| v.is_finite()) {
            self.pressure_hpa = v.clamp(950.0, 1050.0);
        }
    }

    /// Random-walk the ambient scalars by one tick. Step sizes are tuned
    /// so conditions change over minutes, not seconds.
    pub fn drift(&mut self, dt: f32, rng: &mut StdRng) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }

        self.wind_speed =
            (self.wind_speed + rng.random_range(-1.0..1.0) * 2.0 * dt).clamp(0.0, 20.0);
        self.wind_dir_deg =
            (self.wind_dir_deg + rng.random_range(-1.0..1.0) * 30.0 * dt).rem_euclid(360.0);
        self.humidity_pct =
            (self.humidity_pct + rng.random_range(-1.0..1.0) * 5.0 * dt).clamp(0.0, 100.0);
        self.temperature_c =
            (self.temperature_c + rng.random_range(-1.0..1.0) * 0.5 * dt).clamp(-10.0, 45.0);
        self.pressure_hpa =
            (self.pressure_hpa + rng.random_range(-1.0..1.0) * 2.0 * dt).clamp(950.0, 1050.0);
    }

    /// Wind as a velocity vector in grid coordinates
    pub fn wind_vector(&self) -> Vec2 {
        let radians = self.wind_dir_deg.to_radians();
        Vec2::new(radians.cos(), radians.sin()) * self.wind_speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    #[test]
    fn test_empty_update_is_noop() {
        let mut weather = Weather::default();
        let before = weather.clone();
        weather.apply(&WeatherUpdate::default());
        assert_eq!(weather, before);
    }

    #[test]
    fn test_update_clamps_fields() {
        let mut weather = Weather::default();
        weather.apply(&WeatherUpdate {
            wind_speed: Some(100.0),
            wind_dir_deg: Some(-90.0),
            humidity_pct: Some(150.0),
            temperature_c: Some(-40.0),
            precipitation: Some(2.0),
            pressure_hpa: Some(0.0),
        });

        assert_eq!(weather.wind_speed, 20.0);
        assert_eq!(weather.wind_dir_deg, 270.0);
        assert_eq!(weather.humidity_pct, 100.0);
        assert_eq!(weather.temperature_c, -10.0);
        assert_eq!(weather.precipitation, 1.0);
        assert_eq!(weather.pressure_hpa, 950.0);
    }

    #[test]
    fn test_non_finite_fields_are_ignored() {
        let mut weather = Weather::default();
        let before = weather.clone();
        weather.apply(&WeatherUpdate {
            wind_speed: Some(f32::NAN),
            temperature_c: Some(f32::INFINITY),
            ..Default::default()
        });
        assert_eq!(weather, before);
    }

    #[test]
    fn test_drift_stays_in_range() {
        let mut weather = Weather::storm();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..10_000 {
            weather.drift(1.0 / 60.0, &mut rng);
            assert!((0.0..=20.0).contains(&weather.wind_speed));
            assert!((0.0..360.0).contains(&weather.wind_dir_deg));
            assert!((0.0..=100.0).contains(&weather.humidity_pct));
            assert!((-10.0..=45.0).contains(&weather.temperature_c));
            assert!((950.0..=1050.0).contains(&weather.pressure_hpa));
        }
        // Precipitation is commanded, never drifted
        assert_eq!(weather.precipitation, 1.0);
    }

    #[test]
    fn test_wind_vector_direction() {
        let weather = Weather {
            wind_speed: 2.0,
            wind_dir_deg: 0.0,
            ..Default::default()
        };
        let wind = weather.wind_vector();
        assert_relative_eq!(wind.x, 2.0);
        assert_relative_eq!(wind.y, 0.0);

        let weather = Weather {
            wind_speed: 2.0,
            wind_dir_deg: 90.0,
            ..Default::default()
        };
        let wind = weather.wind_vector();
        assert_relative_eq!(wind.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(wind.y, 2.0);
    }
}
