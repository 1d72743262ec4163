//! Sandtable Hydrology Module
//!
//! Shallow-water simulation over the sculpted heightmap, hydraulic
//! erosion coupling, and the weather state that forces both.

pub mod erosion;
pub mod water;
pub mod weather;

pub use erosion::{erode, ErosionConfig, SedimentEvent};
pub use water::{RainDrop, Splash, WaterConfig, WaterField, WaterStats};
pub use weather::{Weather, WeatherUpdate};
