//! Sandtable Terrain Module
//!
//! Heightmap storage, sculpting brushes, the angle-of-repose sand
//! automaton, topographic contour extraction, and height-to-color
//! mapping for the sandtable simulation core.

pub mod brush;
pub mod color_ramp;
pub mod contour;
pub mod heightmap;
pub mod sand;

pub use brush::{BrushKind, BrushStroke};
pub use color_ramp::{ColorRamp, ColorStop};
pub use contour::{extract_contours, ContourSegment, ContourStyle};
pub use heightmap::{Heightmap, HeightmapConfig, ELEVATION_LIMIT};
pub use sand::{SandConfig, SandSimulator, SandSpill};
