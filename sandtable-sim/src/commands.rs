//! Commands queued by the host and drained at the start of each tick
//!
//! The core never mutates state mid-tick on behalf of callers; gestures
//! and toggles become commands, applied in FIFO order before the
//! physics steps run.

use sandtable_hydro::WeatherUpdate;
use sandtable_terrain::BrushStroke;
use serde::{Deserialize, Serialize};

/// One queued intent from the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Sculpt the terrain
    Brush(BrushStroke),
    /// Partially reassign the weather scalars
    Weather(WeatherUpdate),
    /// Pour water onto a cell
    AddWater { x: u32, y: u32, amount: f32 },
    /// Remove water from a cell
    DrainWater { x: u32, y: u32, amount: f32 },
}
