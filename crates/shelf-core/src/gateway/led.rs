//! LED indicator commands.

use serde::Serialize;

use crate::model::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Active place job target.
    pub const PLACE: Rgb = Rgb::new(0, 100, 255);
    /// Active pick job target.
    pub const PICK: Rgb = Rgb::new(255, 165, 0);
    /// Queued job targets while the queue list is shown.
    pub const QUEUE: Rgb = Rgb::new(0, 150, 255);
    /// Queued job targets while the main grid is shown.
    pub const QUEUE_DIM: Rgb = Rgb::new(0, 80, 160);
    /// Cell scanned by mistake.
    pub const WRONG: Rgb = Rgb::new(255, 0, 0);
    /// Expected cell after a wrong scan.
    pub const CORRECT: Rgb = Rgb::new(0, 255, 0);
}

/// One lit cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedSpot {
    pub location: Location,
    pub color: Rgb,
}

/// What the shelf LEDs should show.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LedCommand {
    /// Everything off.
    #[default]
    Clear,
    /// A single cell (previous state is replaced by the endpoint).
    Single(LedSpot),
    /// Several cells at once.
    Batch { spots: Vec<LedSpot>, clear_first: bool },
}

/// Wire body for a single position.
#[derive(Debug, Serialize)]
pub(crate) struct LedPositionBody {
    pub position: String,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl From<&LedSpot> for LedPositionBody {
    fn from(spot: &LedSpot) -> Self {
        Self {
            position: spot.location.led_position(),
            r: spot.color.r,
            g: spot.color.g,
            b: spot.color.b,
        }
    }
}

/// Wire body for a batch.
#[derive(Debug, Serialize)]
pub(crate) struct LedBatchBody {
    pub positions: Vec<LedPositionBody>,
    pub clear_first: bool,
}
