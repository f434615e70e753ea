//! Shelf domain types: jobs, cells and layout.
//!
//! Wire payloads from the Gateway are loosely typed (numbers arrive as
//! strings, cells arrive as objects or `[level, block, lots]` tuples).
//! Everything is normalized here, at the deserialization boundary; the rest
//! of the workspace only sees the canonical forms, and only the canonical
//! forms are written back out.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

/// Default tray capacity for a cell missing from the capacity map.
pub const DEFAULT_CELL_CAPACITY: u32 = 24;

/// Capacity used by the hardcoded fallback grid.
pub const FALLBACK_CELL_CAPACITY: u32 = 40;
const FALLBACK_LEVELS: u32 = 4;
const FALLBACK_BLOCKS: u32 = 8;

// ============================================================================
// Location
// ============================================================================

/// One addressable shelf cell. Both coordinates are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub level: u32,
    pub block: u32,
}

impl Location {
    /// Returns `None` when either coordinate is zero.
    pub fn new(level: u32, block: u32) -> Option<Self> {
        (level > 0 && block > 0).then_some(Self { level, block })
    }

    /// Position string understood by the LED endpoint (`L2B3`).
    pub fn led_position(&self) -> String {
        format!("L{}B{}", self.level, self.block)
    }

    /// Key into the cell-capacity map (`2-3`).
    pub fn capacity_key(&self) -> String {
        format!("{}-{}", self.level, self.block)
    }

    /// Parses an LED/layout position string (`L2B3`).
    pub fn from_led_position(position: &str) -> Option<Self> {
        let rest = position.trim().strip_prefix(['L', 'l'])?;
        let (level, block) = rest.split_once(['B', 'b'])?;
        Self::new(level.parse().ok()?, block.parse().ok()?)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}-B{}", self.level, self.block)
    }
}

// ============================================================================
// Lenient scalar decoding
// ============================================================================

/// Reads a non-negative integer from a JSON number or numeric string.
pub(crate) fn lenient_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            })
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads a non-empty string, accepting numbers as well.
pub(crate) fn lenient_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn deserialize_lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(lenient_u32).unwrap_or(0))
}

// ============================================================================
// Job
// ============================================================================

/// Place or pick. Encoded on the wire as `"1"` (place) / `"0"` (pick).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceFlag {
    Place,
    Pick,
}

impl PlaceFlag {
    /// `"1"` (or `1`) is place; anything else is pick.
    pub fn from_wire(value: Option<&Value>) -> Self {
        match value.and_then(lenient_string).as_deref() {
            Some("1") => PlaceFlag::Place,
            _ => PlaceFlag::Pick,
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            PlaceFlag::Place => "1",
            PlaceFlag::Pick => "0",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlaceFlag::Place => "Place",
            PlaceFlag::Pick => "Pick",
        }
    }
}

impl Serialize for PlaceFlag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for PlaceFlag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(PlaceFlag::from_wire(value.as_ref()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobErrorKind {
    #[serde(rename = "WRONG_LOCATION")]
    WrongLocation,
}

/// A place/pick job.
///
/// Serialized in the Gateway's field naming (`jobId`, `errorType`, ...).
/// Decoding goes through [`WireJob`] so malformed entries are rejected at
/// the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireJob")]
pub struct Job {
    #[serde(rename = "jobId")]
    pub job_id: String,
    pub lot_no: String,
    pub level: u32,
    pub block: u32,
    pub place_flg: PlaceFlag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tray_count: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    #[serde(rename = "errorType", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<JobErrorKind>,
    #[serde(rename = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Job {
    pub fn location(&self) -> Option<Location> {
        Location::new(self.level, self.block)
    }

    /// Non-empty id and lot, non-zero coordinates.
    pub fn is_valid(&self) -> bool {
        !self.job_id.trim().is_empty() && !self.lot_no.trim().is_empty() && self.location().is_some()
    }

    pub fn clear_error(&mut self) {
        self.error = false;
        self.error_type = None;
        self.error_message = None;
    }

    pub fn mark_wrong_location(&mut self, message: String) {
        self.error = true;
        self.error_type = Some(JobErrorKind::WrongLocation);
        self.error_message = Some(message);
    }

    pub fn has_lot(&self, lot_no: &str) -> bool {
        self.lot_no.trim() == lot_no.trim()
    }

    /// Decodes a job list, dropping entries that fail validation.
    pub fn decode_list(values: Vec<Value>) -> Vec<Job> {
        let total = values.len();
        let jobs: Vec<Job> = values
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();
        if jobs.len() < total {
            debug!(dropped = total - jobs.len(), "dropped invalid job entries");
        }
        jobs
    }
}

/// Raw job shape as it appears on the wire.
#[derive(Debug, Deserialize)]
struct WireJob {
    #[serde(rename = "jobId", alias = "job_id", default)]
    job_id: Option<Value>,
    #[serde(default)]
    lot_no: Option<Value>,
    #[serde(default)]
    level: Option<Value>,
    #[serde(default)]
    block: Option<Value>,
    #[serde(default)]
    place_flg: Option<Value>,
    #[serde(default)]
    tray_count: Option<Value>,
    #[serde(default)]
    error: Option<bool>,
    #[serde(rename = "errorType", default)]
    error_type: Option<String>,
    #[serde(rename = "errorMessage", default)]
    error_message: Option<String>,
}

impl TryFrom<WireJob> for Job {
    type Error = String;

    fn try_from(wire: WireJob) -> Result<Self, Self::Error> {
        let job_id = wire
            .job_id
            .as_ref()
            .and_then(lenient_string)
            .ok_or("job is missing jobId")?;
        let lot_no = wire
            .lot_no
            .as_ref()
            .and_then(lenient_string)
            .ok_or("job is missing lot_no")?;
        let level = wire
            .level
            .as_ref()
            .and_then(lenient_u32)
            .filter(|n| *n > 0)
            .ok_or("job has no valid level")?;
        let block = wire
            .block
            .as_ref()
            .and_then(lenient_u32)
            .filter(|n| *n > 0)
            .ok_or("job has no valid block")?;

        Ok(Job {
            job_id,
            lot_no,
            level,
            block,
            place_flg: PlaceFlag::from_wire(wire.place_flg.as_ref()),
            tray_count: wire.tray_count.as_ref().and_then(lenient_u32),
            error: wire.error.unwrap_or(false),
            error_type: wire
                .error_type
                .as_deref()
                .filter(|kind| *kind == "WRONG_LOCATION")
                .map(|_| JobErrorKind::WrongLocation),
            error_message: wire.error_message,
        })
    }
}

// ============================================================================
// Cells
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub lot_no: String,
    #[serde(default, deserialize_with = "deserialize_lenient_count")]
    pub tray_count: u32,
}

/// Contents of one shelf cell. Always written as an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireCell")]
pub struct Cell {
    pub level: u32,
    pub block: u32,
    pub lots: Vec<Lot>,
}

impl Cell {
    pub fn empty(location: Location) -> Self {
        Self {
            level: location.level,
            block: location.block,
            lots: Vec::new(),
        }
    }

    pub fn location(&self) -> Option<Location> {
        Location::new(self.level, self.block)
    }

    pub fn tray_total(&self) -> u32 {
        self.lots
            .iter()
            .map(|lot| lot.tray_count)
            .fold(0, u32::saturating_add)
    }

    /// Decodes a cell list, dropping entries that fail validation.
    pub fn decode_list(values: Vec<Value>) -> Vec<Cell> {
        values
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect()
    }
}

/// Cell encodings accepted on read: canonical object or legacy tuple.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireCell {
    Object {
        level: Value,
        block: Value,
        #[serde(default)]
        lots: Vec<Lot>,
    },
    Tuple(Value, Value, Vec<Lot>),
}

impl TryFrom<WireCell> for Cell {
    type Error = String;

    fn try_from(wire: WireCell) -> Result<Self, Self::Error> {
        let (level, block, lots) = match wire {
            WireCell::Object { level, block, lots } | WireCell::Tuple(level, block, lots) => {
                (level, block, lots)
            }
        };
        let location = lenient_u32(&level)
            .zip(lenient_u32(&block))
            .and_then(|(l, b)| Location::new(l, b))
            .ok_or("cell has no valid level/block")?;
        Ok(Cell {
            level: location.level,
            block: location.block,
            lots,
        })
    }
}

// ============================================================================
// Layout
// ============================================================================

/// Shelf geometry (level → block count) plus per-cell tray capacities.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShelfLayout {
    pub levels: BTreeMap<u32, u32>,
    pub capacities: BTreeMap<String, u32>,
}

impl ShelfLayout {
    /// Hardcoded grid used when the Gateway cannot provide one.
    pub fn fallback() -> Self {
        let levels: BTreeMap<u32, u32> = (1..=FALLBACK_LEVELS)
            .map(|level| (level, FALLBACK_BLOCKS))
            .collect();
        let capacities = levels
            .iter()
            .flat_map(|(level, blocks)| (1..=*blocks).map(move |block| (*level, block)))
            .map(|(level, block)| (format!("{level}-{block}"), FALLBACK_CELL_CAPACITY))
            .collect();
        Self { levels, capacities }
    }

    /// Builds a layout from per-cell capacities. Block counts per level are
    /// the highest block seen on that level. Returns `None` if empty.
    pub fn from_slots<I>(slots: I) -> Option<Self>
    where
        I: IntoIterator<Item = (Location, u32)>,
    {
        let mut layout = ShelfLayout::default();
        for (location, max_trays) in slots {
            let blocks = layout.levels.entry(location.level).or_insert(0);
            *blocks = (*blocks).max(location.block);
            layout.capacities.insert(location.capacity_key(), max_trays);
        }
        (!layout.levels.is_empty()).then_some(layout)
    }

    /// Builds a layout from a level → block-count map and a capacity map.
    ///
    /// Keys may be numeric strings (JSON object keys).
    pub fn from_config(
        levels: &BTreeMap<String, Value>,
        capacities: &BTreeMap<String, Value>,
    ) -> Option<Self> {
        let levels: BTreeMap<u32, u32> = levels
            .iter()
            .filter_map(|(level, blocks)| {
                let level = level.trim().parse::<u32>().ok().filter(|l| *l > 0)?;
                let blocks = lenient_u32(blocks).filter(|b| *b > 0)?;
                Some((level, blocks))
            })
            .collect();
        if levels.is_empty() {
            return None;
        }
        let capacities = capacities
            .iter()
            .filter_map(|(key, value)| Some((key.clone(), lenient_u32(value)?)))
            .collect();
        Some(Self { levels, capacities })
    }

    /// Tray capacity of a cell, [`DEFAULT_CELL_CAPACITY`] when unknown.
    pub fn capacity(&self, location: Location) -> u32 {
        self.capacities
            .get(&location.capacity_key())
            .copied()
            .unwrap_or(DEFAULT_CELL_CAPACITY)
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn max_blocks(&self) -> u32 {
        self.levels.values().copied().max().unwrap_or(0)
    }

    /// Every cell in level-then-block order.
    pub fn locations(&self) -> impl Iterator<Item = Location> + '_ {
        self.levels.iter().flat_map(|(level, blocks)| {
            (1..=*blocks).filter_map(move |block| Location::new(*level, block))
        })
    }

    /// Empty shelf state covering every cell of the layout.
    pub fn empty_shelf_state(&self) -> Vec<Cell> {
        self.locations().map(Cell::empty).collect()
    }
}
