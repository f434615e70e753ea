use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Location, ShelfLayout, lenient_u32};

/// Shelf id used when none is known yet.
pub const DEFAULT_SHELF_ID: &str = "PC2";

#[derive(Debug, Deserialize)]
pub(crate) struct ShelfNameResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub shelf_id: Option<String>,
    #[serde(default)]
    pub shelf_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LayoutRequest<'a> {
    pub shelf_id: &'a str,
    pub update_flg: &'static str,
    pub slots: BTreeMap<String, Value>,
}

/// Layout response. Two shapes are in the field:
/// `{success, layout: {slots: {k: {level, block, max_tray_count}}}}` and
/// `{status: "success", layout: {"L1B1": {max_tray_count}}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct LayoutResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub layout: Option<Value>,
}

impl LayoutResponse {
    pub fn into_layout(self) -> Option<ShelfLayout> {
        let ok = self.success == Some(true) || self.status.as_deref() == Some("success");
        if !ok {
            return None;
        }
        let layout = self.layout?;
        let layout = layout.as_object()?;

        let slots = match layout.get("slots").and_then(Value::as_object) {
            Some(slots) => slots
                .values()
                .filter_map(|slot| {
                    let location = Location::new(
                        lenient_u32(slot.get("level")?)?,
                        lenient_u32(slot.get("block")?)?,
                    )?;
                    Some((location, slot_capacity(slot)))
                })
                .collect::<Vec<_>>(),
            None => layout
                .iter()
                .filter_map(|(key, slot)| {
                    Some((Location::from_led_position(key)?, slot_capacity(slot)))
                })
                .collect(),
        };
        ShelfLayout::from_slots(slots)
    }
}

fn slot_capacity(slot: &Value) -> u32 {
    slot.get("max_tray_count")
        .and_then(lenient_u32)
        .unwrap_or(crate::model::DEFAULT_CELL_CAPACITY)
}

/// Static config fallback (`GET /api/shelf/config`).
#[derive(Debug, Deserialize)]
pub(crate) struct ShelfConfigResponse {
    #[serde(default, alias = "shelf_config", alias = "SHELF_CONFIG")]
    pub config: BTreeMap<String, Value>,
    #[serde(default, alias = "CELL_CAPACITIES")]
    pub cell_capacities: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ShelfStateResponse {
    #[serde(default)]
    pub shelf_state: Vec<Value>,
}

/// `GET /api/queue` returns a bare array; older gateways wrap it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum QueueResponse {
    Bare(Vec<Value>),
    Wrapped {
        #[serde(default)]
        jobs: Vec<Value>,
    },
}

impl QueueResponse {
    pub fn into_values(self) -> Vec<Value> {
        match self {
            QueueResponse::Bare(jobs) | QueueResponse::Wrapped { jobs } => jobs,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ShelfIdRequest<'a> {
    pub shelf_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PendingJobsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub jobs: Vec<Value>,
}

/// Body of an error response, whichever field the Gateway used.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub detail: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn message(&self) -> Option<String> {
        let text = |v: &Value| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.message
            .clone()
            .or_else(|| self.error.as_ref().map(text))
            .or_else(|| self.detail.as_ref().map(text))
            .filter(|m| !m.trim().is_empty())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CheckShelfRequest<'a> {
    pub lot_no: &'a str,
    pub place_flg: &'static str,
    #[serde(rename = "shelf_id")]
    pub shelf_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CheckShelfResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub lot_no: Option<String>,
    #[serde(default)]
    pub correct_shelf: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Where the LMS says a lot belongs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LmsLocation {
    pub lot_no: String,
    pub correct_shelf: String,
}
