//! Typed sensor records and world-model state
//!
//! The transport adapters and frame parsers live outside this crate; by the
//! time data reaches the COLAV pipeline it is one of the typed records below.
//! Records serialize back out unchanged (plus decorations) for the
//! visualization passthrough.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::error::RecordError;

/// GPRMC own-ship fix: position in DDM, speed over ground in knots, true
/// course in degrees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GprmcRecord {
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub lat: f64,
    pub lat_dir: String,
    pub lon: f64,
    pub lon_dir: String,
    pub spd_over_grnd: f64,
    pub true_course: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datestamp: Option<String>,
}

/// GPGGA fix quality record; forwarded to the UI, not used by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpggaRecord {
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub lat: f64,
    pub lat_dir: String,
    pub lon: f64,
    pub lon_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_qual: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_units: Option<String>,
}

/// PSIMSNS attitude record; `head_deg` feeds the own-ship heading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsimsnsRecord {
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll_deg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_deg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heave_m: Option<f64>,
    pub head_deg: f64,
}

/// AIS position report. Position is decimal degrees; course and heading are
/// degrees, speed is knots. `pos_history`, `lat_p` and `lon_p` are written
/// by the record router before the record is forwarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AisRecord {
    pub message_id: String,
    #[serde(deserialize_with = "mmsi_from_value")]
    pub mmsi: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos_history: Option<Vec<[f64; 2]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon_p: Option<f64>,
}

/// MMSIs arrive as strings or bare numbers depending on the upstream parser.
fn mmsi_from_value<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "mmsi must be string or number, got {}",
            other
        ))),
    }
}

/// One parsed input record, dispatched on its `message_id`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum InputRecord {
    Gprmc(GprmcRecord),
    Gpgga(GpggaRecord),
    Psimsns(PsimsnsRecord),
    Ais(AisRecord),
}

impl InputRecord {
    /// Dispatch a raw JSON object on its `message_id` field.
    pub fn from_value(value: serde_json::Value) -> Result<Self, RecordError> {
        let id = value
            .get("message_id")
            .and_then(|v| v.as_str())
            .ok_or(RecordError::MissingMessageId)?
            .to_string();

        if id.starts_with("!AI") {
            return Ok(InputRecord::Ais(serde_json::from_value(value)?));
        }
        match id.as_str() {
            "$GPRMC" => Ok(InputRecord::Gprmc(serde_json::from_value(value)?)),
            "$GPGGA" => Ok(InputRecord::Gpgga(serde_json::from_value(value)?)),
            "$PSIMSNS" => Ok(InputRecord::Psimsns(serde_json::from_value(value)?)),
            _ => Err(RecordError::UnknownMessageId(id)),
        }
    }

    pub fn message_id(&self) -> &str {
        match self {
            InputRecord::Gprmc(r) => &r.message_id,
            InputRecord::Gpgga(r) => &r.message_id,
            InputRecord::Psimsns(r) => &r.message_id,
            InputRecord::Ais(r) => &r.message_id,
        }
    }
}

/// Own-ship state in the world model. Position is decimal degrees; derived
/// from GPRMC, heading filled in from PSIMSNS when available.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnShipState {
    pub lat: f64,
    pub lon: f64,
    /// Speed over ground, knots
    pub speed_kn: f64,
    /// True course, degrees
    pub course_deg: f64,
    /// Gyro heading, degrees
    pub heading_deg: Option<f64>,
}

/// One AIS contact in the world model, after smoothing and decoration.
#[derive(Debug, Clone, PartialEq)]
pub struct AisContact {
    pub mmsi: String,
    pub lat: f64,
    pub lon: f64,
    /// Smoothed course over ground, degrees; 0 when the report had none
    pub course_deg: Option<f64>,
    /// Speed over ground, knots; 0 when the report had none
    pub speed_kn: Option<f64>,
    /// Ingress wall-clock stamp, milliseconds since the epoch
    pub received_ms: u64,
}

/// The mutable world model owned by the coordinator: current own-ship fix
/// plus the AIS contact map keyed by MMSI.
#[derive(Debug, Clone, Default)]
pub struct World {
    pub own_ship: Option<OwnShipState>,
    pub own_heading_deg: Option<f64>,
    pub targets: BTreeMap<String, AisContact>,
}

impl World {
    /// Drop contacts whose last report is older than `timeout_ms`.
    pub fn evict_stale_targets(&mut self, now_ms: u64, timeout_ms: u64) {
        self.targets
            .retain(|_, c| now_ms.saturating_sub(c.received_ms) <= timeout_ms);
    }
}
