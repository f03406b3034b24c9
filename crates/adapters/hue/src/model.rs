//! Wire model of the bridge `/sensors` resource.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

/// All sensors reported by one bridge refresh, keyed by bridge sensor id.
pub type SensorSnapshot = Arc<BTreeMap<String, RawSensor>>;

/// One sensor as reported by the bridge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawSensor {
    /// Type tag (`ZLLPresence`, `CLIPTemperature`, …).
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default, rename = "uniqueid")]
    pub unique_id: Option<String>,
    #[serde(default, rename = "modelid")]
    pub model_id: Option<String>,
    #[serde(default, rename = "manufacturername")]
    pub manufacturer_name: Option<String>,
    #[serde(default)]
    pub state: SensorState,
    #[serde(default)]
    pub config: SensorConfig,
}

/// Readings. Which fields are present depends on the sensor type.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SensorState {
    #[serde(rename = "lastupdated")]
    pub last_updated: Option<String>,
    /// Hundredths of a degree Celsius.
    pub temperature: Option<i32>,
    /// Hundredths of a percent for ZLL, raw value for CLIP.
    pub humidity: Option<i32>,
    /// `10000 * log10(lux) + 1` for ZLL, raw value for CLIP.
    #[serde(rename = "lightlevel")]
    pub light_level: Option<i32>,
    pub dark: Option<bool>,
    pub daylight: Option<bool>,
    pub presence: Option<bool>,
    #[serde(rename = "buttonevent")]
    pub button_event: Option<i32>,
    pub status: Option<i32>,
    pub flag: Option<bool>,
    pub open: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Battery percentage.
    pub battery: Option<u8>,
    pub reachable: Option<bool>,
    pub on: Option<bool>,
}

/// Entry of the error list the bridge returns instead of a resource.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BridgeErrorEntry {
    pub error: BridgeErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BridgeErrorBody {
    #[serde(rename = "type")]
    pub code: u16,
    #[serde(default)]
    pub description: String,
}
