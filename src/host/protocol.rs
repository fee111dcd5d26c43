//! Wire format of the control-surface host connection
//!
//! Inbound events are JSON objects tagged by `event`; only the ones the
//! bridge reacts to are modelled, everything else lands in `Unknown`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::engine::ButtonMode;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum HostEvent {
    DeviceDidConnect { device: String },
    DeviceDidDisconnect { device: String },
    WillAppear(ActionEvent),
    WillDisappear(ActionEvent),
    KeyDown(ActionEvent),
    KeyUp(ActionEvent),
    DidReceiveSettings(ActionEvent),
    #[serde(other)]
    Unknown,
}

/// Event addressed to one key instance
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionEvent {
    pub action: String,
    pub context: String,
    pub device: String,
    #[serde(default)]
    pub payload: ActionPayload,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ActionPayload {
    #[serde(default)]
    pub settings: KeySettings,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinates {
    pub column: u8,
    pub row: u8,
}

/// Per-key settings written by the property inspector
///
/// Numbers may arrive as JSON numbers or numeric strings; anything else is
/// treated as unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct KeySettings {
    #[serde(default, deserialize_with = "lenient_u8")]
    pub cc: Option<u8>,
    #[serde(default, deserialize_with = "lenient_u8")]
    pub channel: Option<u8>,
    #[serde(default, deserialize_with = "lenient_mode")]
    pub mode: Option<ButtonMode>,
}

fn lenient_u8<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u8>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_mode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<ButtonMode>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Plugin registration, sent once after connecting
pub fn registration(register_event: &str, plugin_uuid: &str) -> Value {
    json!({ "event": register_event, "uuid": plugin_uuid })
}

/// On/off state of one key
pub fn set_state(context: &str, active: bool) -> Value {
    json!({
        "event": "setState",
        "context": context,
        "payload": { "state": u8::from(active) },
    })
}
