// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration

//! Best-effort field normalization for gateway payloads.
//!
//! The gateway forwards whatever the Ajax cloud returns, and different hub
//! firmware and API revisions spell the same concept in different ways
//! (`batteryCharge`, `batteryLevel`, `batteryChargeLevelPercentage`, ...).
//! Every accessor here tries the known spellings in a fixed order and returns
//! `None` when nothing usable is present.

use serde_json::{Map, Value};

use crate::constants::device_type_alias;

const BATTERY_KEYS: [&str; 8] = [
    "batteryChargeLevelPercentage",
    "batteryCharge",
    "batteryLevel",
    "batteryPercent",
    "batteryPercentage",
    "battery",
    "battery_charge",
    "battery_level",
];
const BATTERY_VALUE_KEYS: [&str; 5] = ["value", "percent", "percentage", "level", "charge"];
const BATTERY_NESTED_KEYS: [&str; 6] =
    ["charge", "level", "percent", "percentage", "value", "chargePercentage"];

const SIGNAL_KEYS: [&str; 6] = [
    "signalLevel",
    "signal",
    "signalStrength",
    "rssi",
    "connectionQuality",
    "linkQuality",
];
const SIGNAL_VALUE_KEYS: [&str; 5] = ["value", "level", "signal", "quality", "rssi"];
const SIGNAL_NESTED_KEYS: [&str; 5] = ["signal", "level", "quality", "rssi", "value"];

/// Fields whose presence marks a state record as a contact (door/window) sensor.
pub const CONTACT_KEYS: [&str; 4] = ["reedClosed", "openState", "magneticState", "contactState"];
/// Fields whose presence marks a state record as battery-reporting.
pub const BATTERY_PRESENCE_KEYS: [&str; 4] =
    ["battery", "batteryLevel", "batteryCharge", "batteryChargeLevelPercentage"];
/// Fields whose presence marks a state record as temperature-reporting.
pub const TEMPERATURE_KEYS: [&str; 2] = ["temperature", "temp"];

const SWITCH_KEYS: [&str; 5] = ["switchState", "state", "powerState", "relayState", "on"];

/// Hub arm state as understood by Home Assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HubArmState {
    Disarmed,
    ArmedAway,
    ArmedHome,
    ArmedNight,
}

impl HubArmState {
    /// Map the gateway's arm state string. Unknown values read as disarmed.
    pub fn from_gateway(raw: &str) -> Self {
        match raw.to_uppercase().as_str() {
            "ARM" | "ARMED" => Self::ArmedAway,
            "PARTIAL_ARM" => Self::ArmedHome,
            "NIGHT_ARM" => Self::ArmedNight,
            _ => Self::Disarmed,
        }
    }

    /// Home Assistant alarm_control_panel state string.
    pub fn as_ha_state(&self) -> &'static str {
        match self {
            Self::Disarmed => "disarmed",
            Self::ArmedAway => "armed_away",
            Self::ArmedHome => "armed_home",
            Self::ArmedNight => "armed_night",
        }
    }
}

/// Truthiness of a loosely-typed JSON value.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// A non-empty string or a number rendered as a string.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First key of `keys` holding a non-empty string or number.
pub fn first_id(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| obj.get(*k).and_then(id_string))
}

/// First key of `keys` holding a non-empty string.
pub fn first_str<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str).filter(|s| !s.is_empty()))
}

fn upper_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_uppercase(),
        other => other.to_string().to_uppercase(),
    }
}

/// Gateway identifier of a device record.
pub fn device_id(obj: &Value) -> Option<String> {
    first_id(obj, &["id", "deviceId"])
}

/// Gateway identifier of a device state record.
pub fn state_device_id(obj: &Value) -> Option<String> {
    first_id(obj, &["deviceId", "id"])
}

/// Normalized device type, with known aliases folded onto catalogue names.
pub fn device_type(obj: &Value) -> String {
    let raw = first_str(obj, &["type", "deviceType"]).unwrap_or("").trim();
    device_type_alias(raw).to_string()
}

/// User-assigned name, falling back to the device type.
pub fn display_name(obj: &Value, device_type: &str) -> String {
    first_str(obj, &["deviceName", "name", "label"])
        .or_else(|| {
            obj.get("device")
                .and_then(|d| d.get("name"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or(device_type)
        .to_string()
}

/// Coerce numbers, numeric strings and wrapper objects into an integer.
///
/// Booleans never count as numbers. For objects, the first present key from
/// `nested_keys` decides the result.
pub fn coerce_int(value: &Value, nested_keys: &[&str]) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64),
        Value::Object(map) => nested_keys
            .iter()
            .find(|k| map.contains_key(**k))
            .and_then(|k| coerce_int(&map[*k], nested_keys)),
        _ => None,
    }
}

/// Battery charge in percent.
pub fn battery_level(obj: &Value) -> Option<i64> {
    let direct = BATTERY_KEYS
        .iter()
        .find_map(|k| obj.get(*k).and_then(|v| coerce_int(v, &BATTERY_VALUE_KEYS)));
    if direct.is_some() {
        return direct;
    }
    let nested = obj.get("battery").filter(|b| b.is_object())?;
    BATTERY_NESTED_KEYS
        .iter()
        .find_map(|k| nested.get(*k).and_then(|v| coerce_int(v, &BATTERY_VALUE_KEYS)))
}

/// Radio signal level as reported by the device.
pub fn signal_level(obj: &Value) -> Option<i64> {
    let direct = SIGNAL_KEYS
        .iter()
        .find_map(|k| obj.get(*k).and_then(|v| coerce_int(v, &SIGNAL_VALUE_KEYS)));
    if direct.is_some() {
        return direct;
    }
    let nested = obj.get("connection").filter(|c| c.is_object())?;
    SIGNAL_NESTED_KEYS
        .iter()
        .find_map(|k| nested.get(*k).and_then(|v| coerce_int(v, &SIGNAL_VALUE_KEYS)))
}

/// Temperature in °C, rounded to one decimal.
pub fn temperature(obj: &Value) -> Option<f64> {
    let raw = match obj.get("temperature") {
        Some(v) => v,
        None => obj.get("temp")?,
    };
    let value = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then(|| (value * 10.0).round() / 10.0)
}

/// Whether a contact sensor reports open. `None` when no contact field exists.
pub fn contact_open(obj: &Value) -> Option<bool> {
    if let Some(Value::Bool(closed)) = obj.get("reedClosed") {
        return Some(!closed);
    }
    if let Some(Value::Bool(open)) = obj.get("openState") {
        return Some(*open);
    }
    ["openState", "contactState", "magneticState"]
        .iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find_map(|s| match s.trim().to_uppercase().as_str() {
            "OPEN" | "OPENED" | "ON" => Some(true),
            "CLOSED" | "CLOSE" | "OFF" => Some(false),
            _ => None,
        })
}

/// Whether the record carries any contact field at all.
pub fn has_contact_field(obj: &Value) -> bool {
    has_any_key(obj, &CONTACT_KEYS)
}

pub fn has_any_key(obj: &Value, keys: &[&str]) -> bool {
    obj.as_object()
        .is_some_and(|m| keys.iter().any(|k| m.contains_key(*k)))
}

/// Binary sensor "on": contact open, or a motion/alarm-like flag raised.
pub fn is_triggered(obj: &Value) -> bool {
    if let Some(open) = contact_open(obj) {
        return open;
    }
    let flag = |k: &str| matches!(obj.get(k), Some(Value::Bool(true)));
    if flag("active") || flag("triggered") || flag("alarm") {
        return true;
    }
    obj.get("alarmState").is_some_and(|v| upper_string(v) == "ALARM")
}

/// Generic status used by the main sensor: `active`, else `triggered`.
pub fn status_active(obj: &Value) -> bool {
    match obj.get("active") {
        Some(v) => truthy(v),
        None => obj.get("triggered").is_some_and(truthy),
    }
}

/// Relay/socket output state.
pub fn switch_on(obj: &Value) -> Option<bool> {
    SWITCH_KEYS.iter().find_map(|k| match obj.get(*k)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => Some(matches!(
            s.trim().to_uppercase().as_str(),
            "ON" | "TRUE" | "1" | "ENABLED"
        )),
        Value::Number(n) => Some(n.as_f64().is_some_and(|f| f > 0.0)),
        _ => None,
    })
}

/// WaterStop valve closed state.
pub fn valve_closed(obj: &Value) -> Option<bool> {
    match obj.get("valveState") {
        None | Some(Value::Null) => None,
        Some(v) => Some(upper_string(v) == "CLOSED"),
    }
}

/// WaterStop motor state, upper-cased (e.g. `OPENING`, `CLOSING`).
pub fn motor_state(obj: &Value) -> Option<String> {
    match obj.get("motorState") {
        None | Some(Value::Null) => None,
        Some(v) => Some(upper_string(v)),
    }
}

/// Online flag; devices are assumed online unless told otherwise.
pub fn is_online(obj: &Value) -> bool {
    match obj.get("online") {
        Some(v) => truthy(v),
        None => obj.get("isOnline").is_none_or(truthy),
    }
}

/// Installed firmware version.
pub fn firmware_version(obj: &Value) -> Option<String> {
    if let Some(v) = obj
        .get("firmware")
        .and_then(|f| f.get("version"))
        .and_then(id_string)
    {
        return Some(v);
    }
    first_id(obj, &["firmwareVersion", "firmware_version"])
}

/// Hub arm state from the `armState` field, falling back to `state`.
pub fn hub_arm_state(hub: &Value) -> HubArmState {
    let raw = match hub.get("armState").or_else(|| hub.get("state")) {
        Some(v) => upper_string(v),
        None => "UNKNOWN".to_string(),
    };
    HubArmState::from_gateway(&raw)
}

/// Hub display name.
pub fn hub_name(hub: &Value) -> String {
    first_str(hub, &["name", "hubName"]).unwrap_or("Ajax Hub").to_string()
}

/// Hub model.
pub fn hub_model(hub: &Value) -> String {
    first_str(hub, &["model", "type"]).unwrap_or("Hub").to_string()
}

/// Copy the listed keys that are present, nulls included.
pub fn pick_present(obj: &Value, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k).map(|v| ((*k).to_string(), v.clone())))
        .collect()
}

/// Copy the listed keys that are present and non-null.
pub fn pick_non_null(obj: &Value, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|k| match obj.get(*k) {
            None | Some(Value::Null) => None,
            Some(v) => Some(((*k).to_string(), v.clone())),
        })
        .collect()
}
