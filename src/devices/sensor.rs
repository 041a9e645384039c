// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration

use serde_json::{Map, Value};

use crate::devices::{DeviceInfo, DeviceRef};
use crate::normalize;
use crate::snapshot::Snapshot;

const RAW_BATTERY_FIELDS: [&str; 4] = ["battery", "batteryCharge", "batteryLevel", "batteryPercent"];
const RAW_SIGNAL_FIELDS: [&str; 5] =
    ["signal", "signalLevel", "signalStrength", "rssi", "connectionQuality"];

/// What a [`Sensor`] measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Generic `triggered` / `ok` status
    Status,
    /// Battery charge, %
    Battery,
    /// Radio signal level
    Signal,
    /// Temperature, °C
    Temperature,
}

impl SensorKind {
    fn suffix(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Battery => "battery",
            Self::Signal => "signal",
            Self::Temperature => "temperature",
        }
    }

    pub fn device_class(&self) -> Option<&'static str> {
        match self {
            Self::Battery => Some("battery"),
            Self::Temperature => Some("temperature"),
            Self::Status | Self::Signal => None,
        }
    }

    pub fn unit(&self) -> Option<&'static str> {
        match self {
            Self::Battery => Some("%"),
            Self::Temperature => Some("°C"),
            Self::Status | Self::Signal => None,
        }
    }

    /// Status is a text value; everything else is a measurement.
    pub fn state_class(&self) -> Option<&'static str> {
        match self {
            Self::Status => None,
            _ => Some("measurement"),
        }
    }

    pub fn icon(&self) -> Option<&'static str> {
        match self {
            Self::Signal => Some("mdi:wifi"),
            Self::Temperature => Some("mdi:thermometer"),
            Self::Status | Self::Battery => None,
        }
    }
}

/// A per-device sensor.
#[derive(Debug, Clone)]
pub struct Sensor {
    pub kind: SensorKind,
    pub dev: DeviceRef,
    pub unique_id: String,
    pub device: DeviceInfo,
}

impl Sensor {
    pub fn new(kind: SensorKind, dev: DeviceRef, device: DeviceInfo) -> Self {
        Self {
            unique_id: format!("ajax_{}_{}", dev.device_id, kind.suffix()),
            kind,
            dev,
            device,
        }
    }

    /// The status sensor carries the device name; the others are named by
    /// what they measure.
    pub fn name(&self) -> &str {
        match self.kind {
            SensorKind::Status => &self.dev.display_name,
            SensorKind::Battery => "Battery",
            SensorKind::Signal => "Signal",
            SensorKind::Temperature => "Temperature",
        }
    }

    /// Current value rendered as a payload, `None` when unknown.
    pub fn value(&self, snapshot: &Snapshot) -> Option<String> {
        let id = self.dev.device_id.as_str();
        match self.kind {
            SensorKind::Status => {
                let active = normalize::status_active(snapshot.state_of(id));
                Some(if active { "triggered" } else { "ok" }.to_string())
            }
            SensorKind::Battery => snapshot.lookup(id, normalize::battery_level).map(|v| v.to_string()),
            SensorKind::Signal => snapshot.lookup(id, normalize::signal_level).map(|v| v.to_string()),
            SensorKind::Temperature => {
                normalize::temperature(snapshot.state_of(id)).map(|v| v.to_string())
            }
        }
    }

    pub fn attributes(&self, snapshot: &Snapshot) -> Map<String, Value> {
        let id = self.dev.device_id.as_str();
        let state = snapshot.state_of(id);
        let mut attrs = self.dev.base_attributes();
        match self.kind {
            SensorKind::Status => {
                let record = snapshot.device_record(id);
                for (attr, key) in [
                    ("name_candidate_deviceName", "deviceName"),
                    ("name_candidate_name", "name"),
                ] {
                    attrs.insert(attr.into(), record.get(key).cloned().unwrap_or(Value::Null));
                }
            }
            SensorKind::Battery => {
                attrs.insert(
                    "raw_battery_fields".into(),
                    Value::Object(normalize::pick_non_null(state, &RAW_BATTERY_FIELDS)),
                );
            }
            SensorKind::Signal => {
                attrs.insert("online".into(), Value::Bool(normalize::is_online(state)));
                attrs.insert(
                    "raw_signal_fields".into(),
                    Value::Object(normalize::pick_non_null(state, &RAW_SIGNAL_FIELDS)),
                );
            }
            SensorKind::Temperature => {}
        }
        attrs
    }
}
