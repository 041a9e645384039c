// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration

use serde_json::{Map, Value};

use crate::devices::{DeviceInfo, DeviceRef};
use crate::normalize;
use crate::snapshot::Snapshot;

const PASS_THROUGH: [&str; 13] = [
    "switchState",
    "state",
    "powerState",
    "relayState",
    "power",
    "voltage",
    "current",
    "energy",
    "extPower",
    "batteryChargeLevelPercentage",
    "signalLevel",
    "firmwareVersion",
    "on",
];

/// Socket, WallSwitch or Relay output. State only: the gateway has no
/// command for switching outputs.
#[derive(Debug, Clone)]
pub struct Switch {
    pub dev: DeviceRef,
    pub unique_id: String,
    pub device: DeviceInfo,
}

impl Switch {
    pub const CONTROL_NOTE: &'static str = "Ajax API does not support remote switch control";

    pub fn new(dev: DeviceRef, device: DeviceInfo) -> Self {
        Self {
            unique_id: format!("ajax_{}_switch", dev.device_id),
            dev,
            device,
        }
    }

    pub fn is_on(&self, snapshot: &Snapshot) -> Option<bool> {
        normalize::switch_on(snapshot.state_of(&self.dev.device_id))
    }

    pub fn attributes(&self, snapshot: &Snapshot) -> Map<String, Value> {
        let mut attrs = self.dev.base_attributes();
        attrs.insert("read_only".into(), Value::Bool(true));
        attrs.insert("control_note".into(), Value::String(Self::CONTROL_NOTE.into()));
        attrs.extend(normalize::pick_present(
            snapshot.state_of(&self.dev.device_id),
            &PASS_THROUGH,
        ));
        attrs
    }
}
