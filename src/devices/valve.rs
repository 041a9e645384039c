// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration

use serde_json::{Map, Value};

use crate::devices::{DeviceInfo, DeviceRef};
use crate::normalize;
use crate::snapshot::Snapshot;

const PASS_THROUGH: [&str; 10] = [
    "valveState",
    "motorState",
    "tempProtectState",
    "extPower",
    "preventionEnable",
    "preventionDaysPeriod",
    "errorDescriptions",
    "batteryChargeLevelPercentage",
    "signalLevel",
    "firmwareVersion",
];

/// WaterStop valve. State only, like [`super::Switch`].
#[derive(Debug, Clone)]
pub struct Valve {
    pub dev: DeviceRef,
    pub unique_id: String,
    pub device: DeviceInfo,
}

impl Valve {
    pub const CONTROL_NOTE: &'static str = "Ajax API does not support remote valve control";

    pub fn new(dev: DeviceRef, device: DeviceInfo) -> Self {
        Self {
            unique_id: format!("ajax_{}_valve", dev.device_id),
            dev,
            device,
        }
    }

    pub fn is_closed(&self, snapshot: &Snapshot) -> Option<bool> {
        normalize::valve_closed(snapshot.state_of(&self.dev.device_id))
    }

    pub fn is_opening(&self, snapshot: &Snapshot) -> bool {
        self.motor(snapshot).as_deref() == Some("OPENING")
    }

    pub fn is_closing(&self, snapshot: &Snapshot) -> bool {
        self.motor(snapshot).as_deref() == Some("CLOSING")
    }

    fn motor(&self, snapshot: &Snapshot) -> Option<String> {
        normalize::motor_state(snapshot.state_of(&self.dev.device_id))
    }

    /// Valve state as Home Assistant names it. A moving motor takes
    /// precedence over the last end position.
    pub fn state(&self, snapshot: &Snapshot) -> Option<&'static str> {
        if self.is_opening(snapshot) {
            return Some("opening");
        }
        if self.is_closing(snapshot) {
            return Some("closing");
        }
        self.is_closed(snapshot)
            .map(|closed| if closed { "closed" } else { "open" })
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
