// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration

use serde_json::{Map, Value};

use crate::devices::DeviceInfo;
use crate::normalize::HubArmState;
use crate::snapshot::Snapshot;

/// The hub as an alarm control panel.
#[derive(Debug, Clone)]
pub struct AlarmPanel {
    pub hub_id: String,
    pub unique_id: String,
    pub device: DeviceInfo,
}

impl AlarmPanel {
    pub const NAME: &'static str = "Ajax Alarm";

    /// Arm modes offered alongside disarm.
    pub const SUPPORTED_FEATURES: [&'static str; 3] = ["arm_away", "arm_home", "arm_night"];

    pub fn new(hub_id: &str, device: DeviceInfo) -> Self {
        Self {
            hub_id: hub_id.to_string(),
            unique_id: format!("ajax_{hub_id}_alarm"),
            device,
        }
    }

    pub fn state(&self, snapshot: &Snapshot) -> HubArmState {
        snapshot.hub_arm_state()
    }

    pub fn attributes(&self, snapshot: &Snapshot) -> Map<String, Value> {
        let mut attrs = Map::new();
        attrs.insert("device_type".into(), Value::String("Hub".into()));
        attrs.insert("connee_id".into(), Value::String(self.hub_id.clone()));
        if let Some(raw) = snapshot
            .hub_state
            .get("armState")
            .or_else(|| snapshot.hub_state.get("state"))
        {
            attrs.insert("arm_state".into(), raw.clone());
        }
        attrs
    }
}
