// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration

use serde_json::{json, Map, Value};

use crate::devices::{DeviceInfo, DeviceRef};
use crate::normalize;
use crate::snapshot::Snapshot;

const HUB_PASS_THROUGH: [&str; 5] = ["model", "type", "firmwareVersion", "osVersion", "kernelVersion"];
const DEVICE_PASS_THROUGH: [&str; 3] = ["firmwareVersion", "hwVersion", "bootVersion"];

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateTarget {
    Hub { hub_id: String },
    Device(DeviceRef),
}

/// Firmware version entity. Nothing can be installed, so the latest version
/// always equals the installed one.
#[derive(Debug, Clone)]
pub struct FirmwareUpdate {
    pub target: UpdateTarget,
    pub unique_id: String,
    pub device: DeviceInfo,
}

impl FirmwareUpdate {
    pub const NAME: &'static str = "Firmware";

    pub fn for_hub(hub_id: &str, device: DeviceInfo) -> Self {
        Self {
            target: UpdateTarget::Hub {
                hub_id: hub_id.to_string(),
            },
            unique_id: format!("ajax_{hub_id}_firmware"),
            device,
        }
    }

    pub fn for_device(dev: DeviceRef, device: DeviceInfo) -> Self {
        Self {
            unique_id: format!("ajax_{}_firmware", dev.device_id),
            target: UpdateTarget::Device(dev),
            device,
        }
    }

    pub fn installed_version(&self, snapshot: &Snapshot) -> Option<String> {
        match &self.target {
            UpdateTarget::Hub { .. } => normalize::firmware_version(&snapshot.hub_state),
            UpdateTarget::Device(dev) => snapshot.lookup(&dev.device_id, normalize::firmware_version),
        }
    }

    pub fn latest_version(&self, snapshot: &Snapshot) -> Option<String> {
        self.installed_version(snapshot)
    }

    /// JSON state document for the MQTT update platform.
    pub fn state_payload(&self, snapshot: &Snapshot) -> Value {
        json!({
            "installed_version": self.installed_version(snapshot),
            "latest_version": self.latest_version(snapshot),
        })
    }

    pub fn attributes(&self, snapshot: &Snapshot) -> Map<String, Value> {
        match &self.target {
            UpdateTarget::Hub { hub_id } => {
                let mut attrs = Map::new();
                attrs.insert("device_type".into(), Value::String("Hub".into()));
                attrs.insert("connee_id".into(), Value::String(hub_id.clone()));
                attrs.extend(normalize::pick_present(&snapshot.hub_state, &HUB_PASS_THROUGH));
                attrs
            }
            UpdateTarget::Device(dev) => {
                let mut attrs = dev.base_attributes();
                attrs.extend(normalize::pick_non_null(
                    snapshot.state_of(&dev.device_id),
                    &DEVICE_PASS_THROUGH,
                ));
                attrs
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_update() -> FirmwareUpdate {
        let dev = DeviceRef::from_record(&json!({"id": "D1", "type": "DoorProtect"})).unwrap();
        let info = DeviceInfo::for_device("H1", &dev);
        FirmwareUpdate::for_device(dev, info)
    }

    #[test]
    fn test_hub_version() {
        let hub_state = json!({"firmware": {"version": "2.30.1"}, "osVersion": "5"});
        let update = FirmwareUpdate::for_hub("H1", DeviceInfo::for_hub("H1", &hub_state));
        let snap = Snapshot::new("H1", hub_state, vec![], vec![]);

        assert_eq!(update.unique_id, "ajax_H1_firmware");
        assert_eq!(update.installed_version(&snap).as_deref(), Some("2.30.1"));
        assert_eq!(
            update.state_payload(&snap),
            json!({"installed_version": "2.30.1", "latest_version": "2.30.1"})
        );
        assert_eq!(update.attributes(&snap)["osVersion"], json!("5"));
    }

    #[test]
    fn test_device_version_falls_back_to_record() {
        let update = device_update();
        let snap = Snapshot::new(
            "H1",
            json!({}),
            vec![json!({"id": "D1", "firmwareVersion": "5.54"})],
            vec![json!({"deviceId": "D1", "hwVersion": "2"})],
        );
        assert_eq!(update.installed_version(&snap).as_deref(), Some("5.54"));
        assert_eq!(update.attributes(&snap)["hwVersion"], json!("2"));
    }

    #[test]
    fn test_unknown_version() {
        let update = device_update();
        let snap = Snapshot::empty("H1");
        assert_eq!(
            update.state_payload(&snap),
            json!({"installed_version": null, "latest_version": null})
        );
    }
}
