// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration

use serde_json::{Map, Value};

use crate::constants::binary_sensor_class;
use crate::devices::{DeviceInfo, DeviceRef};
use crate::normalize;
use crate::snapshot::Snapshot;

const PASS_THROUGH: [&str; 8] = [
    "battery",
    "batteryLevel",
    "batteryCharge",
    "signal",
    "signalLevel",
    "signalStrength",
    "online",
    "isOnline",
];

/// Door, motion, leak, smoke and similar detectors.
#[derive(Debug, Clone)]
pub struct BinarySensor {
    pub dev: DeviceRef,
    pub unique_id: String,
    pub device_class: Option<&'static str>,
    pub device: DeviceInfo,
}

impl BinarySensor {
    pub fn new(dev: DeviceRef, device: DeviceInfo) -> Self {
        Self {
            unique_id: format!("ajax_{}", dev.device_id),
            device_class: binary_sensor_class(&dev.device_type),
            dev,
            device,
        }
    }

    /// On when the contact is open or the detector is triggered.
    pub fn is_on(&self, snapshot: &Snapshot) -> bool {
        normalize::is_triggered(snapshot.state_of(&self.dev.device_id))
    }

    pub fn attributes(&self, snapshot: &Snapshot) -> Map<String, Value> {
        let record = snapshot.device_record(&self.dev.device_id);
        let mut attrs = self.dev.base_attributes();
        attrs.insert(
            "name_candidate_deviceName".into(),
            record.get("deviceName").cloned().unwrap_or(Value::Null),
        );
        attrs.insert(
            "name_candidate_name".into(),
            record.get("name").cloned().unwrap_or(Value::Null),
        );
        attrs.extend(normalize::pick_present(
            snapshot.state_of(&self.dev.device_id),
            &PASS_THROUGH,
        ));
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sensor(device_type: &str) -> BinarySensor {
        let dev = DeviceRef::from_record(&json!({"id": "D1", "type": device_type})).unwrap();
        let info = DeviceInfo::for_device("H1", &dev);
        BinarySensor::new(dev, info)
    }

    fn snap(state: Value) -> Snapshot {
        Snapshot::new(
            "H1",
            json!({}),
            vec![json!({"id": "D1", "deviceName": "Hall", "type": "MotionProtect"})],
            vec![state],
        )
    }

    #[test]
    fn test_device_class() {
        assert_eq!(sensor("DoorProtect").device_class, Some("door"));
        assert_eq!(sensor("LeaksProtect").device_class, Some("moisture"));
        assert_eq!(sensor("Button").device_class, None);
    }

    #[test]
    fn test_is_on() {
        let s = sensor("DoorProtect");
        assert!(s.is_on(&snap(json!({"deviceId": "D1", "reedClosed": false}))));
        assert!(!s.is_on(&snap(json!({"deviceId": "D1", "reedClosed": true, "active": true}))));
        assert!(s.is_on(&snap(json!({"deviceId": "D1", "alarmState": "alarm"}))));
        assert!(!s.is_on(&snap(json!({"deviceId": "D1"}))));
        assert!(!s.is_on(&Snapshot::empty("H1")));
    }

    #[test]
    fn test_attributes() {
        let s = sensor("MotionProtect");
        let attrs = s.attributes(&snap(json!({"deviceId": "D1", "signalLevel": 3, "online": true})));
        assert_eq!(attrs["device_type"], json!("MotionProtect"));
        assert_eq!(attrs["connee_id"], json!("D1"));
        assert_eq!(attrs["name_candidate_deviceName"], json!("Hall"));
        assert_eq!(attrs["name_candidate_name"], Value::Null);
        assert_eq!(attrs["signalLevel"], json!(3));
        assert!(!attrs.contains_key("battery"));
    }
}
