// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration

//! Entities projected from a hub snapshot.
//!
//! Entities carry identity only (ids, names, device grouping). Every value
//! they expose is read from the [`Snapshot`] passed in at call time.

pub mod alarm_panel;
pub mod binary_sensor;
pub mod sensor;
pub mod status;
pub mod switch;
pub mod update;
pub mod valve;

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::constants::{Platform, BATTERY_DEVICES, MANUFACTURER, TEMPERATURE_DEVICES};
use crate::normalize::{self, BATTERY_PRESENCE_KEYS, TEMPERATURE_KEYS};
use crate::snapshot::Snapshot;

pub use alarm_panel::AlarmPanel;
pub use binary_sensor::BinarySensor;
pub use sensor::{Sensor, SensorKind};
pub use switch::Switch;
pub use update::FirmwareUpdate;
pub use valve::Valve;

/// Home Assistant device grouping shared by all entities of one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via_device: Option<String>,
}

impl DeviceInfo {
    pub fn for_hub(hub_id: &str, hub_state: &Value) -> Self {
        Self {
            identifiers: vec![format!("ajax_{hub_id}")],
            name: normalize::hub_name(hub_state),
            manufacturer: MANUFACTURER.to_string(),
            model: normalize::hub_model(hub_state),
            sw_version: normalize::firmware_version(hub_state),
            via_device: None,
        }
    }

    pub fn for_device(hub_id: &str, dev: &DeviceRef) -> Self {
        Self {
            identifiers: vec![format!("ajax_{}", dev.device_id)],
            name: dev.display_name.clone(),
            manufacturer: MANUFACTURER.to_string(),
            model: dev.device_type.clone(),
            sw_version: None,
            via_device: Some(format!("ajax_{hub_id}")),
        }
    }
}

/// Identity of a paired device, resolved once from its device record.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRef {
    pub device_id: String,
    pub device_type: String,
    pub display_name: String,
}

impl DeviceRef {
    /// `None` for records without an id.
    pub fn from_record(device: &Value) -> Option<Self> {
        let device_id = normalize::device_id(device)?;
        let device_type = normalize::device_type(device);
        let display_name = normalize::display_name(device, &device_type);
        Some(Self {
            device_id,
            device_type,
            display_name,
        })
    }

    /// Attributes every per-device entity starts from.
    pub fn base_attributes(&self) -> Map<String, Value> {
        let mut attrs = Map::new();
        attrs.insert("device_type".into(), Value::String(self.device_type.clone()));
        attrs.insert("connee_id".into(), Value::String(self.device_id.clone()));
        attrs
    }
}

/// Any entity the bridge exposes.
#[derive(Debug, Clone)]
pub enum Entity {
    AlarmPanel(AlarmPanel),
    BinarySensor(BinarySensor),
    Sensor(Sensor),
    Switch(Switch),
    Valve(Valve),
    Update(FirmwareUpdate),
}

impl Entity {
    /// Home Assistant component name.
    pub fn component(&self) -> &'static str {
        match self {
            Entity::AlarmPanel(_) => "alarm_control_panel",
            Entity::BinarySensor(_) => "binary_sensor",
            Entity::Sensor(_) => "sensor",
            Entity::Switch(_) => "switch",
            Entity::Valve(_) => "valve",
            Entity::Update(_) => "update",
        }
    }

    pub fn unique_id(&self) -> &str {
        match self {
            Entity::AlarmPanel(e) => &e.unique_id,
            Entity::BinarySensor(e) => &e.unique_id,
            Entity::Sensor(e) => &e.unique_id,
            Entity::Switch(e) => &e.unique_id,
            Entity::Valve(e) => &e.unique_id,
            Entity::Update(e) => &e.unique_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::AlarmPanel(_) => AlarmPanel::NAME,
            Entity::BinarySensor(e) => &e.dev.display_name,
            Entity::Sensor(e) => e.name(),
            Entity::Switch(e) => &e.dev.display_name,
            Entity::Valve(e) => &e.dev.display_name,
            Entity::Update(_) => FirmwareUpdate::NAME,
        }
    }

    pub fn device_info(&self) -> &DeviceInfo {
        match self {
            Entity::AlarmPanel(e) => &e.device,
            Entity::BinarySensor(e) => &e.device,
            Entity::Sensor(e) => &e.device,
            Entity::Switch(e) => &e.device,
            Entity::Valve(e) => &e.device,
            Entity::Update(e) => &e.device,
        }
    }

    /// Whether the entity listens on a command topic.
    pub fn accepts_commands(&self) -> bool {
        matches!(
            self,
            Entity::AlarmPanel(_) | Entity::Switch(_) | Entity::Valve(_)
        )
    }

    /// Current state as an MQTT payload; `None` when the value is unknown.
    pub fn state(&self, snapshot: &Snapshot) -> Option<String> {
        match self {
            Entity::AlarmPanel(e) => Some(e.state(snapshot).as_ha_state().to_string()),
            Entity::BinarySensor(e) => Some(on_off(e.is_on(snapshot)).to_string()),
            Entity::Sensor(e) => e.value(snapshot),
            Entity::Switch(e) => e.is_on(snapshot).map(|on| on_off(on).to_string()),
            Entity::Valve(e) => e.state(snapshot).map(str::to_string),
            Entity::Update(e) => Some(e.state_payload(snapshot).to_string()),
        }
    }

    pub fn attributes(&self, snapshot: &Snapshot) -> Map<String, Value> {
        match self {
            Entity::AlarmPanel(e) => e.attributes(snapshot),
            Entity::BinarySensor(e) => e.attributes(snapshot),
            Entity::Sensor(e) => e.attributes(snapshot),
            Entity::Switch(e) => e.attributes(snapshot),
            Entity::Valve(e) => e.attributes(snapshot),
            Entity::Update(e) => e.attributes(snapshot),
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

/// Build every entity for the hub and its devices.
///
/// Hub records in the device list are skipped (the hub is the alarm panel),
/// as are records without an id and repeated ids.
pub fn build_entities(snapshot: &Snapshot) -> Vec<Entity> {
    let hub_id = snapshot.hub_id.as_str();
    let hub_info = DeviceInfo::for_hub(hub_id, &snapshot.hub_state);

    let mut entities = vec![Entity::AlarmPanel(AlarmPanel::new(hub_id, hub_info.clone()))];
    if snapshot.has_hub_state() {
        entities.push(Entity::Update(FirmwareUpdate::for_hub(hub_id, hub_info)));
    }

    let mut seen = HashSet::new();
    for record in &snapshot.devices {
        let Some(dev) = DeviceRef::from_record(record) else {
            continue;
        };
        let platform = Platform::for_device_type(&dev.device_type);
        if platform == Some(Platform::AlarmControlPanel) || !seen.insert(dev.device_id.clone()) {
            continue;
        }

        let state = snapshot.state_of(&dev.device_id);
        let info = DeviceInfo::for_device(hub_id, &dev);
        let device_type = dev.device_type.as_str();

        if platform == Some(Platform::BinarySensor) || normalize::has_contact_field(state) {
            entities.push(Entity::BinarySensor(BinarySensor::new(dev.clone(), info.clone())));
        }
        if platform != Some(Platform::BinarySensor) {
            entities.push(Entity::Sensor(Sensor::new(SensorKind::Status, dev.clone(), info.clone())));
        }
        if BATTERY_DEVICES.contains(&device_type)
            || normalize::has_any_key(state, &BATTERY_PRESENCE_KEYS)
        {
            entities.push(Entity::Sensor(Sensor::new(SensorKind::Battery, dev.clone(), info.clone())));
        }
        entities.push(Entity::Sensor(Sensor::new(SensorKind::Signal, dev.clone(), info.clone())));
        if TEMPERATURE_DEVICES.contains(&device_type)
            || normalize::has_any_key(state, &TEMPERATURE_KEYS)
        {
            entities.push(Entity::Sensor(Sensor::new(
                SensorKind::Temperature,
                dev.clone(),
                info.clone(),
            )));
        }
        match platform {
            Some(Platform::Switch) => {
                entities.push(Entity::Switch(Switch::new(dev.clone(), info.clone())));
            }
            Some(Platform::Valve) => {
                entities.push(Entity::Valve(Valve::new(dev.clone(), info.clone())));
            }
            _ => {}
        }
        entities.push(Entity::Update(FirmwareUpdate::for_device(dev, info)));
    }
    entities
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(entities: &[Entity]) -> Vec<&str> {
        entities.iter().map(Entity::unique_id).collect()
    }

    #[test]
    fn test_hub_only() {
        let snap = Snapshot::new("H1", json!({"armState": "ARM"}), vec![], vec![]);
        let entities = build_entities(&snap);
        assert_eq!(ids(&entities), vec!["ajax_H1_alarm", "ajax_H1_firmware"]);
        assert_eq!(entities[0].state(&snap).as_deref(), Some("armed_away"));
    }

    #[test]
    fn test_no_hub_state_means_no_hub_update_entity() {
        let snap = Snapshot::empty("H1");
        assert_eq!(ids(&build_entities(&snap)), vec!["ajax_H1_alarm"]);
    }

    #[test]
    fn test_door_sensor_entities() {
        let snap = Snapshot::new(
            "H1",
            json!({}),
            vec![json!({"id": "D1", "type": "DoorProtect", "deviceName": "Front door"})],
            vec![json!({"deviceId": "D1", "reedClosed": false, "batteryCharge": 90})],
        );
        let entities = build_entities(&snap);
        assert_eq!(
            ids(&entities),
            vec![
                "ajax_H1_alarm",
                "ajax_D1",
                "ajax_D1_battery",
                "ajax_D1_signal",
                "ajax_D1_firmware",
            ]
        );
        let door = &entities[1];
        assert_eq!(door.component(), "binary_sensor");
        assert_eq!(door.name(), "Front door");
        assert_eq!(door.state(&snap).as_deref(), Some("ON"));
        assert_eq!(door.device_info().via_device.as_deref(), Some("ajax_H1"));
    }

    #[test]
    fn test_socket_and_waterstop() {
        let snap = Snapshot::new(
            "H1",
            json!({"armState": "DISARM"}),
            vec![
                json!({"id": "S1", "type": "Socket"}),
                json!({"id": "W1", "type": "WaterStop", "name": "Main valve"}),
            ],
            vec![
                json!({"deviceId": "S1", "switchState": "ON"}),
                json!({"deviceId": "W1", "valveState": "CLOSED", "temperature": 18.44}),
            ],
        );
        let entities = build_entities(&snap);
        assert_eq!(
            ids(&entities),
            vec![
                "ajax_H1_alarm",
                "ajax_H1_firmware",
                "ajax_S1_status",
                "ajax_S1_signal",
                "ajax_S1_switch",
                "ajax_S1_firmware",
                "ajax_W1_status",
                "ajax_W1_battery",
                "ajax_W1_signal",
                "ajax_W1_temperature",
                "ajax_W1_valve",
                "ajax_W1_firmware",
            ]
        );
        let by_id = |id: &str| entities.iter().find(|e| e.unique_id() == id).unwrap();
        assert_eq!(by_id("ajax_S1_switch").state(&snap).as_deref(), Some("ON"));
        assert_eq!(by_id("ajax_W1_valve").state(&snap).as_deref(), Some("closed"));
        assert_eq!(by_id("ajax_W1_temperature").state(&snap).as_deref(), Some("18.4"));
        assert!(by_id("ajax_W1_valve").accepts_commands());
        assert!(!by_id("ajax_W1_battery").accepts_commands());
    }

    #[test]
    fn test_contact_field_adds_binary_sensor_to_unknown_type() {
        let snap = Snapshot::new(
            "H1",
            json!({}),
            vec![json!({"id": "X1", "type": "NewGadget"})],
            vec![json!({"deviceId": "X1", "openState": "OPEN"})],
        );
        let entities = build_entities(&snap);
        assert!(ids(&entities).contains(&"ajax_X1"));
        assert!(ids(&entities).contains(&"ajax_X1_status"));
    }

    #[test]
    fn test_skips_hubs_missing_ids_and_duplicates() {
        let snap = Snapshot::new(
            "H1",
            json!({}),
            vec![
                json!({"id": "H1", "type": "Hub 2 Plus"}),
                json!({"type": "MotionProtect"}),
                json!({"id": "M1", "type": "MotionProtect"}),
                json!({"deviceId": "M1", "type": "MotionProtect"}),
            ],
            vec![],
        );
        let entities = build_entities(&snap);
        assert_eq!(
            ids(&entities),
            vec![
                "ajax_H1_alarm",
                "ajax_M1",
                "ajax_M1_battery",
                "ajax_M1_signal",
                "ajax_M1_firmware",
            ]
        );
    }

    #[test]
    fn test_hub_device_info() {
        let info = DeviceInfo::for_hub(
            "H1",
            &json!({"name": "Home", "model": "Hub 2 Plus", "firmware": {"version": "2.30"}}),
        );
        assert_eq!(info.identifiers, vec!["ajax_H1"]);
        assert_eq!(info.name, "Home");
        assert_eq!(info.sw_version.as_deref(), Some("2.30"));
        assert_eq!(info.via_device, None);
    }
}
