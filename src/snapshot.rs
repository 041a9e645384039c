// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::devices::status::DeviceStatusFlags;
use crate::normalize::{self, HubArmState};

static NULL: Value = Value::Null;

/// The latest data fetched from the gateway for one hub.
///
/// Entities never hold their own copy of device data; every getter reads
/// from the snapshot current at the time of the call.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub hub_id: String,
    /// Raw `get-hub` payload
    pub hub_state: Value,
    /// Raw `get-hub-devices` records
    pub devices: Vec<Value>,
    /// `get-all-device-states` records indexed by device id
    pub device_states: HashMap<String, Value>,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    /// Build a snapshot, indexing state records by `deviceId` (or `id`).
    /// Records without either are dropped.
    pub fn new(
        hub_id: impl Into<String>,
        hub_state: Value,
        devices: Vec<Value>,
        states: Vec<Value>,
    ) -> Self {
        let device_states = states
            .into_iter()
            .filter_map(|s| normalize::state_device_id(&s).map(|id| (id, s)))
            .collect();
        Self {
            hub_id: hub_id.into(),
            hub_state: if hub_state.is_object() { hub_state } else { Value::Object(Default::default()) },
            devices,
            device_states,
            fetched_at: Utc::now(),
        }
    }

    /// An empty snapshot for a hub that has not been polled yet.
    pub fn empty(hub_id: impl Into<String>) -> Self {
        Self::new(hub_id, Value::Null, Vec::new(), Vec::new())
    }

    /// Live state record of a device, or `null` when the gateway sent none.
    pub fn state_of(&self, device_id: &str) -> &Value {
        self.device_states.get(device_id).unwrap_or(&NULL)
    }

    /// Device record from the device list.
    pub fn device(&self, device_id: &str) -> Option<&Value> {
        self.devices
            .iter()
            .find(|d| normalize::device_id(d).as_deref() == Some(device_id))
    }

    /// Device record, or `null` when the device list has none.
    pub fn device_record(&self, device_id: &str) -> &Value {
        self.device(device_id).unwrap_or(&NULL)
    }

    /// Whether the hub payload carried anything at all.
    pub fn has_hub_state(&self) -> bool {
        self.hub_state.as_object().is_some_and(|m| !m.is_empty())
    }

    pub fn hub_arm_state(&self) -> HubArmState {
        normalize::hub_arm_state(&self.hub_state)
    }

    /// Derived status flags for a device's live state.
    pub fn device_status(&self, device_id: &str) -> DeviceStatusFlags {
        DeviceStatusFlags::from_state(self.state_of(device_id))
    }

    /// Resolve a value from the live state first, then the device record.
    pub fn lookup<T>(&self, device_id: &str, f: impl Fn(&Value) -> Option<T>) -> Option<T> {
        f(self.state_of(device_id)).or_else(|| self.device(device_id).and_then(&f))
    }

    /// Device ids that have a record in the device list.
    pub fn device_ids(&self) -> impl Iterator<Item = String> + '_ {
        self.devices.iter().filter_map(normalize::device_id)
    }
}
