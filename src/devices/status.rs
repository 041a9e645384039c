// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration

use bitflags::bitflags;
use serde_json::Value;

use crate::normalize;

/// Battery level at or below which a device is flagged as low.
pub const LOW_BATTERY_PERCENT: i64 = 20;

bitflags! {
    /// Derived booleans for one device, computed from its state record.
    ///
    /// Used to detect per-poll changes so that only real transitions are
    /// reported as events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceStatusFlags: u16 {
        /// Contact reports open
        const OPEN         = 0b0000_0001;
        /// Motion / alarm / contact-open
        const TRIGGERED    = 0b0000_0010;
        /// Battery at or below the low threshold
        const LOW_BATTERY  = 0b0000_0100;
        /// Device reported offline
        const OFFLINE      = 0b0000_1000;
        /// Relay/socket output on
        const SWITCH_ON    = 0b0001_0000;
        /// WaterStop valve closed
        const VALVE_CLOSED = 0b0010_0000;
        /// Tamper lid open
        const TAMPER       = 0b0100_0000;
    }
}

impl DeviceStatusFlags {
    /// Compute flags from a state record.
    pub fn from_state(state: &Value) -> Self {
        let mut flags = Self::empty();
        if normalize::contact_open(state) == Some(true) {
            flags |= Self::OPEN;
        }
        if normalize::is_triggered(state) {
            flags |= Self::TRIGGERED;
        }
        if normalize::battery_level(state).is_some_and(|b| b <= LOW_BATTERY_PERCENT) {
            flags |= Self::LOW_BATTERY;
        }
        if !normalize::is_online(state) {
            flags |= Self::OFFLINE;
        }
        if normalize::switch_on(state) == Some(true) {
            flags |= Self::SWITCH_ON;
        }
        if normalize::valve_closed(state) == Some(true) {
            flags |= Self::VALVE_CLOSED;
        }
        if matches!(state.get("tampered"), Some(Value::Bool(true))) {
            flags |= Self::TAMPER;
        }
        flags
    }

    /// Get the flags that changed between old and new status.
    pub fn changed(old: Self, new: Self) -> Self {
        old ^ new
    }

    /// Names for flags that became set.
    pub fn set_event_names(changed: Self, new: Self) -> Vec<&'static str> {
        let became_set = changed & new;
        let mut events = Vec::new();
        if became_set.contains(Self::OPEN) { events.push("Opened"); }
        if became_set.contains(Self::TRIGGERED) { events.push("Triggered"); }
        if became_set.contains(Self::LOW_BATTERY) { events.push("LowBattery"); }
        if became_set.contains(Self::OFFLINE) { events.push("Offline"); }
        if became_set.contains(Self::SWITCH_ON) { events.push("SwitchedOn"); }
        if became_set.contains(Self::VALVE_CLOSED) { events.push("ValveClosed"); }
        if became_set.contains(Self::TAMPER) { events.push("Tamper"); }
        events
    }

    /// Names for flags that became unset.
    pub fn unset_event_names(changed: Self, new: Self) -> Vec<&'static str> {
        let became_unset = changed & !new;
        let mut events = Vec::new();
        if became_unset.contains(Self::OPEN) { events.push("Closed"); }
        if became_unset.contains(Self::TRIGGERED) { events.push("Idle"); }
        if became_unset.contains(Self::LOW_BATTERY) { events.push("BatteryOk"); }
        if became_unset.contains(Self::OFFLINE) { events.push("Online"); }
        if became_unset.contains(Self::SWITCH_ON) { events.push("SwitchedOff"); }
        if became_unset.contains(Self::VALVE_CLOSED) { events.push("ValveOpened"); }
        if became_unset.contains(Self::TAMPER) { events.push("TamperOk"); }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flags_from_door_state() {
        let flags = DeviceStatusFlags::from_state(&json!({
            "reedClosed": false,
            "batteryChargeLevelPercentage": 15,
            "online": true
        }));
        assert!(flags.contains(DeviceStatusFlags::OPEN));
        assert!(flags.contains(DeviceStatusFlags::TRIGGERED));
        assert!(flags.contains(DeviceStatusFlags::LOW_BATTERY));
        assert!(!flags.contains(DeviceStatusFlags::OFFLINE));
    }

    #[test]
    fn test_empty_state_has_no_flags() {
        assert_eq!(DeviceStatusFlags::from_state(&json!({})), DeviceStatusFlags::empty());
        assert_eq!(DeviceStatusFlags::from_state(&Value::Null), DeviceStatusFlags::empty());
    }

    #[test]
    fn test_actuator_flags() {
        let flags = DeviceStatusFlags::from_state(&json!({
            "switchState": "ON",
            "valveState": "CLOSED",
            "isOnline": false,
            "tampered": true
        }));
        assert!(flags.contains(DeviceStatusFlags::SWITCH_ON));
        assert!(flags.contains(DeviceStatusFlags::VALVE_CLOSED));
        assert!(flags.contains(DeviceStatusFlags::OFFLINE));
        assert!(flags.contains(DeviceStatusFlags::TAMPER));
    }

    #[test]
    fn test_event_names() {
        let old = DeviceStatusFlags::OPEN | DeviceStatusFlags::TRIGGERED;
        let new = DeviceStatusFlags::LOW_BATTERY;
        let changed = DeviceStatusFlags::changed(old, new);
        assert_eq!(DeviceStatusFlags::set_event_names(changed, new), vec!["LowBattery"]);
        assert_eq!(
            DeviceStatusFlags::unset_event_names(changed, new),
            vec!["Closed", "Idle"]
        );
    }
}
