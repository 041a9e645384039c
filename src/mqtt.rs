// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration

//! Home Assistant MQTT discovery: topics, discovery documents, state and
//! event payloads, and inbound command parsing.
//!
//! Nothing here talks to a broker; the binary publishes what these
//! functions build.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::config::ArmMode;
use crate::devices::status::DeviceStatusFlags;
use crate::devices::{AlarmPanel, DeviceInfo, Entity};
use crate::event::BridgeEvent;
use crate::normalize;
use crate::snapshot::Snapshot;

pub const PAYLOAD_AVAILABLE: &str = "online";
pub const PAYLOAD_NOT_AVAILABLE: &str = "offline";
/// Payload Home Assistant treats as an unknown sensor value.
pub const PAYLOAD_UNKNOWN: &str = "None";

/// Topic layout for one bridge instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Topics {
    discovery_prefix: String,
    base_topic: String,
}

impl Topics {
    pub fn new(discovery_prefix: impl Into<String>, base_topic: impl Into<String>) -> Self {
        Self {
            discovery_prefix: discovery_prefix.into().trim_end_matches('/').to_string(),
            base_topic: base_topic.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn availability(&self) -> String {
        format!("{}/availability", self.base_topic)
    }

    /// `{prefix}/{component}/ajax_{hub}/{unique_id}/config`
    pub fn config(&self, hub_id: &str, entity: &Entity) -> String {
        format!(
            "{}/{}/ajax_{}/{}/config",
            self.discovery_prefix,
            entity.component(),
            hub_id,
            entity.unique_id()
        )
    }

    pub fn state(&self, unique_id: &str) -> String {
        format!("{}/{unique_id}/state", self.base_topic)
    }

    pub fn attributes(&self, unique_id: &str) -> String {
        format!("{}/{unique_id}/attributes", self.base_topic)
    }

    pub fn command(&self, unique_id: &str) -> String {
        format!("{}/{unique_id}/set", self.base_topic)
    }

    /// Wildcard subscription covering every command topic.
    pub fn command_filter(&self) -> String {
        format!("{}/+/set", self.base_topic)
    }

    pub fn events(&self) -> String {
        format!("{}/events", self.base_topic)
    }

    /// Unique id addressed by a command topic, if `topic` is one.
    pub fn command_target<'a>(&self, topic: &'a str) -> Option<&'a str> {
        let rest = topic.strip_prefix(self.base_topic.as_str())?.strip_prefix('/')?;
        let unique_id = rest.strip_suffix("/set")?;
        (!unique_id.is_empty() && !unique_id.contains('/')).then_some(unique_id)
    }
}

/// Discovery document published (retained) to the config topic.
#[derive(Debug, Clone, Serialize)]
pub struct EntityConfig {
    pub name: String,
    pub unique_id: String,
    pub object_id: String,
    pub device: DeviceInfo,
    pub availability_topic: String,
    pub state_topic: String,
    pub json_attributes_topic: String,
    #[serde(flatten)]
    pub platform: PlatformConfig,
}

/// Component-specific discovery fields.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PlatformConfig {
    AlarmControlPanel {
        command_topic: String,
        supported_features: Vec<&'static str>,
        code_arm_required: bool,
        code_disarm_required: bool,
    },
    BinarySensor {
        #[serde(skip_serializing_if = "Option::is_none")]
        device_class: Option<&'static str>,
        payload_on: &'static str,
        payload_off: &'static str,
    },
    Sensor {
        #[serde(skip_serializing_if = "Option::is_none")]
        device_class: Option<&'static str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        unit_of_measurement: Option<&'static str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        state_class: Option<&'static str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        icon: Option<&'static str>,
    },
    Switch {
        command_topic: String,
        device_class: &'static str,
        payload_on: &'static str,
        payload_off: &'static str,
    },
    Valve {
        command_topic: String,
        device_class: &'static str,
        reports_position: bool,
    },
    Update {
        device_class: &'static str,
    },
}

/// Build the discovery document for an entity.
pub fn discovery_config(topics: &Topics, entity: &Entity) -> EntityConfig {
    let unique_id = entity.unique_id();
    let command_topic = topics.command(unique_id);
    let platform = match entity {
        Entity::AlarmPanel(_) => PlatformConfig::AlarmControlPanel {
            command_topic,
            supported_features: AlarmPanel::SUPPORTED_FEATURES.to_vec(),
            code_arm_required: false,
            code_disarm_required: false,
        },
        Entity::BinarySensor(e) => PlatformConfig::BinarySensor {
            device_class: e.device_class,
            payload_on: "ON",
            payload_off: "OFF",
        },
        Entity::Sensor(e) => PlatformConfig::Sensor {
            device_class: e.kind.device_class(),
            unit_of_measurement: e.kind.unit(),
            state_class: e.kind.state_class(),
            icon: e.kind.icon(),
        },
        Entity::Switch(_) => PlatformConfig::Switch {
            command_topic,
            device_class: "outlet",
            payload_on: "ON",
            payload_off: "OFF",
        },
        Entity::Valve(_) => PlatformConfig::Valve {
            command_topic,
            device_class: "water",
            reports_position: false,
        },
        Entity::Update(_) => PlatformConfig::Update {
            device_class: "firmware",
        },
    };

    EntityConfig {
        name: entity.name().to_string(),
        unique_id: unique_id.to_string(),
        object_id: unique_id.to_string(),
        device: entity.device_info().clone(),
        availability_topic: topics.availability(),
        state_topic: topics.state(unique_id),
        json_attributes_topic: topics.attributes(unique_id),
        platform,
    }
}

/// State payload; unknown values become [`PAYLOAD_UNKNOWN`].
pub fn state_payload(entity: &Entity, snapshot: &Snapshot) -> String {
    entity
        .state(snapshot)
        .unwrap_or_else(|| PAYLOAD_UNKNOWN.to_string())
}

pub fn attributes_payload(entity: &Entity, snapshot: &Snapshot) -> Value {
    Value::Object(entity.attributes(snapshot))
}

// Event messages share the flat {now, op, ...} layout

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EventMessage {
    Device(DeviceEventMessage),
    Hub(HubEventMessage),
    Simple(SimpleEventMessage),
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceEventMessage {
    pub now: u64,
    pub op: String,
    pub device: String,
    pub name: String,
    #[serde(rename = "eventStr")]
    pub event_str: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HubEventMessage {
    pub now: u64,
    pub op: String,
    pub hub: String,
    pub state: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimpleEventMessage {
    pub now: u64,
    pub op: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn now_epoch_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Translate a bridge event into the message published on the events topic.
///
/// `SnapshotUpdated` and `LoggedIn` are not published.
pub fn event_message(event: &BridgeEvent, snapshot: &Snapshot) -> Option<EventMessage> {
    match event {
        BridgeEvent::HubArmStateChanged { new, .. } => Some(EventMessage::Hub(HubEventMessage {
            now: now_epoch_ms(),
            op: "HUB_ARM_STATE_CHANGE".to_string(),
            hub: snapshot.hub_id.clone(),
            state: new.as_ha_state().to_string(),
        })),
        BridgeEvent::DeviceStatusChanged {
            device_id,
            new,
            changed,
            ..
        } => {
            let set = DeviceStatusFlags::set_event_names(*changed, *new);
            let unset = DeviceStatusFlags::unset_event_names(*changed, *new);
            let record = snapshot.device_record(device_id);
            let device_type = normalize::device_type(record);
            Some(EventMessage::Device(DeviceEventMessage {
                now: now_epoch_ms(),
                op: "DEVICE_STATUS_CHANGE".to_string(),
                device: device_id.clone(),
                name: normalize::display_name(record, &device_type),
                event_str: format!("set=[{}] unset=[{}]", set.join(","), unset.join(",")),
            }))
        }
        BridgeEvent::RefreshFailed { reason } => Some(EventMessage::Simple(SimpleEventMessage {
            now: now_epoch_ms(),
            op: "REFRESH_FAILED".to_string(),
            reason: Some(reason.clone()),
        })),
        BridgeEvent::LoggedIn | BridgeEvent::SnapshotUpdated => None,
    }
}

/// What to do with a payload received on an entity's command topic.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Arm or disarm the hub
    Arm(ArmMode),
    /// Switch/valve command; the gateway cannot execute it
    ReadOnly { unique_id: String, payload: String },
    /// Payload not understood by the addressed entity
    Invalid { unique_id: String, payload: String },
}

pub fn parse_command(entity: &Entity, payload: &str) -> Command {
    let unique_id = entity.unique_id().to_string();
    let payload = payload.trim().to_string();
    match entity {
        Entity::AlarmPanel(_) => match ArmMode::from_ha_command(&payload) {
            Some(mode) => Command::Arm(mode),
            None => Command::Invalid { unique_id, payload },
        },
        Entity::Switch(_) | Entity::Valve(_) => Command::ReadOnly { unique_id, payload },
        _ => Command::Invalid { unique_id, payload },
    }
}
