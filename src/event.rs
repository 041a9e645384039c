// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration

use crate::devices::status::DeviceStatusFlags;
use crate::normalize::HubArmState;

/// All events that can be emitted by the coordinator.
///
/// Users subscribe via `coordinator.subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<BridgeEvent>`.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    /// A new session token was obtained
    LoggedIn,
    /// A poll cycle completed and the snapshot was replaced
    SnapshotUpdated,
    /// The hub's arm state differs from the previous snapshot
    HubArmStateChanged {
        old: HubArmState,
        new: HubArmState,
    },
    /// A device's derived status flags changed between polls
    DeviceStatusChanged {
        device_id: String,
        old: DeviceStatusFlags,
        new: DeviceStatusFlags,
        changed: DeviceStatusFlags,
    },
    /// A poll cycle failed; the previous snapshot is still served
    RefreshFailed {
        reason: String,
    },
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<BridgeEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<BridgeEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
