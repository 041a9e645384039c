// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration

/// Connee gateway endpoint proxying the Ajax Systems cloud API.
pub const GATEWAY_URL: &str = "https://hmxxkxzkovgyzqmrzapz.supabase.co/functions/v1/ajax-api";

/// Connee license validation endpoint.
pub const LICENSE_VALIDATION_URL: &str =
    "https://hmxxkxzkovgyzqmrzapz.supabase.co/functions/v1/validate-connee-token";

pub const MANUFACTURER: &str = "Ajax Systems";

pub const TOKEN_REFRESH_INTERVAL_SECS: u64 = 600;
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 10_000;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 300_000;

/// Entity platform a device type is projected onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    AlarmControlPanel,
    BinarySensor,
    Sensor,
    Switch,
    Valve,
    Light,
}

impl Platform {
    /// Look up the platform for a normalized device type.
    pub fn for_device_type(device_type: &str) -> Option<Self> {
        let platform = match device_type {
            // Door/window
            "DoorProtect" | "DoorProtectPlus" => Self::BinarySensor,
            // Motion
            "MotionProtect"
            | "MotionProtectPlus"
            | "MotionProtectCurtain"
            | "MotionProtectOutdoor"
            | "MotionCam"
            | "MotionCamOutdoor"
            | "DualCurtainOutdoor" => Self::BinarySensor,
            // Glass break, combo
            "GlassProtect" | "CombiProtect" | "CombiProtectFibra" => Self::BinarySensor,
            // Leak, fire, CO
            "LeaksProtect"
            | "FireProtect"
            | "FireProtect 2"
            | "FireProtectPlus"
            | "FireProtect 2 (Heat/Smoke/CO)"
            | "CoDetect" => Self::BinarySensor,
            // Buttons
            "Button" | "DoubleButton" => Self::BinarySensor,
            // Remotes and keypads
            "SpaceControl" | "KeyPad" | "KeyPadPlus" | "KeyPadTouchScreen" | "KeyPadFibra" => {
                Self::Sensor
            }
            // Hubs
            "Hub" | "Hub 2" | "Hub 2 Plus" | "Hub Plus" | "Hub Hybrid" => Self::AlarmControlPanel,
            // Range extenders
            "ReX" | "ReX 2" => Self::Sensor,
            // Smart plugs, relays
            "Socket" | "WallSwitch" | "Relay" => Self::Switch,
            "LightSwitch" => Self::Light,
            "WaterStop" => Self::Valve,
            // Sirens
            "StreetSiren" | "StreetSirenDoubleDeck" | "HomeSiren" => Self::Sensor,
            // Transmitters
            "Transmitter" | "MultiTransmitter" | "ocBridge Plus" => Self::Sensor,
            "Tag" | "Pass" | "LifeQuality" => Self::Sensor,
            _ => return None,
        };
        Some(platform)
    }
}

/// Home Assistant binary sensor device class for a device type.
pub fn binary_sensor_class(device_type: &str) -> Option<&'static str> {
    match device_type {
        "DoorProtect" | "DoorProtectPlus" => Some("door"),
        "MotionProtect"
        | "MotionProtectPlus"
        | "MotionProtectCurtain"
        | "MotionProtectOutdoor"
        | "MotionCam"
        | "MotionCamOutdoor"
        | "DualCurtainOutdoor"
        | "CombiProtect"
        | "CombiProtectFibra" => Some("motion"),
        "GlassProtect" => Some("vibration"),
        "LeaksProtect" => Some("moisture"),
        "FireProtect" | "FireProtect 2" | "FireProtectPlus" | "FireProtect 2 (Heat/Smoke/CO)" => {
            Some("smoke")
        }
        "CoDetect" => Some("gas"),
        _ => None,
    }
}

/// Battery-powered device types; these always get a battery sensor.
pub const BATTERY_DEVICES: &[&str] = &[
    "DoorProtect",
    "DoorProtectPlus",
    "MotionProtect",
    "MotionProtectPlus",
    "MotionProtectCurtain",
    "MotionProtectOutdoor",
    "MotionCam",
    "MotionCamOutdoor",
    "DualCurtainOutdoor",
    "GlassProtect",
    "CombiProtect",
    "CombiProtectFibra",
    "LeaksProtect",
    "FireProtect",
    "FireProtect 2",
    "FireProtectPlus",
    "CoDetect",
    "SpaceControl",
    "Button",
    "DoubleButton",
    "KeyPad",
    "KeyPadPlus",
    "KeyPadTouchScreen",
    "StreetSiren",
    "StreetSirenDoubleDeck",
    "HomeSiren",
    "Tag",
    "Pass",
    "LifeQuality",
    "WaterStop",
];

/// Device types with a built-in thermometer.
pub const TEMPERATURE_DEVICES: &[&str] = &[
    "FireProtect",
    "FireProtect 2",
    "FireProtectPlus",
    "FireProtect 2 (Heat/Smoke/CO)",
    "LifeQuality",
];

/// Map alternative spellings seen in gateway payloads onto catalogue names.
pub fn device_type_alias(raw: &str) -> &str {
    match raw {
        "DoorProtectG3" | "DoorProtect G3" => "DoorProtect",
        "FireProtect2" => "FireProtect 2",
        "KeyPadTouchscreen" => "KeyPadTouchScreen",
        "ReX2" => "ReX 2",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_lookup() {
        assert_eq!(Platform::for_device_type("DoorProtect"), Some(Platform::BinarySensor));
        assert_eq!(Platform::for_device_type("Hub 2 Plus"), Some(Platform::AlarmControlPanel));
        assert_eq!(Platform::for_device_type("Socket"), Some(Platform::Switch));
        assert_eq!(Platform::for_device_type("WaterStop"), Some(Platform::Valve));
        assert_eq!(Platform::for_device_type("KeyPad"), Some(Platform::Sensor));
        assert_eq!(Platform::for_device_type("Toaster"), None);
    }

    #[test]
    fn test_binary_sensor_class() {
        assert_eq!(binary_sensor_class("DoorProtectPlus"), Some("door"));
        assert_eq!(binary_sensor_class("LeaksProtect"), Some("moisture"));
        assert_eq!(binary_sensor_class("CoDetect"), Some("gas"));
        assert_eq!(binary_sensor_class("Button"), None);
    }

    #[test]
    fn test_aliases() {
        assert_eq!(device_type_alias("DoorProtect G3"), "DoorProtect");
        assert_eq!(device_type_alias("FireProtect2"), "FireProtect 2");
        assert_eq!(device_type_alias("ReX2"), "ReX 2");
        assert_eq!(device_type_alias("MotionCam"), "MotionCam");
    }

    #[test]
    fn test_catalogue_consistency() {
        for t in TEMPERATURE_DEVICES {
            assert!(Platform::for_device_type(t).is_some(), "{t} missing from platform map");
        }
        for t in BATTERY_DEVICES {
            assert!(Platform::for_device_type(t).is_some(), "{t} missing from platform map");
        }
    }
}
