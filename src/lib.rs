// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration
//
//! # ajax-gateway-bridge
//!
//! Polls Ajax Systems alarm hubs through the Connee cloud gateway and
//! projects hub and device state onto Home Assistant entities (alarm panel,
//! binary sensors, sensors, switches, valves and firmware updates).
//!
//! The library owns the gateway session, the poll cycle with its backoff,
//! and the field normalization; publishing over MQTT is left to the
//! `ajax2mqtt` binary, which uses the payload builders in [`mqtt`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use ajax_gateway_bridge::{build_entities, Coordinator, GatewayConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = GatewayConfig::builder()
//!         .email("user@example.com")
//!         .password("secret")
//!         .build();
//!
//!     let coordinator = Coordinator::setup(config).await?;
//!
//!     let snapshot = coordinator.snapshot().await;
//!     for entity in build_entities(&snapshot) {
//!         println!("{} = {:?}", entity.unique_id(), entity.state(&snapshot));
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod backoff;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod devices;
pub mod error;
pub mod event;
pub mod mqtt;
pub mod normalize;
pub mod snapshot;

// Re-exports for convenience
pub use api::{GatewayClient, Hub};
pub use backoff::Backoff;
pub use config::{ArmMode, GatewayConfig, GatewayConfigBuilder};
pub use coordinator::Coordinator;
pub use devices::status::DeviceStatusFlags;
pub use devices::{build_entities, DeviceInfo, Entity};
pub use error::{GatewayError, Result};
pub use event::{BridgeEvent, EventReceiver};
pub use normalize::HubArmState;
pub use snapshot::Snapshot;
