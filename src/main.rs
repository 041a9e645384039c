// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Outgoing, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{Notify, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use ajax_gateway_bridge::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SCAN_INTERVAL_SECS, GATEWAY_URL, LICENSE_VALIDATION_URL, TOKEN_REFRESH_INTERVAL_SECS,
};
use ajax_gateway_bridge::mqtt::{
    self, Command, Topics, PAYLOAD_AVAILABLE, PAYLOAD_NOT_AVAILABLE,
};
use ajax_gateway_bridge::{
    build_entities, BridgeEvent, Coordinator, DeviceStatusFlags, Entity, GatewayConfig, Snapshot,
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "ajax2mqtt")]
#[command(about = "Bridge between the Ajax Systems cloud gateway and Home Assistant over MQTT")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Config {
    gateway: GatewayToml,
    mqtt: MqttToml,
}

#[derive(Debug, Deserialize)]
struct GatewayToml {
    email: String,
    password: String,
    /// Hub to bridge. When omitted, the first hub on the account is used.
    #[serde(default)]
    hub_id: Option<String>,
    /// Connee license token, validated once at startup when present
    #[serde(default)]
    license_token: Option<String>,
    #[serde(default = "default_gateway_url")]
    gateway_url: String,
    #[serde(default = "default_license_url")]
    license_url: String,
    #[serde(default = "default_scan_interval")]
    scan_interval_secs: u64,
    #[serde(default = "default_request_timeout")]
    request_timeout_secs: u64,
    #[serde(default = "default_token_lifetime")]
    token_lifetime_secs: u64,
    #[serde(default = "default_backoff_base")]
    backoff_base_ms: u64,
    #[serde(default = "default_backoff_max")]
    backoff_max_ms: u64,
}

fn default_gateway_url() -> String {
    GATEWAY_URL.to_string()
}
fn default_license_url() -> String {
    LICENSE_VALIDATION_URL.to_string()
}
fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL_SECS
}
fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
fn default_token_lifetime() -> u64 {
    TOKEN_REFRESH_INTERVAL_SECS
}
fn default_backoff_base() -> u64 {
    DEFAULT_BACKOFF_BASE_MS
}
fn default_backoff_max() -> u64 {
    DEFAULT_BACKOFF_MAX_MS
}

#[derive(Debug, Deserialize)]
struct MqttToml {
    url: String,
    #[serde(default = "default_client_id")]
    client_id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default = "default_discovery_prefix")]
    discovery_prefix: String,
    #[serde(default = "default_base_topic")]
    base_topic: String,
}

fn default_client_id() -> String {
    "ajax-bridge".to_string()
}
fn default_discovery_prefix() -> String {
    "homeassistant".to_string()
}
fn default_base_topic() -> String {
    "ajax2mqtt".to_string()
}

fn load_config(path: &str) -> Result<Config> {
    let text = std::fs::read_to_string(path).context("Failed to read config file")?;
    toml::from_str(&text).context("Failed to parse config file")
}

fn build_gateway_config(toml: &GatewayToml) -> Result<GatewayConfig> {
    if toml.email.trim().is_empty() || toml.password.is_empty() {
        anyhow::bail!("gateway.email and gateway.password must be set");
    }
    if toml.scan_interval_secs == 0 {
        anyhow::bail!("gateway.scan_interval_secs must be at least 1");
    }
    Ok(GatewayConfig::builder()
        .gateway_url(&toml.gateway_url)
        .license_url(&toml.license_url)
        .email(toml.email.trim())
        .password(&toml.password)
        .hub_id(toml.hub_id.clone())
        .license_token(toml.license_token.clone())
        .scan_interval(Duration::from_secs(toml.scan_interval_secs))
        .request_timeout(Duration::from_secs(toml.request_timeout_secs))
        .token_lifetime(Duration::from_secs(toml.token_lifetime_secs))
        .backoff_base(Duration::from_millis(toml.backoff_base_ms))
        .backoff_max(Duration::from_millis(toml.backoff_max_ms))
        .build())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn publish_json(client: &AsyncClient, topic: &str, payload: &impl Serialize, retain: bool) {
    match serde_json::to_string(payload) {
        Ok(json) => publish_text(client, topic, &json, retain).await,
        Err(e) => error!("Failed to serialize MQTT payload: {e}"),
    }
}

async fn publish_text(client: &AsyncClient, topic: &str, payload: &str, retain: bool) {
    if let Err(e) = client
        .publish(topic, QoS::AtLeastOnce, retain, payload.as_bytes().to_vec())
        .await
    {
        error!("Failed to publish to {topic}: {e}");
    }
}

/// Queue the command subscription from a separate task. The request queue is
/// only drained by the event loop, which must not wait on it.
fn subscribe_commands(client: &AsyncClient, filter: &str) -> tokio::task::JoinHandle<()> {
    let client = client.clone();
    let filter = filter.to_string();
    tokio::spawn(async move {
        if let Err(e) = client.subscribe(&filter, QoS::AtLeastOnce).await {
            error!("Failed to subscribe to {filter}: {e}");
        }
    })
}

/// Setup with retries. Only errors that a later attempt may fix are retried,
/// with the same doubling delay the poll backoff uses.
async fn setup_with_retry(config: &GatewayConfig) -> Result<Coordinator> {
    let base_delay_ms = config.backoff_base.as_millis() as u64;
    let max_delay_ms = config.backoff_max.as_millis() as u64;
    let mut attempt: u32 = 0;
    loop {
        if attempt > 0 {
            let delay_ms = (base_delay_ms * (1u64 << (attempt - 1).min(4))).min(max_delay_ms);
            error!(
                "Setup attempt {attempt} failed. Retrying in {:.1}s...",
                delay_ms as f64 / 1000.0
            );
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        attempt += 1;

        info!("Connecting to Ajax gateway (attempt {attempt})...");
        match Coordinator::setup(config.clone()).await {
            Ok(coordinator) => return Ok(coordinator),
            Err(e) if e.is_retryable() => warn!("Setup error: {e}"),
            Err(e) => return Err(e).context("Gateway setup failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot → MQTT
// ---------------------------------------------------------------------------

/// Publishes discovery, state and availability, remembering what the broker
/// already holds.
struct Publisher {
    client: AsyncClient,
    topics: Topics,
    hub_id: String,
    entities: Arc<RwLock<Vec<Entity>>>,
    /// unique_id → discovery topic
    discovered: HashMap<String, String>,
    online: Option<bool>,
}

impl Publisher {
    async fn sync(&mut self, snapshot: &Snapshot, force_discovery: bool) {
        let entities = build_entities(snapshot);
        let mut current = HashSet::new();

        for entity in &entities {
            let unique_id = entity.unique_id().to_string();
            if force_discovery || !self.discovered.contains_key(&unique_id) {
                let topic = self.topics.config(&self.hub_id, entity);
                debug!("Publishing discovery for {unique_id}");
                let config = mqtt::discovery_config(&self.topics, entity);
                publish_json(&self.client, &topic, &config, true).await;
                self.discovered.insert(unique_id.clone(), topic);
            }
            publish_text(
                &self.client,
                &self.topics.state(&unique_id),
                &mqtt::state_payload(entity, snapshot),
                true,
            )
            .await;
            publish_json(
                &self.client,
                &self.topics.attributes(&unique_id),
                &mqtt::attributes_payload(entity, snapshot),
                true,
            )
            .await;
            current.insert(unique_id);
        }

        let stale: Vec<String> = self
            .discovered
            .keys()
            .filter(|id| !current.contains(*id))
            .cloned()
            .collect();
        for unique_id in stale {
            if let Some(topic) = self.discovered.remove(&unique_id) {
                info!("Entity {unique_id} no longer reported, removing");
                publish_text(&self.client, &topic, "", true).await;
            }
        }

        *self.entities.write().await = entities;
    }

    async fn set_available(&mut self, online: bool) {
        if self.online == Some(online) {
            return;
        }
        self.online = Some(online);
        let payload = if online { PAYLOAD_AVAILABLE } else { PAYLOAD_NOT_AVAILABLE };
        info!("Bridge availability: {payload}");
        publish_text(&self.client, &self.topics.availability(), payload, true).await;
    }

    async fn publish_event(&self, event: &BridgeEvent, snapshot: &Snapshot) {
        if let Some(message) = mqtt::event_message(event, snapshot) {
            publish_json(&self.client, &self.topics.events(), &message, false).await;
        }
    }
}

fn log_bridge_event(event: &BridgeEvent, snapshot: &Snapshot) {
    match event {
        BridgeEvent::DeviceStatusChanged {
            device_id,
            new,
            changed,
            ..
        } => {
            let set = DeviceStatusFlags::set_event_names(*changed, *new);
            let unset = DeviceStatusFlags::unset_event_names(*changed, *new);
            let record = snapshot.device_record(device_id);
            let name = record
                .get("deviceName")
                .or_else(|| record.get("name"))
                .and_then(|v| v.as_str())
                .unwrap_or(device_id.as_str());
            info!(
                "Device {device_id} ({name}) changed: set=[{}] unset=[{}]",
                set.join(","),
                unset.join(",")
            );
        }
        BridgeEvent::HubArmStateChanged { old, new } => {
            info!("Hub {} arm state {old:?} -> {new:?}", snapshot.hub_id);
        }
        BridgeEvent::LoggedIn => debug!("Gateway session renewed"),
        BridgeEvent::SnapshotUpdated => debug!("Snapshot updated"),
        BridgeEvent::RefreshFailed { reason } => warn!("Poll failed: {reason}"),
    }
}

// ---------------------------------------------------------------------------
// MQTT command handler
// ---------------------------------------------------------------------------

async fn handle_command(
    coordinator: &Coordinator,
    entities: &RwLock<Vec<Entity>>,
    unique_id: &str,
    payload: &str,
) {
    let command = {
        let entities = entities.read().await;
        match entities.iter().find(|e| e.unique_id() == unique_id) {
            Some(entity) => mqtt::parse_command(entity, payload),
            None => {
                warn!("Command for unknown entity {unique_id}: {payload}");
                return;
            }
        }
    };

    match command {
        Command::Arm(mode) => {
            info!("Command: {} hub {}", mode.as_gateway_str(), coordinator.hub_id());
            match coordinator.arm(mode).await {
                Ok(()) => info!("{}: success", mode.as_gateway_str()),
                Err(e) => error!("{} failed: {e}", mode.as_gateway_str()),
            }
        }
        Command::ReadOnly { unique_id, payload } => {
            warn!(
                "Cannot apply {payload} to {unique_id}: Ajax API does not support remote control. \
                 This entity is read-only."
            );
        }
        Command::Invalid { unique_id, payload } => {
            warn!("Unsupported command for {unique_id}: {payload}");
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=ajax_gateway_bridge=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    let mut gateway_config = build_gateway_config(&config.gateway)?;
    let mut mqtt_config = config.mqtt;
    let (mut mqtt_host, mut mqtt_port) = parse_mqtt_url(&mqtt_config.url)?;

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        let coordinator = tokio::select! {
            result = setup_with_retry(&gateway_config) => Arc::new(result?),
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT during setup, shutting down...");
                return Ok(());
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM during setup, shutting down...");
                return Ok(());
            }
        };
        let hub_id = coordinator.hub_id().to_string();
        info!("Gateway ready, bridging hub {hub_id}");

        // Set up MQTT
        let topics = Topics::new(&mqtt_config.discovery_prefix, &mqtt_config.base_topic);
        let mut mqtt_opts = MqttOptions::new(&mqtt_config.client_id, &mqtt_host, mqtt_port);
        mqtt_opts.set_keep_alive(Duration::from_secs(30));
        mqtt_opts.set_last_will(LastWill::new(
            topics.availability(),
            PAYLOAD_NOT_AVAILABLE,
            QoS::AtLeastOnce,
            true,
        ));
        if let (Some(user), Some(pass)) = (&mqtt_config.username, &mqtt_config.password) {
            mqtt_opts.set_credentials(user, pass);
        }
        let (client, mut eventloop) = AsyncClient::new(mqtt_opts, 256);

        let entities = Arc::new(RwLock::new(build_entities(&coordinator.snapshot().await)));
        let republish = Arc::new(Notify::new());

        // Task 1: poll loop
        let coordinator_poll = Arc::clone(&coordinator);
        let poll_handle = tokio::spawn(async move {
            let mut ticker = interval(coordinator_poll.scan_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Skip the first immediate tick (setup already refreshed)
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = coordinator_poll.refresh().await {
                    debug!("Refresh error: {e}");
                }
            }
        });

        // Task 2: MQTT event loop (receives messages, handles commands)
        let coordinator_cmds = Arc::clone(&coordinator);
        let entities_cmds = Arc::clone(&entities);
        let client_cmds = client.clone();
        let topics_cmds = topics.clone();
        let republish_cmds = Arc::clone(&republish);
        let mqtt_handle = tokio::spawn(async move {
            let filter = topics_cmds.command_filter();
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        // rumqttc does not resubscribe after a reconnect
                        info!("MQTT: connected, subscribing to {filter}");
                        let _ = subscribe_commands(&client_cmds, &filter);
                        republish_cmds.notify_one();
                    }
                    Ok(Event::Incoming(Packet::Publish(msg))) => {
                        let Some(unique_id) = topics_cmds.command_target(&msg.topic) else {
                            continue;
                        };
                        let payload = String::from_utf8_lossy(&msg.payload).to_string();
                        info!("MQTT command received for {unique_id}: {payload}");
                        let unique_id = unique_id.to_string();
                        let coordinator = Arc::clone(&coordinator_cmds);
                        let entities = Arc::clone(&entities_cmds);
                        tokio::spawn(async move {
                            handle_command(&coordinator, &entities, &unique_id, &payload).await;
                        });
                    }
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        debug!("MQTT: disconnect sent");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("MQTT event loop error: {e}");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        // Task 3: bridge events → discovery, state and availability
        let coordinator_pub = Arc::clone(&coordinator);
        let mut publisher = Publisher {
            client: client.clone(),
            topics: topics.clone(),
            hub_id: hub_id.clone(),
            entities: Arc::clone(&entities),
            discovered: HashMap::new(),
            online: None,
        };
        let mut event_rx = coordinator.subscribe();
        let publish_handle = tokio::spawn(async move {
            let snapshot_handle = coordinator_pub.snapshot_handle();
            loop {
                tokio::select! {
                    event = event_rx.recv() => match event {
                        Ok(BridgeEvent::SnapshotUpdated) => {
                            let snapshot = coordinator_pub.snapshot().await;
                            publisher.sync(&snapshot, false).await;
                            publisher.set_available(true).await;
                        }
                        Ok(event) => {
                            let snapshot = snapshot_handle.read().await;
                            log_bridge_event(&event, &snapshot);
                            publisher.publish_event(&event, &snapshot).await;
                            drop(snapshot);
                            if matches!(event, BridgeEvent::RefreshFailed { .. }) {
                                publisher.set_available(false).await;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Event receiver lagged, missed {n} events");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                            info!("Event channel closed");
                            break;
                        }
                    },
                    _ = republish.notified() => {
                        info!("Publishing discovery for hub {}", publisher.hub_id);
                        let snapshot = coordinator_pub.snapshot().await;
                        publisher.sync(&snapshot, true).await;
                        publisher.online = None;
                        publisher.set_available(coordinator_pub.last_update_success()).await;
                    }
                }
            }
        });

        // Wait for a signal
        info!("MQTT bridge running. Send SIGHUP to restart, SIGINT/SIGTERM to stop.");
        let restart = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down...");
                false
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                false
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading config and restarting connections...");
                true
            }
        };

        poll_handle.abort();
        publish_handle.abort();

        // Mark entities unavailable while the event loop can still flush it
        publish_text(&client, &topics.availability(), PAYLOAD_NOT_AVAILABLE, true).await;
        if let Err(e) = client.disconnect().await {
            warn!("Error disconnecting from MQTT broker: {e}");
        }
        let mqtt_abort = mqtt_handle.abort_handle();
        if tokio::time::timeout(Duration::from_secs(2), mqtt_handle).await.is_err() {
            mqtt_abort.abort();
        }

        if !restart {
            break;
        }

        // Reload config from disk; keep previous config on failure
        info!("Reloading config from {}", cli.config);
        match load_config(&cli.config) {
            Ok(new_config) => match build_gateway_config(&new_config.gateway) {
                Ok(new_gateway_config) => match parse_mqtt_url(&new_config.mqtt.url) {
                    Ok((new_host, new_port)) => {
                        gateway_config = new_gateway_config;
                        mqtt_host = new_host;
                        mqtt_port = new_port;
                        mqtt_config = new_config.mqtt;
                        info!("Config reloaded successfully");
                    }
                    Err(e) => warn!("Invalid MQTT URL in new config, keeping previous: {e}"),
                },
                Err(e) => warn!("Invalid gateway config in new config, keeping previous: {e}"),
            },
            Err(e) => warn!("Failed to reload config, keeping previous: {e}"),
        }

        info!("Reconnecting...");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Parse an MQTT URL like "mqtt://host:port" into (host, port).
fn parse_mqtt_url(url: &str) -> Result<(String, u16)> {
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port_str) = stripped
        .rsplit_once(':')
        .context("MQTT URL must be in format mqtt://host:port")?;

    let port: u16 = port_str.parse().context("Invalid MQTT port number")?;

    Ok((host.to_string(), port))
}
