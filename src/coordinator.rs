// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::api::{GatewayClient, Hub};
use crate::backoff::Backoff;
use crate::config::{ArmMode, GatewayConfig};
use crate::error::{GatewayError, Result};
use crate::event::{event_channel, BridgeEvent, EventReceiver, EventSender};
use crate::snapshot::Snapshot;

/// Client and backoff are only ever touched together, under one lock.
struct Session {
    client: GatewayClient,
    backoff: Backoff,
}

/// Owner of the fetch cycle and of the latest hub snapshot.
///
/// # Example
///
/// ```no_run
/// use ajax_gateway_bridge::{ArmMode, Coordinator, GatewayConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = GatewayConfig::builder()
///         .email("user@example.com")
///         .password("secret")
///         .build();
///
///     let coordinator = Coordinator::setup(config).await?;
///
///     let mut events = coordinator.subscribe();
///     tokio::spawn(async move {
///         while let Ok(event) = events.recv().await {
///             println!("Event: {:?}", event);
///         }
///     });
///
///     coordinator.arm(ArmMode::Night).await?;
///     let snapshot = coordinator.snapshot().await;
///     println!("Hub {} is {:?}", snapshot.hub_id, snapshot.hub_arm_state());
///     Ok(())
/// }
/// ```
pub struct Coordinator {
    session: Mutex<Session>,
    hub: Hub,
    scan_interval: Duration,
    snapshot: Arc<RwLock<Snapshot>>,
    last_update_success: AtomicBool,
    event_tx: EventSender,
}

impl Coordinator {
    /// Wrap an already configured client for a known hub. No request is made.
    pub fn new(client: GatewayClient, hub: Hub) -> Self {
        let config = client.config();
        let backoff = Backoff::new(config.backoff_base, config.backoff_max);
        let scan_interval = config.scan_interval;
        let (event_tx, _event_rx) = event_channel(256);
        Self {
            session: Mutex::new(Session { client, backoff }),
            snapshot: Arc::new(RwLock::new(Snapshot::empty(hub.id.clone()))),
            hub,
            scan_interval,
            last_update_success: AtomicBool::new(false),
            event_tx,
        }
    }

    /// Validate the license (if configured), log in, pick the hub and run
    /// the first refresh.
    pub async fn setup(config: GatewayConfig) -> Result<Self> {
        let mut client = GatewayClient::new(config)?;
        let config = client.config().clone();

        if let Some(token) = &config.license_token
            && !client.validate_license(token, &config.email).await?
        {
            return Err(GatewayError::InvalidConfig {
                reason: "Connee license token rejected".to_string(),
            });
        }

        client.login().await?;
        let hubs = client.get_hubs().await?;
        let hub = select_hub(hubs, config.hub_id.as_deref())?;
        info!(hub_id = %hub.id, "Using hub {}", hub.name);

        let coordinator = Self::new(client, hub);
        let _ = coordinator.event_tx.send(BridgeEvent::LoggedIn);
        coordinator.refresh().await?;
        Ok(coordinator)
    }

    /// Subscribe to bridge events.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn hub_id(&self) -> &str {
        &self.hub.id
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    /// Whether the most recent refresh succeeded.
    pub fn last_update_success(&self) -> bool {
        self.last_update_success.load(Ordering::Relaxed)
    }

    /// Copy of the current snapshot.
    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    /// Shared handle to the snapshot, for readers that outlive a single call.
    pub fn snapshot_handle(&self) -> Arc<RwLock<Snapshot>> {
        Arc::clone(&self.snapshot)
    }

    /// Run one poll cycle.
    ///
    /// On failure the previous snapshot is kept and a
    /// [`BridgeEvent::RefreshFailed`] is emitted.
    pub async fn refresh(&self) -> Result<()> {
        let mut session = self.session.lock().await;

        let now = Instant::now();
        if !session.backoff.ready(now) {
            let remaining = session.backoff.remaining(now);
            debug!("Skipping refresh, backing off for {:.1}s", remaining.as_secs_f64());
            return Err(self.fail(GatewayError::BackingOff { remaining }));
        }

        match self.fetch(&mut session.client).await {
            Ok(snapshot) => {
                session.backoff.record_success();
                drop(session);
                self.apply(snapshot).await;
                Ok(())
            }
            Err(e) => {
                if !record_error(&mut session, &e) {
                    error!("Refresh failed: {}", e);
                }
                Err(self.fail(e))
            }
        }
    }

    /// Log in again when the held token has reached its lifetime.
    async fn ensure_session(&self, client: &mut GatewayClient) -> Result<()> {
        if client.token_expired(Instant::now()) {
            debug!("Session token expired, logging in again");
            client.refresh_token().await?;
            let _ = self.event_tx.send(BridgeEvent::LoggedIn);
        }
        Ok(())
    }

    async fn fetch(&self, client: &mut GatewayClient) -> Result<Snapshot> {
        self.ensure_session(client).await?;

        let hub_id = &self.hub.id;
        let hub_state = client.get_hub_state(hub_id).await?;
        let devices = client.get_hub_devices(hub_id).await?;
        let states = client.get_device_states(hub_id).await?;
        debug!(
            hub_id = %hub_id,
            devices = devices.len(),
            states = states.len(),
            "Fetched hub data"
        );
        Ok(Snapshot::new(hub_id.clone(), hub_state, devices, states))
    }

    async fn apply(&self, snapshot: Snapshot) {
        let events = {
            let mut current = self.snapshot.write().await;
            let events = diff_events(&current, &snapshot);
            *current = snapshot;
            events
        };
        self.last_update_success.store(true, Ordering::Relaxed);
        for event in events {
            let _ = self.event_tx.send(event);
        }
        let _ = self.event_tx.send(BridgeEvent::SnapshotUpdated);
    }

    fn fail(&self, e: GatewayError) -> GatewayError {
        self.last_update_success.store(false, Ordering::Relaxed);
        let _ = self.event_tx.send(BridgeEvent::RefreshFailed {
            reason: e.to_string(),
        });
        e
    }

    /// Send an arm/disarm command for the hub, then refresh.
    ///
    /// A failed follow-up refresh is logged but does not fail the command.
    pub async fn arm(&self, mode: ArmMode) -> Result<()> {
        {
            let mut session = self.session.lock().await;
            let now = Instant::now();
            if !session.backoff.ready(now) {
                return Err(GatewayError::BackingOff {
                    remaining: session.backoff.remaining(now),
                });
            }
            let result = match self.ensure_session(&mut session.client).await {
                Ok(()) => session.client.arm_hub(&self.hub.id, mode).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                record_error(&mut session, &e);
                return Err(e);
            }
        }
        if let Err(e) = self.refresh().await {
            warn!("Refresh after arm command failed: {}", e);
        }
        Ok(())
    }
}

/// Drop the session and extend the backoff as the error demands. Returns
/// whether a backoff step was recorded.
fn record_error(session: &mut Session, e: &GatewayError) -> bool {
    if e.invalidates_session() {
        session.client.invalidate_session();
    }
    if !e.is_backoff_trigger() {
        return false;
    }
    let delay = session.backoff.record_failure(Instant::now());
    warn!(
        "Gateway refused request ({}), backing off {:.1}s (failure {})",
        e,
        delay.as_secs_f64(),
        session.backoff.failures()
    );
    true
}

/// Pick the configured hub, or the first one when none is configured.
fn select_hub(hubs: Vec<Hub>, wanted: Option<&str>) -> Result<Hub> {
    if hubs.is_empty() {
        return Err(GatewayError::NoHubs);
    }
    match wanted {
        Some(id) => hubs
            .into_iter()
            .find(|h| h.id == id)
            .ok_or_else(|| GatewayError::HubNotFound { hub_id: id.to_string() }),
        None => hubs.into_iter().next().ok_or(GatewayError::NoHubs),
    }
}

/// Events describing what changed between two snapshots of the same hub.
///
/// Nothing is reported against a side that never saw the hub or device, so
/// the first poll after startup is silent.
pub fn diff_events(old: &Snapshot, new: &Snapshot) -> Vec<BridgeEvent> {
    let mut events = Vec::new();

    if old.has_hub_state() && new.has_hub_state() {
        let (old_arm, new_arm) = (old.hub_arm_state(), new.hub_arm_state());
        if old_arm != new_arm {
            events.push(BridgeEvent::HubArmStateChanged {
                old: old_arm,
                new: new_arm,
            });
        }
    }

    let ids: BTreeSet<&String> = new.device_states.keys().collect();
    for id in ids {
        if !old.device_states.contains_key(id) {
            continue;
        }
        let old_status = old.device_status(id);
        let new_status = new.device_status(id);
        let changed = old_status ^ new_status;
        if !changed.is_empty() {
            events.push(BridgeEvent::DeviceStatusChanged {
                device_id: id.clone(),
                old: old_status,
                new: new_status,
                changed,
            });
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::status::DeviceStatusFlags;
    use crate::normalize::HubArmState;
    use mockito::{Matcher, Mock, Server, ServerGuard};
    use serde_json::{json, Value};

    const PATH: &str = "/functions/v1/ajax-api";

    fn config_for(server: &ServerGuard, hub_id: Option<&str>) -> GatewayConfig {
        GatewayConfig::builder()
            .gateway_url(format!("{}{PATH}", server.url()))
            .email("user@example.com")
            .password("pw")
            .hub_id(hub_id.map(str::to_string))
            .build()
    }

    async fn ok(server: &mut ServerGuard, action: &str, data: Value) -> Mock {
        server
            .mock("POST", PATH)
            .match_query(Matcher::UrlEncoded("action".into(), action.into()))
            .with_status(200)
            .with_body(json!({"success": true, "data": data}).to_string())
            .create_async()
            .await
    }

    fn action(name: &str) -> Matcher {
        Matcher::UrlEncoded("action".into(), name.into())
    }

    /// Mocks stay registered while the returned handles are alive.
    async fn mock_hub(server: &mut ServerGuard, arm_state: &str, reed_closed: bool) -> Vec<Mock> {
        let mut mocks = vec![
            ok(server, "login", json!({"sessionToken": "tok", "userId": "U1"})).await,
            ok(
                server,
                "get-user-hubs",
                json!([{"hubId": "H1", "name": "Home"}, {"hubId": "H2", "name": "Cottage"}]),
            )
            .await,
        ];
        mocks.extend(mock_fetch(server, arm_state, reed_closed).await);
        mocks
    }

    /// The three calls of one poll cycle.
    async fn mock_fetch(server: &mut ServerGuard, arm_state: &str, reed_closed: bool) -> Vec<Mock> {
        vec![
            ok(server, "get-hub", json!({"armState": arm_state, "name": "Home"})).await,
            ok(
                server,
                "get-hub-devices",
                json!({"devices": [{"id": "D1", "type": "DoorProtect", "deviceName": "Front door"}]}),
            )
            .await,
            ok(
                server,
                "get-all-device-states",
                json!([{"deviceId": "D1", "reedClosed": reed_closed}]),
            )
            .await,
        ]
    }

    async fn mock_login(server: &mut ServerGuard, token: &str, hits: usize) -> Mock {
        server
            .mock("POST", PATH)
            .match_query(action("login"))
            .with_status(200)
            .with_body(json!({"success": true, "data": {"sessionToken": token, "userId": "U1"}}).to_string())
            .expect(hits)
            .create_async()
            .await
    }

    async fn failures(coordinator: &Coordinator) -> u32 {
        coordinator.session.lock().await.backoff.failures()
    }

    #[tokio::test]
    async fn test_setup_selects_first_hub_and_refreshes() {
        let mut server = Server::new_async().await;
        let _hub = mock_hub(&mut server, "DISARM", true).await;

        let coordinator = Coordinator::setup(config_for(&server, None)).await.unwrap();
        assert_eq!(coordinator.hub_id(), "H1");
        assert!(coordinator.last_update_success());

        let snap = coordinator.snapshot().await;
        assert_eq!(snap.devices.len(), 1);
        assert_eq!(snap.state_of("D1")["reedClosed"], json!(true));
        assert_eq!(snap.hub_arm_state(), HubArmState::Disarmed);
    }

    #[tokio::test]
    async fn test_setup_with_configured_hub() {
        let mut server = Server::new_async().await;
        let _hub = mock_hub(&mut server, "DISARM", true).await;

        let coordinator = Coordinator::setup(config_for(&server, Some("H2"))).await.unwrap();
        assert_eq!(coordinator.hub().name, "Cottage");

        let err = Coordinator::setup(config_for(&server, Some("H9"))).await;
        assert!(matches!(err, Err(GatewayError::HubNotFound { .. })));
    }

    #[tokio::test]
    async fn test_setup_without_hubs() {
        let mut server = Server::new_async().await;
        let _login = ok(&mut server, "login", json!({"sessionToken": "tok", "userId": "U1"})).await;
        let _hubs = ok(&mut server, "get-user-hubs", json!({"hubs": []})).await;

        let err = Coordinator::setup(config_for(&server, None)).await;
        assert!(matches!(err, Err(GatewayError::NoHubs)));
    }

    #[tokio::test]
    async fn test_auth_failure_keeps_snapshot_and_backs_off() {
        let mut server = Server::new_async().await;
        let _hub = mock_hub(&mut server, "ARM", true).await;
        let coordinator = Coordinator::setup(config_for(&server, None)).await.unwrap();
        let mut events = coordinator.subscribe();

        server.reset();
        let rejected = server
            .mock("POST", PATH)
            .match_query(Matcher::UrlEncoded("action".into(), "get-hub".into()))
            .with_status(401)
            .with_body(r#"{"success":false,"error":"Session expired"}"#)
            .expect(1)
            .create_async()
            .await;

        let err = coordinator.refresh().await.unwrap_err();
        assert!(matches!(err, GatewayError::Auth { .. }));
        assert!(!coordinator.last_update_success());
        assert!(matches!(
            events.recv().await.unwrap(),
            BridgeEvent::RefreshFailed { .. }
        ));

        // The window is closed: no request reaches the gateway
        let err = coordinator.refresh().await.unwrap_err();
        assert!(matches!(err, GatewayError::BackingOff { .. }));
        rejected.assert_async().await;

        let snap = coordinator.snapshot().await;
        assert_eq!(snap.hub_arm_state(), HubArmState::ArmedAway);
    }

    #[tokio::test]
    async fn test_rate_limit_backs_off() {
        let mut server = Server::new_async().await;
        let _hub = mock_hub(&mut server, "DISARM", true).await;
        let coordinator = Coordinator::setup(config_for(&server, None)).await.unwrap();

        server.reset();
        let _limited = server
            .mock("POST", PATH)
            .match_query(Matcher::UrlEncoded("action".into(), "get-hub".into()))
            .with_status(429)
            .create_async()
            .await;

        assert!(matches!(
            coordinator.refresh().await.unwrap_err(),
            GatewayError::RateLimited { .. }
        ));
        assert!(matches!(
            coordinator.refresh().await.unwrap_err(),
            GatewayError::BackingOff { .. }
        ));
    }

    #[tokio::test]
    async fn test_arm_sends_command_and_refreshes() {
        let mut server = Server::new_async().await;
        let _hub = mock_hub(&mut server, "DISARM", true).await;
        let coordinator = Coordinator::setup(config_for(&server, None)).await.unwrap();
        let mut events = coordinator.subscribe();

        server.reset();
        let arm = server
            .mock("POST", PATH)
            .match_query(Matcher::UrlEncoded("action".into(), "arm-hub".into()))
            .match_body(Matcher::PartialJson(json!({"hubId": "H1", "armState": "PARTIAL_ARM"})))
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;
        let _armed = mock_hub(&mut server, "PARTIAL_ARM", false).await;

        coordinator.arm(ArmMode::Home).await.unwrap();
        arm.assert_async().await;

        let snap = coordinator.snapshot().await;
        assert_eq!(snap.hub_arm_state(), HubArmState::ArmedHome);

        let mut saw_arm_change = false;
        let mut saw_door_change = false;
        while let Ok(event) = events.try_recv() {
            match event {
                BridgeEvent::HubArmStateChanged { old, new } => {
                    assert_eq!(old, HubArmState::Disarmed);
                    assert_eq!(new, HubArmState::ArmedHome);
                    saw_arm_change = true;
                }
                BridgeEvent::DeviceStatusChanged { device_id, new, .. } => {
                    assert_eq!(device_id, "D1");
                    assert!(new.contains(DeviceStatusFlags::OPEN));
                    saw_door_change = true;
                }
                _ => {}
            }
        }
        assert!(saw_arm_change);
        assert!(saw_door_change);
    }

    #[tokio::test]
    async fn test_expired_token_logs_in_before_fetch() {
        let mut server = Server::new_async().await;
        let _hub = mock_hub(&mut server, "DISARM", true).await;
        let mut config = config_for(&server, None);
        config.token_lifetime = Duration::ZERO;
        let coordinator = Coordinator::setup(config).await.unwrap();
        let mut events = coordinator.subscribe();

        server.reset();
        let login = mock_login(&mut server, "tok-2", 1).await;
        let hub_with_new_token = server
            .mock("POST", PATH)
            .match_query(action("get-hub"))
            .match_body(Matcher::PartialJson(json!({"sessionToken": "tok-2"})))
            .with_status(200)
            .with_body(json!({"success": true, "data": {"armState": "DISARM"}}).to_string())
            .expect(1)
            .create_async()
            .await;
        let _devices = ok(&mut server, "get-hub-devices", json!([])).await;
        let _states = ok(&mut server, "get-all-device-states", json!([])).await;

        coordinator.refresh().await.unwrap();
        login.assert_async().await;
        hub_with_new_token.assert_async().await;
        assert!(matches!(events.try_recv(), Ok(BridgeEvent::LoggedIn)));
    }

    #[tokio::test]
    async fn test_rejected_login_opens_backoff_window() {
        let mut server = Server::new_async().await;
        let _hub = mock_hub(&mut server, "DISARM", true).await;
        let mut config = config_for(&server, None);
        config.token_lifetime = Duration::ZERO;
        let coordinator = Coordinator::setup(config).await.unwrap();

        server.reset();
        let rejected = server
            .mock("POST", PATH)
            .match_query(action("login"))
            .with_status(200)
            .with_body(r#"{"success":false,"error":"Invalid credentials"}"#)
            .expect(1)
            .create_async()
            .await;

        match coordinator.refresh().await.unwrap_err() {
            GatewayError::Auth { message } => assert_eq!(message, "Invalid credentials"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            coordinator.refresh().await.unwrap_err(),
            GatewayError::BackingOff { .. }
        ));
        rejected.assert_async().await;
        assert_eq!(failures(&coordinator).await, 1);
    }

    #[tokio::test]
    async fn test_auth_error_drops_session_until_next_login() {
        let mut server = Server::new_async().await;
        let _hub = mock_hub(&mut server, "DISARM", true).await;
        let mut config = config_for(&server, None);
        config.backoff_base = Duration::ZERO;
        let coordinator = Coordinator::setup(config).await.unwrap();

        server.reset();
        let _expired = server
            .mock("POST", PATH)
            .match_query(action("get-hub"))
            .with_status(401)
            .with_body(r#"{"success":false,"error":"Session expired"}"#)
            .create_async()
            .await;
        assert!(matches!(
            coordinator.refresh().await.unwrap_err(),
            GatewayError::Auth { .. }
        ));
        assert_eq!(failures(&coordinator).await, 1);
        assert!(!coordinator.session.lock().await.client.is_authenticated());

        // Zero-length window: the next cycle logs in again and succeeds
        server.reset();
        let login = mock_login(&mut server, "tok-2", 1).await;
        let _fetch = mock_fetch(&mut server, "ARM", true).await;
        coordinator.refresh().await.unwrap();
        login.assert_async().await;
        assert_eq!(failures(&coordinator).await, 0);
        assert!(coordinator.last_update_success());
        assert_eq!(coordinator.snapshot().await.hub_arm_state(), HubArmState::ArmedAway);
    }

    #[tokio::test]
    async fn test_arm_renews_expired_token() {
        let mut server = Server::new_async().await;
        let _hub = mock_hub(&mut server, "DISARM", true).await;
        let mut config = config_for(&server, None);
        config.token_lifetime = Duration::ZERO;
        let coordinator = Coordinator::setup(config).await.unwrap();

        server.reset();
        // Once before the command, once for the follow-up refresh
        let login = mock_login(&mut server, "tok-2", 2).await;
        let arm = server
            .mock("POST", PATH)
            .match_query(action("arm-hub"))
            .match_body(Matcher::PartialJson(json!({"sessionToken": "tok-2", "armState": "ARM"})))
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .expect(1)
            .create_async()
            .await;
        let _fetch = mock_fetch(&mut server, "ARM", true).await;

        coordinator.arm(ArmMode::Away).await.unwrap();
        arm.assert_async().await;
        login.assert_async().await;
    }

    #[tokio::test]
    async fn test_arm_auth_failure_backs_off() {
        let mut server = Server::new_async().await;
        let _hub = mock_hub(&mut server, "DISARM", true).await;
        let coordinator = Coordinator::setup(config_for(&server, None)).await.unwrap();

        server.reset();
        let refused = server
            .mock("POST", PATH)
            .match_query(action("arm-hub"))
            .with_status(403)
            .with_body(r#"{"success":false,"error":"Forbidden"}"#)
            .expect(1)
            .create_async()
            .await;

        assert!(matches!(
            coordinator.arm(ArmMode::Away).await.unwrap_err(),
            GatewayError::Auth { .. }
        ));
        assert_eq!(failures(&coordinator).await, 1);
        assert!(matches!(
            coordinator.arm(ArmMode::Away).await.unwrap_err(),
            GatewayError::BackingOff { .. }
        ));
        assert!(matches!(
            coordinator.refresh().await.unwrap_err(),
            GatewayError::BackingOff { .. }
        ));
        refused.assert_async().await;
    }

    #[test]
    fn test_diff_events_silent_on_first_poll() {
        let old = Snapshot::empty("H1");
        let new = Snapshot::new(
            "H1",
            json!({"armState": "ARM"}),
            vec![],
            vec![json!({"deviceId": "D1", "reedClosed": false})],
        );
        assert!(diff_events(&old, &new).is_empty());
    }

    #[test]
    fn test_diff_events_reports_changes() {
        let old = Snapshot::new(
            "H1",
            json!({"armState": "DISARM"}),
            vec![],
            vec![
                json!({"deviceId": "D1", "reedClosed": true}),
                json!({"deviceId": "D2", "batteryCharge": 90}),
            ],
        );
        let new = Snapshot::new(
            "H1",
            json!({"armState": "NIGHT_ARM"}),
            vec![],
            vec![
                json!({"deviceId": "D1", "reedClosed": true}),
                json!({"deviceId": "D2", "batteryCharge": 10}),
            ],
        );
        let events = diff_events(&old, &new);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            BridgeEvent::HubArmStateChanged { new: HubArmState::ArmedNight, .. }
        ));
        match &events[1] {
            BridgeEvent::DeviceStatusChanged { device_id, changed, .. } => {
                assert_eq!(device_id, "D2");
                assert_eq!(*changed, DeviceStatusFlags::LOW_BATTERY);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_select_hub() {
        let hub = |id: &str| Hub {
            id: id.to_string(),
            name: id.to_string(),
            raw: Value::Null,
        };
        assert_eq!(select_hub(vec![hub("A"), hub("B")], None).unwrap().id, "A");
        assert_eq!(select_hub(vec![hub("A"), hub("B")], Some("B")).unwrap().id, "B");
        assert!(matches!(select_hub(vec![], None), Err(GatewayError::NoHubs)));
    }
}
