// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration

use std::time::Instant;

use reqwest::header::ACCEPT;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::config::{ArmMode, GatewayConfig};
use crate::error::{GatewayError, Result};
use crate::normalize::{first_id, first_str};

/// A hub visible to the logged-in account.
#[derive(Debug, Clone, PartialEq)]
pub struct Hub {
    pub id: String,
    pub name: String,
    pub raw: Value,
}

/// Client for the Ajax cloud API via the Connee gateway.
///
/// Every call is a `POST {gateway_url}?action=<action>` with a JSON body.
/// The session token obtained at login is injected into each body as
/// `sessionToken`.
pub struct GatewayClient {
    http: reqwest::Client,
    config: GatewayConfig,
    session_token: Option<String>,
    user_id: Option<String>,
    token_expires: Option<Instant>,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            config,
            session_token: None,
            user_id: None,
            token_expires: None,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session_token.is_some() && self.user_id.is_some()
    }

    /// True when no token is held or the held one has reached its lifetime.
    pub fn token_expired(&self, now: Instant) -> bool {
        match (&self.session_token, self.token_expires) {
            (Some(_), Some(expires)) => now >= expires,
            _ => true,
        }
    }

    /// Forget the session so the next cycle logs in again.
    pub fn invalidate_session(&mut self) {
        self.session_token = None;
        self.token_expires = None;
    }

    async fn call_gateway(&self, action: &str, mut body: Value) -> Result<Value> {
        if let (Some(token), Value::Object(map)) = (&self.session_token, &mut body) {
            map.insert("sessionToken".to_string(), Value::String(token.clone()));
        }

        debug!(action, "Gateway request");
        let resp = self
            .http
            .post(&self.config.gateway_url)
            .query(&[("action", action)])
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let parsed = serde_json::from_str::<Value>(&text).ok();

        if status == 200
            && let Some(Value::Object(map)) = &parsed
            && map.get("success").and_then(Value::as_bool) == Some(true)
        {
            return Ok(match map.get("data") {
                Some(data) if !data.is_null() => data.clone(),
                _ => Value::Object(map.clone()),
            });
        }

        let message = parsed
            .as_ref()
            .and_then(|p| first_str(p, &["error", "message"]))
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {status}"));
        error!(action, status, "Gateway error: {message}");
        Err(GatewayError::from_status(status, message))
    }

    fn require_user(&self) -> Result<&str> {
        self.user_id.as_deref().ok_or(GatewayError::NotAuthenticated)
    }

    /// Log in and store the session token and user id.
    pub async fn login(&mut self) -> Result<()> {
        self.invalidate_session();
        let data = self
            .call_gateway(
                "login",
                json!({ "email": self.config.email, "password": self.config.password }),
            )
            .await
            .map_err(|e| match e {
                // A refused login is an auth failure whatever the envelope status
                GatewayError::Gateway { message, .. } => GatewayError::Auth { message },
                other => other,
            })?;

        let token = first_id(&data, &["sessionToken", "token"])
            .or_else(|| data.get("session").and_then(|s| first_id(s, &["token"])));
        let user_id = first_id(&data, &["userId", "user_id", "id"])
            .or_else(|| data.get("user").and_then(|u| first_id(u, &["id"])));

        let Some(token) = token else {
            error!("Login failed: response carried no session token");
            return Err(GatewayError::Auth {
                message: "login response carried no session token".to_string(),
            });
        };

        self.session_token = Some(token);
        if user_id.is_some() {
            self.user_id = user_id;
        }
        self.token_expires = Some(Instant::now() + self.config.token_lifetime);
        info!("Login successful via Connee gateway");
        Ok(())
    }

    /// Renew the session token.
    pub async fn refresh_token(&mut self) -> Result<()> {
        debug!("Refreshing session token");
        self.login().await
    }

    /// Hubs attached to the account. Entries without an id are dropped.
    pub async fn get_hubs(&self) -> Result<Vec<Hub>> {
        let user_id = self.require_user()?;
        let result = self
            .call_gateway("get-user-hubs", json!({ "userId": user_id }))
            .await?;

        let hubs = extract_list(&result, &["hubs", "data"])
            .into_iter()
            .filter_map(|raw| {
                let id = first_id(&raw, &["hubId", "id", "deviceId"])?;
                let name = first_str(&raw, &["name", "hubName"])
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Hub {id}"));
                Some(Hub { id, name, raw })
            })
            .collect();
        Ok(hubs)
    }

    /// Device records for a hub.
    pub async fn get_hub_devices(&self, hub_id: &str) -> Result<Vec<Value>> {
        let user_id = self.require_user()?;
        let result = self
            .call_gateway("get-hub-devices", json!({ "userId": user_id, "hubId": hub_id }))
            .await?;
        Ok(extract_list(&result, &["devices", "data"]))
    }

    /// Hub state object (arm state, firmware, ...).
    pub async fn get_hub_state(&self, hub_id: &str) -> Result<Value> {
        let user_id = self.require_user()?;
        let result = self
            .call_gateway("get-hub", json!({ "userId": user_id, "hubId": hub_id }))
            .await?;
        Ok(if result.is_object() { result } else { json!({}) })
    }

    /// Live state records for every device on a hub.
    pub async fn get_device_states(&self, hub_id: &str) -> Result<Vec<Value>> {
        let user_id = self.require_user()?;
        let result = self
            .call_gateway(
                "get-all-device-states",
                json!({ "userId": user_id, "hubId": hub_id }),
            )
            .await?;
        Ok(extract_list(&result, &["data"]))
    }

    /// Arm, partially arm, night-arm or disarm a hub.
    pub async fn arm_hub(&self, hub_id: &str, mode: ArmMode) -> Result<()> {
        let user_id = self.require_user()?;
        self.call_gateway(
            "arm-hub",
            json!({
                "userId": user_id,
                "hubId": hub_id,
                "armState": mode.as_gateway_str(),
            }),
        )
        .await?;
        info!(hub_id, arm_state = mode.as_gateway_str(), "Arm command accepted");
        Ok(())
    }

    /// Check a Connee license token against the validation endpoint.
    pub async fn validate_license(&self, token: &str, email: &str) -> Result<bool> {
        let resp = self
            .http
            .post(&self.config.license_url)
            .json(&json!({ "token": token, "email": email }))
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            error!("License validation endpoint returned HTTP {status}");
            return Ok(false);
        }
        let body: Value = resp.json().await?;
        if body.get("valid").and_then(Value::as_bool) == Some(true) {
            info!("Connee license validated");
            Ok(true)
        } else {
            let reason = first_str(&body, &["error"]).unwrap_or("unknown");
            warn!("Connee license invalid: {reason}");
            Ok(false)
        }
    }
}

/// A payload that is either a bare list or an object wrapping one.
fn extract_list(value: &Value, keys: &[&str]) -> Vec<Value> {
    if let Value::Array(items) = value {
        return items.clone();
    }
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_array))
        .cloned()
        .unwrap_or_default()
}
