// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration

use std::time::Duration;

use crate::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SCAN_INTERVAL_SECS, GATEWAY_URL, LICENSE_VALIDATION_URL, TOKEN_REFRESH_INTERVAL_SECS,
};

/// Arm mode requested from the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmMode {
    /// Full arm
    Away,
    /// Partial arm (perimeter only)
    Home,
    /// Night mode
    Night,
    /// Disarm
    Disarm,
}

impl ArmMode {
    /// The `armState` string sent to the gateway.
    pub fn as_gateway_str(&self) -> &'static str {
        match self {
            Self::Away => "ARM",
            Self::Home => "PARTIAL_ARM",
            Self::Night => "NIGHT_ARM",
            Self::Disarm => "DISARM",
        }
    }

    /// Parse a Home Assistant alarm command payload (e.g. "ARM_AWAY").
    pub fn from_ha_command(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ARM_AWAY" => Some(Self::Away),
            "ARM_HOME" => Some(Self::Home),
            "ARM_NIGHT" => Some(Self::Night),
            "DISARM" => Some(Self::Disarm),
            _ => None,
        }
    }
}

/// Configuration for the gateway client and polling coordinator.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway endpoint; the action is passed as a query parameter
    pub gateway_url: String,
    /// Account email
    pub email: String,
    /// Account password
    pub password: String,
    /// Hub to bridge. When unset, the first hub on the account is used.
    pub hub_id: Option<String>,
    /// Optional Connee license token, validated once before login
    pub license_token: Option<String>,
    /// License validation endpoint
    pub license_url: String,
    /// Session token lifetime before a proactive re-login
    pub token_lifetime: Duration,
    /// Total timeout for a single gateway request
    pub request_timeout: Duration,
    /// Interval between polls
    pub scan_interval: Duration,
    /// First backoff step after an auth/rate-limit failure
    pub backoff_base: Duration,
    /// Upper bound on the backoff step
    pub backoff_max: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gateway_url: GATEWAY_URL.to_string(),
            email: String::new(),
            password: String::new(),
            hub_id: None,
            license_token: None,
            license_url: LICENSE_VALIDATION_URL.to_string(),
            token_lifetime: Duration::from_secs(TOKEN_REFRESH_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            scan_interval: Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            backoff_max: Duration::from_millis(DEFAULT_BACKOFF_MAX_MS),
        }
    }
}

impl GatewayConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }
}

/// Builder for GatewayConfig.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    pub fn gateway_url(mut self, url: impl Into<String>) -> Self {
        self.config.gateway_url = url.into();
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.config.email = email.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = password.into();
        self
    }

    pub fn hub_id(mut self, hub_id: Option<String>) -> Self {
        self.config.hub_id = hub_id.filter(|h| !h.is_empty());
        self
    }

    pub fn license_token(mut self, token: Option<String>) -> Self {
        self.config.license_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn license_url(mut self, url: impl Into<String>) -> Self {
        self.config.license_url = url.into();
        self
    }

    pub fn token_lifetime(mut self, lifetime: Duration) -> Self {
        self.config.token_lifetime = lifetime;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn scan_interval(mut self, interval: Duration) -> Self {
        self.config.scan_interval = interval;
        self
    }

    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.config.backoff_base = base;
        self
    }

    pub fn backoff_max(mut self, max: Duration) -> Self {
        self.config.backoff_max = max;
        self
    }

    pub fn build(self) -> GatewayConfig {
        self.config
    }
}
