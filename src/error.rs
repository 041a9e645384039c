// MIT License - Copyright (c) 2026 ajax2mqtt contributors
// Rust translation of the Connee Ajax integration

use std::time::Duration;

/// All errors that can occur talking to the Connee gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Rate limited by gateway: {message}")]
    RateLimited { message: String },

    #[error("Gateway error (status {status}): {message}")]
    Gateway { status: u16, message: String },

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("No hubs found for this account")]
    NoHubs,

    #[error("Hub not found: {hub_id}")]
    HubNotFound { hub_id: String },

    #[error("Backing off for another {:.1}s", remaining.as_secs_f64())]
    BackingOff { remaining: Duration },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl GatewayError {
    /// Whether the next poll cycle may succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Http(_)
                | GatewayError::RateLimited { .. }
                | GatewayError::Gateway { .. }
                | GatewayError::BackingOff { .. }
                | GatewayError::Auth { .. }
                | GatewayError::NotAuthenticated
        )
    }

    /// Whether this error should extend the login/fetch backoff window.
    pub fn is_backoff_trigger(&self) -> bool {
        matches!(
            self,
            GatewayError::Auth { .. } | GatewayError::RateLimited { .. }
        )
    }

    /// Whether the held session token should be thrown away.
    pub fn invalidates_session(&self) -> bool {
        matches!(
            self,
            GatewayError::Auth { .. } | GatewayError::NotAuthenticated
        )
    }

    /// Classify a non-success gateway response by HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => GatewayError::Auth { message },
            429 => GatewayError::RateLimited { message },
            _ => GatewayError::Gateway { status, message },
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
