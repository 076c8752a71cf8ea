// ── Core error types ──
//
// User-facing errors from boneio-core. Consumers never see raw HTTP bodies
// or JSON parse failures. The `From<boneio_api::Error>` impl translates
// transport-layer errors into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to device at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Device is unavailable")]
    Unavailable,

    #[error("Device request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Authentication errors ────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Not logged in, or the session has expired")]
    Unauthorized,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Operation rejected by device: {message}")]
    Rejected { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` if logging in again might resolve this error.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::AuthenticationFailed { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<boneio_api::Error> for CoreError {
    fn from(err: boneio_api::Error) -> Self {
        match err {
            boneio_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            boneio_api::Error::Unauthorized => CoreError::Unauthorized,
            boneio_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(|u| u.to_string())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            boneio_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            boneio_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            boneio_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            boneio_api::Error::Api { status: 401, .. } => CoreError::Unauthorized,
            boneio_api::Error::Api { status: 404, message } => CoreError::NotFound {
                entity_type: "Resource".into(),
                identifier: message,
            },
            boneio_api::Error::Api { status: 400, message } => CoreError::Rejected { message },
            boneio_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            boneio_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            boneio_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            boneio_api::Error::Protocol(message) => {
                CoreError::Internal(format!("Malformed state frame: {message}"))
            }
            boneio_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
