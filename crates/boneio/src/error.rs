//! CLI error types with miette diagnostics.
//!
//! Every `CoreError` and `ConfigError` ends up here with help text that
//! names the command to run next.

use miette::Diagnostic;
use thiserror::Error;

use boneio_config::ConfigError;
use boneio_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to the device at {url}")]
    #[diagnostic(
        code(boneio::connection_failed),
        help(
            "Check that the device is powered and reachable.\n\
             Try: boneio status --url {url}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Lost the live connection: {message}")]
    #[diagnostic(
        code(boneio::stream_lost),
        help("The device stopped answering. Run `boneio status` once it is back.")
    )]
    StreamLost { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Login rejected: {message}")]
    #[diagnostic(
        code(boneio::auth_failed),
        help("Check the username and password, then run: boneio login")
    )]
    AuthFailed { message: String },

    #[error("Not logged in, or the session has expired")]
    #[diagnostic(code(boneio::unauthorized), help("Run: boneio login"))]
    Unauthorized,

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(boneio::no_credentials),
        help(
            "Run `boneio login` to be prompted, or set BONEIO_USERNAME and BONEIO_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(boneio::not_found),
        help("Run: boneio {list_command} to see what the device has")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Device rejected the operation: {message}")]
    #[diagnostic(code(boneio::rejected))]
    Rejected { message: String },

    #[error("API error: {message}")]
    #[diagnostic(code(boneio::api_error))]
    ApiError { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(boneio::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(boneio::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: boneio profile init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No device configured")]
    #[diagnostic(
        code(boneio::no_config),
        help(
            "Create a profile with: boneio profile init\n\
             or pass --url. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(boneio::config))]
    Config(ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("'{action}' requires confirmation")]
    #[diagnostic(
        code(boneio::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(boneio::timeout),
        help("Increase the timeout with --timeout or check the device's network.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::StreamLost { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::Unauthorized | Self::NoCredentials { .. } => {
                exit_code::AUTH
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError ─────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::Unavailable => Self::ConnectionFailed {
                url: "(device)".into(),
                reason: "device is unavailable".into(),
            },
            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::Unauthorized => Self::Unauthorized,
            CoreError::NotFound {
                entity_type,
                identifier,
            } => Self::NotFound {
                list_command: list_command(&entity_type).into(),
                resource_type: entity_type,
                identifier,
            },
            CoreError::Rejected { message } => Self::Rejected { message },
            CoreError::ValidationFailed { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::Api { message, .. } => Self::ApiError { message },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}

fn list_command(entity_type: &str) -> &'static str {
    match entity_type {
        "Output" => "outputs list",
        "Cover" => "covers list",
        "File" => "files list",
        "Config section" => "config show",
        _ => "watch --snapshot",
    }
}

// ── ConfigError → CliError ───────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_keep_their_exit_class() {
        let not_found: CliError = CoreError::NotFound {
            entity_type: "Output".into(),
            identifier: "relay9".into(),
        }
        .into();
        assert_eq!(not_found.exit_code(), exit_code::NOT_FOUND);
        assert!(matches!(
            not_found,
            CliError::NotFound { ref list_command, .. } if list_command == "outputs list"
        ));

        let unauthorized: CliError = CoreError::Unauthorized.into();
        assert_eq!(unauthorized.exit_code(), exit_code::AUTH);

        let rejected: CliError = CoreError::Rejected {
            message: "Invalid YAML".into(),
        }
        .into();
        assert_eq!(rejected.exit_code(), exit_code::REJECTED);
        assert_eq!(
            rejected.to_string(),
            "Device rejected the operation: Invalid YAML"
        );

        let invalid: CliError = CoreError::ValidationFailed {
            message: "cover position must be 0-100, got 101".into(),
        }
        .into();
        assert_eq!(invalid.exit_code(), exit_code::USAGE);
    }

    #[test]
    fn missing_credentials_are_an_auth_problem() {
        let err: CliError = ConfigError::NoCredentials {
            profile: "garage".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
