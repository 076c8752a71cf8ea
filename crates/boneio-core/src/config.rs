// ── Runtime console configuration ──
//
// These types describe *how* to reach a boneIO device and how the realtime
// layer paces itself. They never touch disk: the CLI builds a
// `ConsoleConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed reverse proxies).
    DangerAcceptInvalid,
}

/// Liveness probe pacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Period between scheduled checks.
    pub interval: Duration,
    /// Every check is held open at least this long, so UI indicators
    /// never flicker.
    pub min_check_duration: Duration,
    /// Upper bound for a single probe request.
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            min_check_duration: Duration::from_secs(5),
            timeout: Duration::from_secs(5),
        }
    }
}

/// State socket pacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Delay between the first subscriber arriving and the connect attempt.
    pub connect_debounce: Duration,
    /// Period of the `ping` heartbeat while the socket is open.
    pub heartbeat_interval: Duration,
    /// Constant delay before each reconnect.
    pub reconnect_delay: Duration,
    /// Reconnects allowed before the terminal error is published.
    pub max_reconnect_attempts: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_debounce: Duration::from_millis(500),
            heartbeat_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 30,
        }
    }
}

/// Configuration for talking to a single device.
///
/// Built by the CLI, passed to [`Console`](crate::Console) -- core never
/// reads config files.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Device URL (e.g., `http://boneio.local:8090`).
    pub url: Url,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// HTTP request timeout.
    pub timeout: Duration,
    pub probe: ProbeConfig,
    pub connection: ConnectionConfig,
}

impl ConsoleConfig {
    /// Defaults for everything but the URL.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(10),
            probe: ProbeConfig::default(),
            connection: ConnectionConfig::default(),
        }
    }
}
