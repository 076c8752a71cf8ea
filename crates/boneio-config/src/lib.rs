//! Shared configuration for boneIO consoles.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), a
//! keyring-backed session token store, and translation to
//! `boneio_core::ConsoleConfig`. The CLI layers flag overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use boneio_core::{ConsoleConfig, TlsVerification, TokenStore};

/// Keyring service name for every secret this crate stores.
pub const KEYRING_SERVICE: &str = "boneio";

/// Prefix for environment overrides. Nested keys use `__`, e.g.
/// `BONEIO_DEFAULTS__OUTPUT=json`.
pub const ENV_PREFIX: &str = "BONEIO_";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use: `requested`, else the configured default.
    pub fn profile_name<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .or(self.default_profile.as_deref())
            .unwrap_or("default")
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// A named device profile.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Device base URL (e.g., "http://boneio.local:8090").
    pub url: String,

    /// Login name, when the device requires authentication.
    pub username: Option<String>,

    /// Password (plaintext -- prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Request timeout override, in seconds.
    pub timeout: Option<u64>,

    /// Skip TLS verification (self-signed reverse proxies).
    pub insecure: Option<bool>,

    /// Custom CA certificate for HTTPS.
    pub ca_cert: Option<PathBuf>,

    /// Realtime pacing overrides.
    #[serde(default, skip_serializing_if = "Tuning::is_empty")]
    pub tuning: Tuning,
}

/// Optional overrides for the realtime layer's timing constants.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Tuning {
    pub probe_interval_secs: Option<u64>,
    pub heartbeat_secs: Option<u64>,
    pub reconnect_delay_secs: Option<u64>,
    pub max_reconnect_attempts: Option<u32>,
}

impl Tuning {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("eu", "boneio", "boneio").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("boneio");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;
    Ok(config)
}

/// Load config, falling back to defaults on any error.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_else(|e| {
        warn!(error = %e, "ignoring unreadable config");
        Config::default()
    })
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to the canonical path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve `(username, password)` for `profile_name`.
///
/// Username: profile, then `BONEIO_USERNAME`. Password: the profile's
/// `password_env` variable, then `BONEIO_PASSWORD`, then the keyring, then
/// plaintext in the profile.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<(String, SecretString), ConfigError> {
    resolve_credentials_with(
        profile,
        profile_name,
        |name| std::env::var(name).ok(),
        |account| {
            keyring::Entry::new(KEYRING_SERVICE, account)
                .and_then(|entry| entry.get_password())
                .ok()
        },
    )
}

fn resolve_credentials_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<(String, SecretString), ConfigError> {
    let missing = || ConfigError::NoCredentials {
        profile: profile_name.into(),
    };

    let username = profile
        .username
        .clone()
        .or_else(|| env("BONEIO_USERNAME"))
        .ok_or_else(missing)?;

    let password = profile
        .password_env
        .as_deref()
        .and_then(&env)
        .or_else(|| env("BONEIO_PASSWORD"))
        .or_else(|| keyring(&password_account(profile_name)))
        .or_else(|| profile.password.clone())
        .ok_or_else(missing)?;

    Ok((username, SecretString::from(password)))
}

/// Store a password in the keyring for `profile_name`.
pub fn store_password(profile_name: &str, password: &SecretString) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &password_account(profile_name))?
        .set_password(password.expose_secret())?;
    Ok(())
}

fn password_account(profile_name: &str) -> String {
    format!("{profile_name}/password")
}

fn token_account(profile_name: &str) -> String {
    format!("{profile_name}/token")
}

// ── Session token persistence ───────────────────────────────────────

/// Keeps the session token of one profile in the system keyring.
///
/// Keyring failures never fail the caller: a token that cannot be stored
/// only means logging in again next run.
#[derive(Debug, Clone)]
pub struct KeyringTokenStore {
    account: String,
}

impl KeyringTokenStore {
    pub fn new(profile_name: &str) -> Self {
        Self {
            account: token_account(profile_name),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, keyring::Error> {
        keyring::Entry::new(KEYRING_SERVICE, &self.account)
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Option<SecretString> {
        match self.entry().and_then(|e| e.get_password()) {
            Ok(token) => Some(SecretString::from(token)),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                debug!(error = %e, "session token unavailable");
                None
            }
        }
    }

    fn save(&self, token: &SecretString) {
        if let Err(e) = self.entry().and_then(|e| e.set_password(token.expose_secret())) {
            warn!(error = %e, "could not persist session token");
        }
    }

    fn clear(&self) {
        match self.entry().and_then(|e| e.delete_credential()) {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(e) => warn!(error = %e, "could not remove session token"),
        }
    }
}

// ── Translation to core config ──────────────────────────────────────

/// Build a `ConsoleConfig` from a profile. No CLI flag overrides.
pub fn profile_to_console_config(profile: &Profile) -> Result<ConsoleConfig, ConfigError> {
    let url: url::Url = profile.url.parse().map_err(|e| ConfigError::Validation {
        field: "url".into(),
        reason: format!("{e}: {}", profile.url),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "url".into(),
            reason: format!("expected http or https, got '{}'", url.scheme()),
        });
    }

    let mut config = ConsoleConfig::new(url);
    config.tls = if profile.insecure.unwrap_or(false) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS));

    let tuning = &profile.tuning;
    if let Some(secs) = tuning.probe_interval_secs {
        config.probe.interval = Duration::from_secs(secs);
    }
    if let Some(secs) = tuning.heartbeat_secs {
        config.connection.heartbeat_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = tuning.reconnect_delay_secs {
        config.connection.reconnect_delay = Duration::from_secs(secs);
    }
    if let Some(max) = tuning.max_reconnect_attempts {
        config.connection.max_reconnect_attempts = max;
    }

    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    fn profile(url: &str) -> Profile {
        Profile {
            url: url.into(),
            ..Profile::default()
        }
    }

    #[test]
    fn file_and_env_merge() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                default_profile = "garage"

                [profiles.garage]
                url = "http://192.168.1.50:8090"
                username = "admin"

                [profiles.garage.tuning]
                reconnect_delay_secs = 2
                "#,
            )?;
            jail.set_env("BONEIO_DEFAULTS__OUTPUT", "json");

            let cfg = load_config_from(Path::new("config.toml")).unwrap();
            assert_eq!(cfg.defaults.output, "json");
            assert_eq!(cfg.defaults.color, "auto");
            assert_eq!(cfg.profile_name(None), "garage");
            assert_eq!(cfg.profile_name(Some("attic")), "attic");

            let garage = &cfg.profiles["garage"];
            assert_eq!(garage.username.as_deref(), Some("admin"));
            assert_eq!(garage.tuning.reconnect_delay_secs, Some(2));
            Ok(())
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_| {
            let cfg = load_config_from(Path::new("nope.toml")).unwrap();
            assert_eq!(cfg.default_profile.as_deref(), Some("default"));
            assert!(cfg.profiles.is_empty());
            assert_eq!(cfg.defaults.timeout, 10);
            Ok(())
        });
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles.insert("default".into(), profile("http://boneio.local:8090"));

        save_config_to(&cfg, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[profiles.default]"));
        assert!(!text.contains("tuning"));
    }

    #[test]
    fn password_resolution_order() {
        let mut p = profile("http://boneio.local");
        p.username = Some("admin".into());
        p.password = Some("plain".into());
        p.password_env = Some("GARAGE_PW".into());

        let env = |name: &str| (name == "GARAGE_PW").then(|| "from-env".to_owned());
        let keyring = |_: &str| Some("from-keyring".to_owned());
        let (user, pw) = resolve_credentials_with(&p, "garage", env, keyring).unwrap();
        assert_eq!(user, "admin");
        assert_eq!(pw.expose_secret(), "from-env");

        let (_, pw) = resolve_credentials_with(&p, "garage", |_| None, keyring).unwrap();
        assert_eq!(pw.expose_secret(), "from-keyring");

        let (_, pw) = resolve_credentials_with(&p, "garage", |_| None, |_| None).unwrap();
        assert_eq!(pw.expose_secret(), "plain");
    }

    #[test]
    fn keyring_lookup_uses_profile_account() {
        let mut p = profile("http://boneio.local");
        p.username = Some("admin".into());
        let keyring = |account: &str| (account == "garage/password").then(|| "k".to_owned());

        assert!(resolve_credentials_with(&p, "garage", |_| None, keyring).is_ok());
        let err = resolve_credentials_with(&p, "attic", |_| None, keyring).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { ref profile } if profile == "attic"));
    }

    #[test]
    fn username_falls_back_to_env() {
        let mut p = profile("http://boneio.local");
        p.password = Some("pw".into());
        let env = |name: &str| (name == "BONEIO_USERNAME").then(|| "operator".to_owned());

        let (user, _) = resolve_credentials_with(&p, "default", env, |_| None).unwrap();
        assert_eq!(user, "operator");
        assert!(resolve_credentials_with(&p, "default", |_| None, |_| None).is_err());
    }

    #[test]
    fn console_config_from_profile() {
        let mut p = profile("https://proxy.example/boneio/");
        p.ca_cert = Some(PathBuf::from("/etc/ca.pem"));
        p.timeout = Some(3);
        p.tuning.max_reconnect_attempts = Some(5);
        p.tuning.heartbeat_secs = Some(15);

        let cfg = profile_to_console_config(&p).unwrap();
        assert_eq!(cfg.tls, TlsVerification::CustomCa(PathBuf::from("/etc/ca.pem")));
        assert_eq!(cfg.timeout, Duration::from_secs(3));
        assert_eq!(cfg.connection.max_reconnect_attempts, 5);
        assert_eq!(cfg.connection.heartbeat_interval, Duration::from_secs(15));
        assert_eq!(cfg.connection.reconnect_delay, Duration::from_secs(5));

        p.insecure = Some(true);
        let cfg = profile_to_console_config(&p).unwrap();
        assert_eq!(cfg.tls, TlsVerification::DangerAcceptInvalid);
    }

    #[test]
    fn rejects_bad_urls() {
        assert!(matches!(
            profile_to_console_config(&profile("not a url")),
            Err(ConfigError::Validation { .. })
        ));
        assert!(matches!(
            profile_to_console_config(&profile("ftp://boneio.local")),
            Err(ConfigError::Validation { .. })
        ));
    }
}
