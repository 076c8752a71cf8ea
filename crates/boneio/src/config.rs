//! Profile resolution with CLI flag overrides.
//!
//! File format, env merging and keyring access live in `boneio-config`;
//! this module only layers `--url`, `--insecure`, `--timeout` and
//! `--token` on top.

use std::sync::Arc;

use secrecy::SecretString;

pub use boneio_config::{
    Config, Profile, config_path, load_config_or_default, resolve_credentials, save_config,
    store_password,
};
use boneio_core::{ConsoleConfig, MemoryTokenStore, TlsVerification, TokenStore};
use boneio_config::KeyringTokenStore;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Profile selected by `--profile`, then `default_profile`, then "default".
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    cfg.profile_name(global.profile.as_deref()).to_owned()
}

/// The effective profile: the configured one with flag overrides applied,
/// or an ad-hoc profile when only `--url` is given.
pub fn effective_profile(global: &GlobalOpts, cfg: &Config) -> Result<(String, Profile), CliError> {
    let name = active_profile_name(global, cfg);

    let mut profile = match (cfg.profiles.get(&name), &global.url) {
        (Some(profile), _) => profile.clone(),
        (None, Some(_)) => Profile::default(),
        (None, None) if global.profile.is_some() || !cfg.profiles.is_empty() => {
            return Err(CliError::ProfileNotFound {
                name,
                available: available_profiles(cfg),
            });
        }
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    if let Some(ref url) = global.url {
        profile.url.clone_from(url);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    profile.timeout = global
        .timeout
        .or(profile.timeout)
        .or(Some(cfg.defaults.timeout));

    Ok((name, profile))
}

/// Build the runtime config for the active profile.
pub fn resolve_console_config(global: &GlobalOpts) -> Result<(String, ConsoleConfig), CliError> {
    let cfg = load_config_or_default();
    let (name, profile) = effective_profile(global, &cfg)?;
    let config = boneio_config::profile_to_console_config(&profile)?;

    if config.tls == TlsVerification::DangerAcceptInvalid {
        tracing::debug!(profile = %name, "TLS verification disabled");
    }
    Ok((name, config))
}

/// Where this run keeps its session token: `--token` pins one for the
/// process, otherwise the profile's keyring entry.
pub fn token_store(global: &GlobalOpts, profile_name: &str) -> Arc<dyn TokenStore> {
    match global.token {
        Some(ref token) => Arc::new(MemoryTokenStore::with_token(SecretString::from(
            token.clone(),
        ))),
        None => Arc::new(KeyringTokenStore::new(profile_name)),
    }
}

pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
