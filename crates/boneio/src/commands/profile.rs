//! Profile subcommand handlers. Local configuration only; nothing here
//! talks to a device.

use std::path::PathBuf;
use std::str::FromStr;

use dialoguer::{Input, Select};
use secrecy::SecretString;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{GlobalOpts, ProfileArgs, ProfileCommand};
use crate::commands::util::prompt_err;
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

pub fn handle(args: ProfileArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ProfileCommand::Init => init(),

        ProfileCommand::Show => {
            let mut cfg = config::load_config_or_default();
            for profile in cfg.profiles.values_mut() {
                if profile.password.is_some() {
                    profile.password = Some(REDACTED.into());
                }
            }
            let out = output::render_single(
                global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("<unprintable: {e}>")),
                |c| c.profile_name(None).to_owned(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ProfileCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(name.clone()).or_default();
            apply_setting(profile, &key, &value)?;
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Set {key} on profile '{name}'");
            }
            Ok(())
        }

        ProfileCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Default profile is now '{name}'");
            }
            Ok(())
        }

        ProfileCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let rows = profile_rows(&cfg);
            let out = output::render_list(global.output, &rows, ProfileRow::clone, |r| {
                r.name.clone()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ProfileCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ProfileCommand::SetPassword => {
            let cfg = config::load_config_or_default();
            let name = config::active_profile_name(global, &cfg);
            let password = rpassword::prompt_password(format!("Password for '{name}': "))
                .map_err(prompt_err)?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "password cannot be empty".into(),
                });
            }
            config::store_password(&name, &SecretString::from(password))?;
            if !global.quiet {
                eprintln!("Password for '{name}' stored in the system keyring");
            }
            Ok(())
        }
    }
}

// ── Init wizard ─────────────────────────────────────────────────────

fn init() -> Result<(), CliError> {
    let path = config::config_path();
    eprintln!("boneIO console setup");
    eprintln!("  Config path: {}\n", path.display());

    let name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let url: String = Input::new()
        .with_prompt("Device URL")
        .default("http://boneio.local:8090".into())
        .interact_text()
        .map_err(prompt_err)?;

    let mut profile = Profile::default();
    apply_setting(&mut profile, "url", &url)?;

    let login = Select::new()
        .with_prompt("Does the device require a login?")
        .items(&["No", "Yes"])
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if login == 1 {
        let username: String = Input::new()
            .with_prompt("Username")
            .interact_text()
            .map_err(prompt_err)?;
        profile.username = Some(username);

        let storage = Select::new()
            .with_prompt("Where should the password live?")
            .items(&[
                "System keyring (recommended)",
                "Config file (plaintext)",
                "Nowhere, ask on login",
            ])
            .default(0)
            .interact()
            .map_err(prompt_err)?;

        if storage < 2 {
            let password = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
            if storage == 0 {
                config::store_password(&name, &SecretString::from(password))?;
                eprintln!("  Password stored in the system keyring");
            } else {
                profile.password = Some(password);
            }
        }
    }

    let mut cfg = config::load_config_or_default();
    if cfg.profiles.is_empty() || cfg.default_profile.is_none() {
        cfg.default_profile = Some(name.clone());
    }
    cfg.profiles.insert(name.clone(), profile);
    config::save_config(&cfg)?;

    eprintln!("\nConfiguration written to {}", path.display());
    eprintln!("  Profile: {name}");
    eprintln!("  Try it: boneio status --profile {name}");
    Ok(())
}

// ── Settings ────────────────────────────────────────────────────────

fn parse<T: FromStr>(field: &str, value: &str, expected: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("expected {expected}, got '{value}'"),
    })
}

/// Apply one `profile set <key> <value>`.
fn apply_setting(profile: &mut Profile, key: &str, value: &str) -> Result<(), CliError> {
    match key {
        "url" => {
            let mut candidate = profile.clone();
            candidate.url = value.into();
            boneio_config::profile_to_console_config(&candidate)?;
            profile.url = value.into();
        }
        "username" => profile.username = Some(value.into()),
        "password" => profile.password = Some(value.into()),
        "password_env" | "password-env" => profile.password_env = Some(value.into()),
        "timeout" => profile.timeout = Some(parse(key, value, "seconds")?),
        "insecure" => profile.insecure = Some(parse(key, value, "true or false")?),
        "ca_cert" | "ca-cert" => profile.ca_cert = Some(PathBuf::from(value)),
        "probe_interval_secs" => {
            profile.tuning.probe_interval_secs = Some(parse(key, value, "seconds")?);
        }
        "heartbeat_secs" => profile.tuning.heartbeat_secs = Some(parse(key, value, "seconds")?),
        "reconnect_delay_secs" => {
            profile.tuning.reconnect_delay_secs = Some(parse(key, value, "seconds")?);
        }
        "max_reconnect_attempts" => {
            profile.tuning.max_reconnect_attempts = Some(parse(key, value, "a count")?);
        }
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: "unknown key; see `boneio profile show` for the available keys".into(),
            });
        }
    }
    Ok(())
}

// ── Listing ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    #[serde(rename = "default")]
    marker: String,
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "URL")]
    url: String,
}

fn profile_rows(cfg: &Config) -> Vec<ProfileRow> {
    let default = cfg.profile_name(None);
    cfg.profiles
        .iter()
        .map(|(name, profile)| ProfileRow {
            marker: if name == default { "*" } else { "" }.into(),
            name: name.clone(),
            url: profile.url.clone(),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn settings_parse_and_validate() {
        let mut profile = Profile::default();
        apply_setting(&mut profile, "url", "http://boneio.local:8090").unwrap();
        apply_setting(&mut profile, "timeout", "30").unwrap();
        apply_setting(&mut profile, "insecure", "true").unwrap();
        apply_setting(&mut profile, "max_reconnect_attempts", "5").unwrap();

        assert_eq!(profile.url, "http://boneio.local:8090");
        assert_eq!(profile.timeout, Some(30));
        assert_eq!(profile.insecure, Some(true));
        assert_eq!(profile.tuning.max_reconnect_attempts, Some(5));
    }

    #[test]
    fn bad_values_leave_profile_untouched() {
        let mut profile = Profile {
            url: "http://old:8090".into(),
            ..Profile::default()
        };
        assert!(apply_setting(&mut profile, "url", "ftp://nope").is_err());
        assert_eq!(profile.url, "http://old:8090");

        let err = apply_setting(&mut profile, "timeout", "soon").unwrap_err();
        assert!(err.to_string().contains("timeout"));
        assert!(apply_setting(&mut profile, "colour", "red").is_err());
    }

    #[test]
    fn default_profile_is_marked() {
        let mut cfg = Config {
            default_profile: Some("garage".into()),
            ..Config::default()
        };
        for name in ["attic", "garage"] {
            cfg.profiles.insert(
                name.into(),
                Profile {
                    url: format!("http://{name}:8090"),
                    ..Profile::default()
                },
            );
        }
        let rows = profile_rows(&cfg);
        let marked: Vec<_> = rows
            .iter()
            .filter(|r| r.marker == "*")
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(marked, ["garage"]);
    }
}
