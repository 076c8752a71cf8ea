//! Device-level commands: configuration, logs, restart, updates.

use std::path::Path;

use serde_json::Value;
use tabled::Tabled;

use boneio_core::{Command, Console, LogEntry, UpdateInfo};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, LogsArgs, UpdateArgs, UpdateCommand};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

pub async fn config(console: &Console, args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Check => {
            let status = console.check_configuration().await?;
            if !status.is_success() {
                return Err(CliError::Rejected {
                    message: status.message.unwrap_or(status.status),
                });
            }
            let out = output::render_single(
                global.output,
                &status,
                |s| s.message.clone().unwrap_or_else(|| "Configuration is valid".into()),
                |s| s.status.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Show { section } => {
            let parsed = console.device_config().await?;
            let shown = match section {
                Some(name) => select_section(parsed, &name)?,
                None => parsed,
            };
            let out = output::render_single(
                global.output,
                &shown,
                |v| {
                    serde_yaml::to_string(v)
                        .map(|text| text.trim_end().to_owned())
                        .unwrap_or_else(|e| format!("<unprintable: {e}>"))
                },
                top_level_keys,
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Put { section, from } => {
            let data = read_section(&from)?;
            let result = console
                .execute(Command::PutConfigSection {
                    section: section.clone(),
                    data,
                })
                .await?;
            util::report(&result, &format!("Saved section '{section}'"), global);
            Ok(())
        }
    }
}

fn select_section(mut parsed: Value, name: &str) -> Result<Value, CliError> {
    parsed
        .get_mut(name)
        .map(Value::take)
        .ok_or_else(|| CliError::NotFound {
            resource_type: "Config section".into(),
            identifier: name.into(),
            list_command: "config show".into(),
        })
}

/// Plain output: one top-level key per line, or the scalar itself.
fn top_level_keys(value: &Value) -> String {
    match value {
        Value::Object(map) => map.keys().cloned().collect::<Vec<_>>().join("\n"),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// YAML is a superset of JSON, so one parser covers both.
fn read_section(path: &Path) -> Result<Value, CliError> {
    let text = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&text).map_err(|e| CliError::Validation {
        field: "from".into(),
        reason: format!("{} is not valid YAML or JSON: {e}", path.display()),
    })
}

#[derive(Tabled)]
struct LogRow {
    #[tabled(rename = "Time")]
    timestamp: String,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Message")]
    message: String,
}

/// Syslog priority digits to names; anything else passes through.
fn level_name(level: &str) -> &str {
    match level {
        "0" => "emerg",
        "1" => "alert",
        "2" => "crit",
        "3" => "error",
        "4" => "warning",
        "5" => "notice",
        "6" => "info",
        "7" => "debug",
        other => other,
    }
}

pub async fn logs(console: &Console, args: LogsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let entries = console.logs(args.since.as_deref(), args.limit).await?;
    let out = output::render_list(
        global.output,
        &entries,
        |e: &LogEntry| LogRow {
            timestamp: e.timestamp.clone(),
            level: level_name(&e.level).to_owned(),
            message: e.message.clone(),
        },
        |e| format!("{} {}", e.timestamp, e.message),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn restart(console: &Console, global: &GlobalOpts) -> Result<(), CliError> {
    if !util::confirm("restart", "Restart the boneIO service?", global.yes)? {
        return Ok(());
    }
    let result = console.execute(Command::Restart).await?;
    util::report(&result, "Restart requested", global);
    Ok(())
}

fn update_detail(u: &UpdateInfo) -> String {
    let flag = |v: Option<bool>| match v {
        Some(true) => "yes".to_owned(),
        Some(false) => "no".to_owned(),
        None => "-".to_owned(),
    };
    let text = |v: Option<&str>| v.unwrap_or("-").to_owned();

    let mut pairs = vec![
        ("Status", u.status.clone()),
        ("Current", text(u.current_version.as_deref())),
        ("Latest", text(u.latest_version.as_deref())),
        ("Update available", flag(u.update_available)),
        ("Pre-release", flag(u.is_prerelease)),
        ("Published", text(u.published_at.as_deref())),
        ("Release notes", text(u.release_url.as_deref())),
    ];
    if let Some(ref message) = u.message {
        pairs.push(("Message", message.clone()));
    }
    output::detail(&pairs)
}

pub async fn update(console: &Console, args: UpdateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        UpdateCommand::Check => {
            let info = console.check_update().await?;
            let out = output::render_single(global.output, &info, update_detail, |u| {
                u.latest_version.clone().unwrap_or_default()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        UpdateCommand::Apply => {
            if !util::confirm(
                "update",
                "Install the latest boneIO release and restart the service?",
                global.yes,
            )? {
                return Ok(());
            }
            let result = console.execute(Command::Update).await?;
            util::report(&result, "Update started", global);
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn sections_are_picked_by_name() {
        let parsed = json!({"boneio": {"name": "garage"}, "mqtt": {"host": "10.0.0.2"}});
        assert_eq!(
            select_section(parsed.clone(), "mqtt").unwrap(),
            json!({"host": "10.0.0.2"})
        );

        let err = select_section(parsed, "modbus").unwrap_err();
        assert_eq!(err.exit_code(), crate::error::exit_code::NOT_FOUND);
        assert_eq!(top_level_keys(&json!({"boneio": {}, "mqtt": {}})), "boneio\nmqtt");
    }

    #[test]
    fn section_files_accept_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("mqtt.yaml");
        std::fs::write(&yaml, "host: 10.0.0.2\nport: 1883\n").unwrap();
        assert_eq!(read_section(&yaml).unwrap(), json!({"host": "10.0.0.2", "port": 1883}));

        let list = dir.path().join("output.json");
        std::fs::write(&list, r#"[{"id": "relay1"}]"#).unwrap();
        assert_eq!(read_section(&list).unwrap(), json!([{"id": "relay1"}]));

        let broken = dir.path().join("broken.yaml");
        std::fs::write(&broken, "host: [unclosed").unwrap();
        assert!(matches!(read_section(&broken), Err(CliError::Validation { .. })));
    }

    #[test]
    fn syslog_levels_get_names() {
        assert_eq!(level_name("3"), "error");
        assert_eq!(level_name("6"), "info");
        assert_eq!(level_name("WARN"), "WARN");
    }

    #[test]
    fn update_detail_marks_missing_fields() {
        let info = UpdateInfo {
            status: "success".into(),
            current_version: Some("1.0.0".into()),
            latest_version: Some("1.1.0".into()),
            update_available: Some(true),
            release_url: None,
            published_at: None,
            is_prerelease: None,
            message: None,
        };
        let text = update_detail(&info);
        assert!(text.contains("Update available  yes"));
        assert!(text.contains("Pre-release       -"));
        assert!(!text.contains("Message"));
    }
}
