// ── Command API ──
//
// Every write against the device flows through the `Command` enum and is
// routed in one place, so error mapping and credential eviction are
// uniform.

use boneio_api::{BoneioClient, CoverAction, StatusResponse};
use tracing::debug;

use crate::auth::AuthSession;
use crate::error::CoreError;

/// Largest accepted cover position or tilt, in percent.
pub const MAX_PERCENT: u8 = 100;

/// All write operations against a boneIO device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // ── Outputs ──────────────────────────────────────────────────────
    ToggleOutput { id: String },

    // ── Covers ───────────────────────────────────────────────────────
    CoverAction { id: String, action: CoverAction },
    SetCoverPosition { id: String, position: u8 },
    SetCoverTilt { id: String, tilt: u8 },

    // ── Files and configuration ──────────────────────────────────────
    PutFile { path: String, content: String },
    /// Replace one top-level section of `config.yaml`.
    PutConfigSection {
        section: String,
        data: serde_json::Value,
    },

    // ── System ───────────────────────────────────────────────────────
    Restart,
    /// Upgrade the boneIO package, then restart.
    Update,
}

/// Outcome of a successful command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Ok,
    /// The device accepted the command and said something about it.
    Message(String),
}

impl Command {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ToggleOutput { .. } => "toggle_output",
            Self::CoverAction { .. } => "cover_action",
            Self::SetCoverPosition { .. } => "set_cover_position",
            Self::SetCoverTilt { .. } => "set_cover_tilt",
            Self::PutFile { .. } => "put_file",
            Self::PutConfigSection { .. } => "put_config_section",
            Self::Restart => "restart",
            Self::Update => "update",
        }
    }

    /// Client-side checks, run before any request is sent.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::ToggleOutput { id }
            | Self::CoverAction { id, .. }
            | Self::SetCoverPosition { id, .. }
            | Self::SetCoverTilt { id, .. }
                if id.trim().is_empty() =>
            {
                Err(invalid("entity id must not be empty"))
            }
            Self::SetCoverPosition { position, .. } if *position > MAX_PERCENT => Err(invalid(
                format!("cover position must be 0-{MAX_PERCENT}, got {position}"),
            )),
            Self::SetCoverTilt { tilt, .. } if *tilt > MAX_PERCENT => Err(invalid(format!(
                "cover tilt must be 0-{MAX_PERCENT}, got {tilt}"
            ))),
            Self::PutFile { path, .. } if path.trim_matches('/').is_empty() => {
                Err(invalid("file path must not be empty"))
            }
            Self::PutConfigSection { section, .. }
                if section.trim().is_empty() || section.contains('/') =>
            {
                Err(invalid(format!("'{section}' is not a configuration section name")))
            }
            _ => Ok(()),
        }
    }

    /// Entity kind and id this command targets, for not-found errors.
    fn target(&self) -> Option<(&'static str, &str)> {
        match self {
            Self::ToggleOutput { id } => Some(("Output", id)),
            Self::CoverAction { id, .. }
            | Self::SetCoverPosition { id, .. }
            | Self::SetCoverTilt { id, .. } => Some(("Cover", id)),
            Self::PutFile { path, .. } => Some(("File", path)),
            Self::PutConfigSection { section, .. } => Some(("Config section", section)),
            Self::Restart | Self::Update => None,
        }
    }
}

/// Validate, send, and map the outcome of one command.
pub(crate) async fn route(
    client: &BoneioClient,
    auth: &AuthSession,
    cmd: Command,
) -> Result<CommandResult, CoreError> {
    cmd.validate()?;
    debug!(command = cmd.name(), "executing command");

    let result = match &cmd {
        Command::ToggleOutput { id } => client.toggle_output(id).await,
        Command::CoverAction { id, action } => client.cover_action(id, *action).await,
        Command::SetCoverPosition { id, position } => {
            client.set_cover_position(id, *position).await
        }
        Command::SetCoverTilt { id, tilt } => client.set_cover_tilt(id, *tilt).await,
        Command::PutFile { path, content } => client.put_file(path, content).await,
        Command::PutConfigSection { section, data } => {
            client.put_config_section(section, data).await
        }
        Command::Restart => client.restart().await,
        Command::Update => client.update().await,
    };

    match auth.observe(result) {
        Ok(status) => into_result(status),
        Err(CoreError::NotFound {
            entity_type,
            identifier,
        }) => {
            let (entity_type, identifier) = cmd
                .target()
                .map_or((entity_type, identifier), |(kind, id)| (kind.to_owned(), id.to_owned()));
            Err(CoreError::NotFound {
                entity_type,
                identifier,
            })
        }
        Err(e) => Err(e),
    }
}

fn into_result(status: StatusResponse) -> Result<CommandResult, CoreError> {
    if !status.is_success() {
        return Err(CoreError::Rejected {
            message: status.message.unwrap_or(status.status),
        });
    }
    Ok(status.message.map_or(CommandResult::Ok, CommandResult::Message))
}

fn invalid(message: impl Into<String>) -> CoreError {
    CoreError::ValidationFailed {
        message: message.into(),
    }
}
