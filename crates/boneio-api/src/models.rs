// Wire types for the boneIO device API.
//
// Entity payloads keep every field the device sends: known fields are typed,
// the rest land in `extra` so newer firmware never loses data on the way
// through. Request bodies are small private structs next to their endpoint.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::Error;

// ── Entity payloads ─────────────────────────────────────────────────

/// A relay or other switchable output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputState {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub state: String,
    #[serde(default, rename = "type")]
    pub output_type: Option<String>,
    #[serde(default)]
    pub expander_id: Option<String>,
    #[serde(default)]
    pub pin: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A binary input or event button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputState {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub state: String,
    #[serde(default, rename = "type")]
    pub input_type: Option<String>,
    #[serde(default)]
    pub pin: Option<String>,
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub boneio_input: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A measured value: numeric, textual, or absent before the first reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: Value,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A roller shutter or venetian blind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverState {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub state: String,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub tilt: i64,
    #[serde(default)]
    pub current_operation: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

macro_rules! entity_key {
    ($($ty:ty),+) => {$(
        impl $ty {
            /// Stable identifier: `id` when present, otherwise `name`.
            pub fn key(&self) -> &str {
                self.id
                    .as_deref()
                    .filter(|id| !id.is_empty())
                    .unwrap_or(&self.name)
            }
        }
    )+};
}

entity_key!(OutputState, InputState, SensorState, CoverState);

impl SensorState {
    /// Render the reading with its unit, `-` when absent.
    pub fn display_value(&self) -> String {
        let value = match &self.state {
            Value::Null => return "-".into(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match &self.unit {
            Some(unit) if !unit.is_empty() => format!("{value} {unit}"),
            _ => value,
        }
    }
}

impl CoverState {
    /// Venetian covers accept tilt commands.
    pub fn supports_tilt(&self) -> bool {
        self.kind.as_deref() == Some("venetian")
    }
}

// ── State updates ───────────────────────────────────────────────────

/// One realtime state frame, tagged by entity kind.
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    Input(InputState),
    Output(OutputState),
    Sensor(SensorState),
    ModbusSensor(SensorState),
    Cover(CoverState),
    /// A kind this client does not know yet. Carried through so callers can
    /// observe it; the reducer ignores it.
    Unknown { kind: String, data: Value },
}

/// `{type, data}` envelope before the payload is resolved.
#[derive(Deserialize)]
struct RawUpdate {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl StateUpdate {
    /// Decode a `{type, data}` frame.
    ///
    /// Known kinds must carry a payload with a usable identifier; unknown
    /// kinds are accepted as-is.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let raw: RawUpdate =
            serde_json::from_str(text).map_err(|e| Error::Protocol(format!("{e}")))?;

        let update = match raw.kind.as_str() {
            "input" => Self::Input(payload(&raw.kind, raw.data)?),
            "output" => Self::Output(payload(&raw.kind, raw.data)?),
            "sensor" => Self::Sensor(payload(&raw.kind, raw.data)?),
            // Initial bursts from older firmware label modbus readings `modbus_device`.
            "modbus_sensor" | "modbus_device" => Self::ModbusSensor(payload(&raw.kind, raw.data)?),
            "cover" => Self::Cover(payload(&raw.kind, raw.data)?),
            _ => Self::Unknown {
                kind: raw.kind,
                data: raw.data,
            },
        };

        match update.entity_key() {
            Some("") => Err(Error::Protocol(format!(
                "{} payload has neither id nor name",
                update.kind()
            ))),
            _ => Ok(update),
        }
    }

    /// Wire tag of this update.
    pub fn kind(&self) -> &str {
        match self {
            Self::Input(_) => "input",
            Self::Output(_) => "output",
            Self::Sensor(_) => "sensor",
            Self::ModbusSensor(_) => "modbus_sensor",
            Self::Cover(_) => "cover",
            Self::Unknown { kind, .. } => kind,
        }
    }

    /// Identifier of the entity the update targets, if the kind is known.
    pub fn entity_key(&self) -> Option<&str> {
        match self {
            Self::Input(s) => Some(s.key()),
            Self::Output(s) => Some(s.key()),
            Self::Sensor(s) | Self::ModbusSensor(s) => Some(s.key()),
            Self::Cover(s) => Some(s.key()),
            Self::Unknown { .. } => None,
        }
    }
}

fn payload<T: serde::de::DeserializeOwned>(kind: &str, data: Value) -> Result<T, Error> {
    serde_json::from_value(data).map_err(|e| Error::Protocol(format!("invalid {kind} payload: {e}")))
}

impl Serialize for StateUpdate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut out = serializer.serialize_struct("StateUpdate", 2)?;
        out.serialize_field("type", self.kind())?;
        match self {
            Self::Input(s) => out.serialize_field("data", s)?,
            Self::Output(s) => out.serialize_field("data", s)?,
            Self::Sensor(s) | Self::ModbusSensor(s) => out.serialize_field("data", s)?,
            Self::Cover(s) => out.serialize_field("data", s)?,
            Self::Unknown { data, .. } => out.serialize_field("data", data)?,
        }
        out.end()
    }
}

// ── Commands ────────────────────────────────────────────────────────

/// Motion command accepted by `POST /api/covers/{id}/action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverAction {
    Open,
    Close,
    Stop,
    Toggle,
}

impl CoverAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Stop => "stop",
            Self::Toggle => "toggle",
        }
    }
}

/// `{status, message?}` returned by command endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

// ── System ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VersionResponse {
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NameResponse {
    pub name: String,
}

/// `GET /api/config`: the parsed configuration with `!include`s resolved.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ParsedConfigResponse {
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AuthRequiredResponse {
    pub required: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginResponse {
    pub token: String,
}

/// One log line from `GET /api/logs`. `level` is a syslog priority string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub message: String,
    #[serde(default)]
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LogsResponse {
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

/// Result of `GET /api/check_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateInfo {
    pub status: String,
    #[serde(default)]
    pub current_version: Option<String>,
    #[serde(default)]
    pub latest_version: Option<String>,
    #[serde(default)]
    pub update_available: Option<bool>,
    #[serde(default)]
    pub release_url: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub is_prerelease: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

// ── Files ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
}

/// Node of the configuration file tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItem {
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileItem>,
}

impl FileItem {
    /// Depth-first walk yielding every node with its depth.
    pub fn walk(&self) -> Vec<(usize, &FileItem)> {
        let mut out = Vec::new();
        let mut stack = vec![(0usize, self)];
        while let Some((depth, item)) = stack.pop() {
            out.push((depth, item));
            stack.extend(item.children.iter().rev().map(|c| (depth + 1, c)));
        }
        out
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FilesResponse {
    #[serde(default)]
    pub items: Vec<FileItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FileContent {
    pub content: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn output_frame_keeps_unknown_fields() {
        let update = StateUpdate::from_json(
            r#"{"type":"output","data":{"id":"relay1","name":"Relay 1","state":"ON","type":"switch","pin":3,"restored":true}}"#,
        )
        .unwrap();

        let StateUpdate::Output(out) = &update else {
            panic!("expected output, got {update:?}");
        };
        assert_eq!(out.key(), "relay1");
        assert_eq!(out.state, "ON");
        assert_eq!(out.output_type.as_deref(), Some("switch"));
        assert_eq!(out.extra.get("restored"), Some(&json!(true)));
    }

    #[test]
    fn key_falls_back_to_name() {
        let update =
            StateUpdate::from_json(r#"{"type":"input","data":{"name":"IN_01","state":"pressed"}}"#)
                .unwrap();
        assert_eq!(update.entity_key(), Some("IN_01"));
    }

    #[test]
    fn modbus_device_is_a_modbus_sensor() {
        let update = StateUpdate::from_json(
            r#"{"type":"modbus_device","data":{"id":"sdm_voltage","name":"Voltage","state":231.4,"unit":"V"}}"#,
        )
        .unwrap();
        let StateUpdate::ModbusSensor(sensor) = &update else {
            panic!("expected modbus sensor, got {update:?}");
        };
        assert_eq!(sensor.display_value(), "231.4 V");
        assert_eq!(update.kind(), "modbus_sensor");
    }

    #[test]
    fn unknown_kind_is_carried_not_rejected() {
        let update =
            StateUpdate::from_json(r#"{"type":"host_sensor","data":{"id":"cpu"}}"#).unwrap();
        assert!(matches!(update, StateUpdate::Unknown { ref kind, .. } if kind == "host_sensor"));
        assert_eq!(update.entity_key(), None);
    }

    #[test]
    fn malformed_frames_are_protocol_errors() {
        for text in [
            "not json",
            r#"{"data":{}}"#,
            r#"{"type":"output","data":{"name":"x"}}"#,
            r#"{"type":"cover","data":{"state":"open"}}"#,
        ] {
            let err = StateUpdate::from_json(text).unwrap_err();
            assert!(matches!(err, Error::Protocol(_)), "{text}: {err:?}");
        }
    }

    #[test]
    fn serializes_back_to_envelope_shape() {
        let update = StateUpdate::from_json(
            r#"{"type":"cover","data":{"id":"c1","name":"Blind","state":"open","position":40,"tilt":10,"current_operation":"idle","kind":"venetian"}}"#,
        )
        .unwrap();
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["type"], "cover");
        assert_eq!(value["data"]["position"], 40);
        assert_eq!(value["data"]["kind"], "venetian");
    }

    #[test]
    fn file_tree_walks_depth_first() {
        let tree: FileItem = serde_json::from_value(json!({
            "name": "config", "path": "", "type": "directory",
            "children": [
                {"name": "config.yaml", "path": "config.yaml", "type": "file"},
                {"name": "inc", "path": "inc", "type": "directory", "children": [
                    {"name": "covers.yaml", "path": "inc/covers.yaml", "type": "file"}
                ]}
            ]
        }))
        .unwrap();

        let names: Vec<(usize, &str)> = tree
            .walk()
            .into_iter()
            .map(|(d, i)| (d, i.name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![(0, "config"), (1, "config.yaml"), (1, "inc"), (2, "covers.yaml")]
        );
    }
}
