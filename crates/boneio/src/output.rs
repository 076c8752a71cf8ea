//! Output formatting: table, JSON, YAML, plain.
//!
//! Table uses `tabled`, structured formats use serde, plain emits one
//! identifier per line so results pipe into other tools.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

/// Whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// Color an `ON`/`OFF`-style state: green when active, dimmed otherwise.
pub fn paint_state(state: &str, color: bool) -> String {
    if !color {
        return state.to_owned();
    }
    match state.to_ascii_uppercase().as_str() {
        "ON" | "OPEN" | "OPENING" | "PRESSED" => state.green().to_string(),
        "OFF" | "CLOSED" | "CLOSING" | "RELEASED" => state.dimmed().to_string(),
        _ => state.yellow().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of items in the chosen format.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Plain => Ok(data.iter().map(id_fn).collect::<Vec<_>>().join("\n")),
        structured => render_structured(structured, data),
    }
}

/// Render one item. Table mode uses `detail_fn` for a key/value view.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Plain => Ok(id_fn(data)),
        structured => render_structured(structured, data),
    }
}

/// JSON, compact JSON or YAML. Table and plain fall back to compact JSON.
pub fn render_structured<T: Serialize + ?Sized>(
    format: OutputFormat,
    data: &T,
) -> Result<String, CliError> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(data).map_err(serialize_err)?,
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(serialize_err)?,
        OutputFormat::JsonCompact | OutputFormat::Table | OutputFormat::Plain => {
            serde_json::to_string(data).map_err(serialize_err)?
        }
    };
    Ok(rendered)
}

/// Print to stdout unless quiet.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// `key: value` lines, keys padded to the widest.
pub fn detail(pairs: &[(&str, String)]) -> String {
    let width = pairs.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    pairs
        .iter()
        .map(|(k, v)| format!("{k:<width$}  {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn serialize_err(e: impl std::fmt::Display) -> CliError {
    CliError::Internal(format!("cannot serialize output: {e}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Relay {
        id: &'static str,
        state: &'static str,
    }

    #[derive(Tabled)]
    struct RelayRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "State")]
        state: String,
    }

    fn relays() -> Vec<Relay> {
        vec![
            Relay { id: "relay1", state: "ON" },
            Relay { id: "relay2", state: "OFF" },
        ]
    }

    fn row(r: &Relay) -> RelayRow {
        RelayRow {
            id: r.id.into(),
            state: r.state.into(),
        }
    }

    #[test]
    fn plain_lists_one_id_per_line() {
        let out = render_list(OutputFormat::Plain, &relays(), row, |r| r.id.into()).unwrap();
        assert_eq!(out, "relay1\nrelay2");
    }

    #[test]
    fn table_has_headers_and_rows() {
        let out = render_list(OutputFormat::Table, &relays(), row, |r| r.id.into()).unwrap();
        assert!(out.contains("ID"));
        assert!(out.contains("relay2"));
    }

    #[test]
    fn compact_json_is_one_line() {
        let out = render_list(OutputFormat::JsonCompact, &relays(), row, |r| r.id.into()).unwrap();
        assert_eq!(
            out,
            r#"[{"id":"relay1","state":"ON"},{"id":"relay2","state":"OFF"}]"#
        );
    }

    #[test]
    fn detail_aligns_keys() {
        let out = detail(&[("url", "http://x".into()), ("version", "1.0".into())]);
        assert_eq!(out, "url      http://x\nversion  1.0");
    }

    #[test]
    fn states_uncolored_when_disabled() {
        assert_eq!(paint_state("ON", false), "ON");
        assert_ne!(paint_state("ON", true), "ON");
    }
}
