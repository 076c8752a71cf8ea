//! `watch`: live entity state, streamed or as a settled snapshot.
//!
//! Also home of the snapshot helper and the entity tables that
//! `outputs list` and `covers list` reuse.

use std::sync::Arc;
use std::time::Duration;

use indicatif::ProgressBar;
use serde::Serialize;
use tabled::Tabled;
use tokio::sync::mpsc;
use tokio::time::Instant;

use boneio_core::{
    ConnectionEvent, ConnectionState, Console, CoverState, EntityTables, InputState, OutputState,
    SensorState, StateUpdate,
};

use crate::cli::{EntityKind, GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(console: &Console, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if args.snapshot {
        let tables = snapshot(console, args.settle, global).await?;
        let out = render_tables(&tables, &args.kind, global)?;
        output::print_output(&out, global.quiet);
        return Ok(());
    }
    stream(console, &args.kind, global).await
}

// ── Snapshot ─────────────────────────────────────────────────────────

/// Subscribe, wait until the initial burst has been quiet for `settle`,
/// and return the tables. Bounded by the request timeout.
pub async fn snapshot(
    console: &Console,
    settle: Duration,
    global: &GlobalOpts,
) -> Result<EntityTables, CliError> {
    if !console.start().await.is_satisfied() {
        return Err(CliError::Unauthorized);
    }

    let spinner = spinner(global);
    let mut watch = console.watch_state();
    let mut errors = watch.errors();
    let limit = console.config().timeout;
    let deadline = Instant::now() + limit;

    loop {
        let wake = if watch.current().is_empty() {
            deadline
        } else {
            (Instant::now() + settle).min(deadline)
        };
        tokio::select! {
            changed = watch.changed() => {
                if changed.is_none() {
                    break;
                }
            }
            Ok(()) = errors.changed() => {
                let terminal = errors.borrow_and_update().clone();
                if let Some(message) = terminal {
                    spinner.finish_and_clear();
                    return Err(CliError::StreamLost { message });
                }
            }
            () = tokio::time::sleep_until(wake) => break,
        }
    }
    spinner.finish_and_clear();

    let tables = watch.current().clone();
    if tables.is_empty() && console.connection().current_state() != ConnectionState::Open {
        return Err(CliError::Timeout {
            seconds: limit.as_secs(),
        });
    }
    Ok(tables)
}

fn spinner(global: &GlobalOpts) -> ProgressBar {
    if global.quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_message("waiting for device state");
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

// ── Streaming ────────────────────────────────────────────────────────

async fn stream(console: &Console, kinds: &[EntityKind], global: &GlobalOpts) -> Result<(), CliError> {
    if !console.start().await.is_satisfied() {
        return Err(CliError::Unauthorized);
    }

    let color = output::should_color(global.color);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _subscription = console.subscribe(move |event| {
        let _ = tx.send(event.clone());
    });
    let mut connection = console.connection().state();

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(ConnectionEvent::Update(update)) => {
                    if let Some(line) = render_update(&update, kinds, global.output, color)? {
                        output::print_output(&line, global.quiet);
                    }
                }
                Some(ConnectionEvent::Error(message)) => {
                    return Err(CliError::StreamLost { message });
                }
                None => return Ok(()),
            },
            Ok(()) = connection.changed() => {
                let state = *connection.borrow_and_update();
                if !global.quiet && matches!(state, ConnectionState::Open | ConnectionState::Closed) {
                    eprintln!("connection {state}");
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

fn kind_of(update: &StateUpdate) -> Option<EntityKind> {
    match update {
        StateUpdate::Output(_) => Some(EntityKind::Output),
        StateUpdate::Input(_) => Some(EntityKind::Input),
        StateUpdate::Sensor(_) | StateUpdate::ModbusSensor(_) => Some(EntityKind::Sensor),
        StateUpdate::Cover(_) => Some(EntityKind::Cover),
        StateUpdate::Unknown { .. } => None,
    }
}

fn wants(kinds: &[EntityKind], kind: EntityKind) -> bool {
    kinds.is_empty() || kinds.contains(&kind)
}

/// One line per update, or `None` when filtered out. Unknown kinds only
/// show without a filter.
fn render_update(
    update: &StateUpdate,
    kinds: &[EntityKind],
    format: OutputFormat,
    color: bool,
) -> Result<Option<String>, CliError> {
    let shown = match kind_of(update) {
        Some(kind) => wants(kinds, kind),
        None => kinds.is_empty(),
    };
    if !shown {
        return Ok(None);
    }

    let line = match format {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            output::render_structured(OutputFormat::JsonCompact, update)?
        }
        OutputFormat::Yaml => format!("---\n{}", output::render_structured(format, update)?),
        OutputFormat::Table | OutputFormat::Plain => {
            let value = match update {
                StateUpdate::Output(s) => output::paint_state(&s.state, color),
                StateUpdate::Input(s) => output::paint_state(&s.state, color),
                StateUpdate::Sensor(s) | StateUpdate::ModbusSensor(s) => s.display_value(),
                StateUpdate::Cover(s) => format!(
                    "{} {}%{}",
                    output::paint_state(&s.state, color),
                    s.position,
                    tilt_suffix(s)
                ),
                StateUpdate::Unknown { data, .. } => data.to_string(),
            };
            let key = update.entity_key().unwrap_or("-");
            format!("{:<13} {key:<20} {value}", update.kind())
        }
    };
    Ok(Some(line))
}

fn tilt_suffix(cover: &CoverState) -> String {
    if cover.supports_tilt() {
        format!(" tilt {}%", cover.tilt)
    } else {
        String::new()
    }
}

// ── Tables ───────────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct OutputRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Type")]
    kind: String,
}

#[derive(Tabled)]
struct InputRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Pin")]
    pin: String,
}

#[derive(Tabled)]
struct SensorRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
pub struct CoverRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Position")]
    position: String,
    #[tabled(rename = "Tilt")]
    tilt: String,
    #[tabled(rename = "Moving")]
    operation: String,
}

pub fn output_row(o: &OutputState, color: bool) -> OutputRow {
    OutputRow {
        id: o.key().into(),
        name: o.name.clone(),
        state: output::paint_state(&o.state, color),
        kind: o.output_type.clone().unwrap_or_default(),
    }
}

fn input_row(i: &InputState, color: bool) -> InputRow {
    InputRow {
        id: i.key().into(),
        name: i.name.clone(),
        state: output::paint_state(&i.state, color),
        pin: i.pin.clone().unwrap_or_default(),
    }
}

fn sensor_row(s: &SensorState) -> SensorRow {
    SensorRow {
        id: s.key().into(),
        name: s.name.clone(),
        value: s.display_value(),
    }
}

pub fn cover_row(c: &CoverState, color: bool) -> CoverRow {
    CoverRow {
        id: c.key().into(),
        name: c.name.clone(),
        state: output::paint_state(&c.state, color),
        position: format!("{}%", c.position),
        tilt: if c.supports_tilt() {
            format!("{}%", c.tilt)
        } else {
            "-".into()
        },
        operation: c.current_operation.clone(),
    }
}

#[derive(Serialize)]
struct SnapshotView<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    outputs: Option<Vec<&'a OutputState>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inputs: Option<Vec<&'a InputState>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sensors: Option<Vec<&'a SensorState>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    covers: Option<Vec<&'a CoverState>>,
}

fn collect<'a, T>(
    kinds: &[EntityKind],
    kind: EntityKind,
    table: &'a boneio_core::EntityTable<T>,
) -> Option<Vec<&'a T>> {
    wants(kinds, kind).then(|| table.iter().map(Arc::as_ref).collect())
}

fn render_tables(
    tables: &EntityTables,
    kinds: &[EntityKind],
    global: &GlobalOpts,
) -> Result<String, CliError> {
    let view = SnapshotView {
        outputs: collect(kinds, EntityKind::Output, &tables.outputs),
        inputs: collect(kinds, EntityKind::Input, &tables.inputs),
        sensors: collect(kinds, EntityKind::Sensor, &tables.sensors),
        covers: collect(kinds, EntityKind::Cover, &tables.covers),
    };
    let color = output::should_color(global.color);

    match global.output {
        OutputFormat::Table => {
            let mut sections = Vec::new();
            if let Some(ref rows) = view.outputs {
                let rows: Vec<_> = rows.iter().map(|o| output_row(o, color)).collect();
                sections.push(format!("Outputs\n{}", output::render_table(&rows)));
            }
            if let Some(ref rows) = view.inputs {
                let rows: Vec<_> = rows.iter().map(|i| input_row(i, color)).collect();
                sections.push(format!("Inputs\n{}", output::render_table(&rows)));
            }
            if let Some(ref rows) = view.sensors {
                let rows: Vec<_> = rows.iter().copied().map(sensor_row).collect();
                sections.push(format!("Sensors\n{}", output::render_table(&rows)));
            }
            if let Some(ref rows) = view.covers {
                let rows: Vec<_> = rows.iter().map(|c| cover_row(c, color)).collect();
                sections.push(format!("Covers\n{}", output::render_table(&rows)));
            }
            Ok(sections.join("\n\n"))
        }
        OutputFormat::Plain => {
            let mut lines = Vec::new();
            let prefixed = |prefix: &str, keys: Vec<&str>| {
                keys.into_iter().map(|k| format!("{prefix}/{k}")).collect::<Vec<_>>()
            };
            if let Some(ref rows) = view.outputs {
                lines.extend(prefixed("output", rows.iter().map(|o| o.key()).collect()));
            }
            if let Some(ref rows) = view.inputs {
                lines.extend(prefixed("input", rows.iter().map(|i| i.key()).collect()));
            }
            if let Some(ref rows) = view.sensors {
                lines.extend(prefixed("sensor", rows.iter().map(|s| s.key()).collect()));
            }
            if let Some(ref rows) = view.covers {
                lines.extend(prefixed("cover", rows.iter().map(|c| c.key()).collect()));
            }
            Ok(lines.join("\n"))
        }
        structured => output::render_structured(structured, &view),
    }
}
