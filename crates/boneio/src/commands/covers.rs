use std::sync::Arc;
use std::time::Duration;

use boneio_core::{Command, Console, CoverAction, CoverState};

use crate::cli::{CoversArgs, CoversCommand, GlobalOpts};
use crate::commands::{util, watch};
use crate::error::CliError;
use crate::output;

const LIST_SETTLE: Duration = Duration::from_secs(1);

pub async fn handle(console: &Console, args: CoversArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (cmd, done) = match args.command {
        CoversCommand::List => return list(console, global).await,
        CoversCommand::Open { id } => action(id, CoverAction::Open),
        CoversCommand::Close { id } => action(id, CoverAction::Close),
        CoversCommand::Stop { id } => action(id, CoverAction::Stop),
        CoversCommand::Toggle { id } => action(id, CoverAction::Toggle),
        CoversCommand::Position { id, value } => {
            let done = format!("Moving {id} to {value}%");
            (Command::SetCoverPosition { id, position: value }, done)
        }
        CoversCommand::Tilt { id, value } => {
            let done = format!("Tilting {id} to {value}%");
            (Command::SetCoverTilt { id, tilt: value }, done)
        }
    };

    let result = console.execute(cmd).await?;
    util::report(&result, &done, global);
    Ok(())
}

fn action(id: String, action: CoverAction) -> (Command, String) {
    let done = format!("Sent {} to {id}", action.as_str());
    (Command::CoverAction { id, action }, done)
}

async fn list(console: &Console, global: &GlobalOpts) -> Result<(), CliError> {
    let tables = watch::snapshot(console, LIST_SETTLE, global).await?;
    let covers: Vec<&CoverState> = tables.covers.iter().map(Arc::as_ref).collect();
    let color = output::should_color(global.color);
    let out = output::render_list(
        global.output,
        &covers,
        |c| watch::cover_row(c, color),
        |c| c.key().to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
