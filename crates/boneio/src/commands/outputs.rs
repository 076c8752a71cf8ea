use std::sync::Arc;
use std::time::Duration;

use boneio_core::{Command, Console, OutputState};

use crate::cli::{GlobalOpts, OutputsArgs, OutputsCommand};
use crate::commands::{util, watch};
use crate::error::CliError;
use crate::output;

/// Quiet period that ends the initial burst for `list`.
const LIST_SETTLE: Duration = Duration::from_secs(1);

pub async fn handle(console: &Console, args: OutputsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        OutputsCommand::List => {
            let tables = watch::snapshot(console, LIST_SETTLE, global).await?;
            let outputs: Vec<&OutputState> = tables.outputs.iter().map(Arc::as_ref).collect();
            let color = output::should_color(global.color);
            let out = output::render_list(
                global.output,
                &outputs,
                |o| watch::output_row(o, color),
                |o| o.key().to_owned(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        OutputsCommand::Toggle { id } => {
            let result = console
                .execute(Command::ToggleOutput { id: id.clone() })
                .await?;
            util::report(&result, &format!("Toggled {id}"), global);
            Ok(())
        }
    }
}
