//! Shared helpers for command handlers.

use std::io::IsTerminal;

use boneio_core::CommandResult;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Prompt for confirmation, auto-approving with `--yes`. Refuses outright
/// when stdin is not a terminal.
pub fn confirm(action: &str, message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(prompt_err)
}

/// Map a dialoguer / rpassword failure into a CLI error.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Report a command outcome: the device's message, or `fallback`.
pub fn report(result: &CommandResult, fallback: &str, global: &GlobalOpts) {
    let text = match result {
        CommandResult::Ok => fallback,
        CommandResult::Message(message) => message,
    };
    output::print_output(text, global.quiet);
}
