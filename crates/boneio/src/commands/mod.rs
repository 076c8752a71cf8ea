//! Command handlers, one module per top-level subcommand group.

pub mod covers;
pub mod files;
pub mod outputs;
pub mod profile;
pub mod session;
pub mod status;
pub mod system;
pub mod util;
pub mod watch;

use boneio_core::Console;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Route a device command to its handler.
pub async fn dispatch(
    cmd: Command,
    console: &Console,
    global: &GlobalOpts,
    profile: &str,
) -> Result<(), CliError> {
    match cmd {
        Command::Status => status::handle(console, global).await,
        Command::Login(args) => session::login(console, args, global, profile).await,
        Command::Logout => session::logout(console, global, profile),
        Command::Watch(args) => watch::handle(console, args, global).await,
        Command::Outputs(args) => outputs::handle(console, args, global).await,
        Command::Covers(args) => covers::handle(console, args, global).await,
        Command::Files(args) => files::handle(console, args, global).await,
        Command::Config(args) => system::config(console, args, global).await,
        Command::Logs(args) => system::logs(console, args, global).await,
        Command::Restart => system::restart(console, global).await,
        Command::Update(args) => system::update(console, args, global).await,

        // Handled in main before a console exists
        Command::Profile(_) | Command::Completions(_) => Ok(()),
    }
}
