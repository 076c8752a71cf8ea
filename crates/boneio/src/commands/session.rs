//! `login` and `logout`.

use dialoguer::Input;
use secrecy::SecretString;

use boneio_core::Console;

use crate::cli::{GlobalOpts, LoginArgs};
use crate::commands::util::prompt_err;
use crate::config;
use crate::error::CliError;
use crate::output;

/// Exchange credentials for a session token. The token lands in the
/// profile's keyring entry through the console's token store.
///
/// Credentials come from flags and the profile first, then env and keyring,
/// then an interactive prompt.
pub async fn login(
    console: &Console,
    args: LoginArgs,
    global: &GlobalOpts,
    profile_name: &str,
) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let mut profile = cfg.profiles.get(profile_name).cloned().unwrap_or_default();
    if args.username.is_some() {
        profile.username.clone_from(&args.username);
    }

    let (username, password) = match config::resolve_credentials(&profile, profile_name) {
        Ok(credentials) => credentials,
        Err(_) => {
            let username = match profile.username {
                Some(username) => username,
                None => Input::new()
                    .with_prompt("Username")
                    .interact_text()
                    .map_err(prompt_err)?,
            };
            let password = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "password cannot be empty".into(),
                });
            }
            (username, SecretString::from(password))
        }
    };

    console.login(&username, &password).await?;

    if args.save_password {
        config::store_password(profile_name, &password)?;
        if !global.quiet {
            eprintln!("Password stored in the system keyring");
        }
    }

    output::print_output(&format!("Logged in as {username}"), global.quiet);
    Ok(())
}

/// Forget the session token for this profile.
pub fn logout(console: &Console, global: &GlobalOpts, profile_name: &str) -> Result<(), CliError> {
    console.logout();
    output::print_output(&format!("Logged out of '{profile_name}'"), global.quiet);
    Ok(())
}
