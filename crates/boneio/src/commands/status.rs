use serde::Serialize;
use tracing::debug;

use boneio_core::{Console, CoreError};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct StatusView {
    url: String,
    reachable: bool,
    version: Option<String>,
    name: Option<String>,
    auth_required: bool,
    authenticated: bool,
}

fn yes_no(value: bool) -> String {
    let text = if value { "yes" } else { "no" };
    text.into()
}

fn detail(s: &StatusView) -> String {
    output::detail(&[
        ("URL", s.url.clone()),
        ("Reachable", yes_no(s.reachable)),
        ("Name", s.name.clone().unwrap_or_else(|| "-".into())),
        ("Version", s.version.clone().unwrap_or_else(|| "-".into())),
        ("Login required", yes_no(s.auth_required)),
        ("Logged in", yes_no(s.authenticated)),
    ])
}

pub async fn handle(console: &Console, global: &GlobalOpts) -> Result<(), CliError> {
    let auth = console.start().await;

    let (version, unreachable) = match console.version().await {
        Ok(version) => (Some(version), None),
        Err(e @ (CoreError::ConnectionFailed { .. } | CoreError::Timeout { .. })) => (None, Some(e)),
        Err(e) => return Err(e.into()),
    };
    let name = if unreachable.is_none() {
        console
            .name()
            .await
            .inspect_err(|e| debug!(error = %e, "device name unavailable"))
            .ok()
    } else {
        None
    };

    let view = StatusView {
        url: console.config().url.to_string(),
        reachable: unreachable.is_none(),
        version,
        name,
        auth_required: auth.is_auth_required,
        authenticated: console.auth_state().is_authenticated,
    };
    let out = output::render_single(global.output, &view, detail, |s| yes_no(s.reachable))?;
    output::print_output(&out, global.quiet);

    match unreachable {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
