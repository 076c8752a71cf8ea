use std::fs;
use std::path::Path;

use clap::CommandFactory;

// cli.rs only needs clap, clap_complete and humantime, all of which are
// build-dependencies.
#[path = "src/cli.rs"]
#[allow(dead_code)]
mod cli;

fn main() {
    println!("cargo::rerun-if-changed=src/cli.rs");

    let Some(out_dir) = std::env::var_os("OUT_DIR") else {
        panic!("OUT_DIR not set by Cargo");
    };
    let man_dir = Path::new(&out_dir).join("man");
    if let Err(e) = fs::create_dir_all(&man_dir) {
        panic!("cannot create {}: {e}", man_dir.display());
    }

    render(&cli::Cli::command(), &man_dir);
}

/// Write `<name>.1` for `cmd`, then `<name>-<sub>.1` for each visible subcommand.
fn render(cmd: &clap::Command, dir: &Path) {
    let name = cmd.get_name().to_owned();
    let path = dir.join(format!("{name}.1"));

    let mut page = Vec::new();
    if let Err(e) = clap_mangen::Man::new(cmd.clone()).render(&mut page) {
        panic!("man page for `{name}`: {e}");
    }
    if let Err(e) = fs::write(&path, page) {
        panic!("cannot write {}: {e}", path.display());
    }

    for sub in cmd.get_subcommands().filter(|s| !s.is_hide_set()) {
        render(&sub.clone().name(format!("{name}-{}", sub.get_name())), dir);
    }
}
