//! `files list|get|put` against the device's configuration directory.

use serde::Serialize;
use tabled::Tabled;

use boneio_core::{Command, Console, FileItem, FileKind};

use crate::cli::{FilesArgs, FilesCommand, GlobalOpts};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

/// One node of the tree, flattened with its depth.
#[derive(Debug, Serialize)]
struct FileEntry {
    path: String,
    kind: FileKind,
    #[serde(skip)]
    depth: usize,
    #[serde(skip)]
    name: String,
}

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Path")]
    path: String,
}

fn flatten(items: &[FileItem]) -> Vec<FileEntry> {
    items
        .iter()
        .flat_map(FileItem::walk)
        .map(|(depth, item)| FileEntry {
            path: item.path.clone(),
            kind: item.kind,
            depth,
            name: item.name.clone(),
        })
        .collect()
}

fn row(entry: &FileEntry) -> FileRow {
    let marker = match entry.kind {
        FileKind::Directory => "/",
        FileKind::File => "",
    };
    FileRow {
        name: format!("{}{}{marker}", "  ".repeat(entry.depth), entry.name),
        path: entry.path.clone(),
    }
}

pub async fn handle(console: &Console, args: FilesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        FilesCommand::List { path } => {
            let items = console.list_files(path.as_deref()).await?;
            let entries = flatten(&items);
            let out = output::render_list(global.output, &entries, row, |e| e.path.clone())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        FilesCommand::Get { path, out } => {
            let content = console.get_file(&path).await?;
            match out {
                Some(target) => {
                    std::fs::write(&target, content)?;
                    if !global.quiet {
                        eprintln!("Wrote {path} to {}", target.display());
                    }
                }
                None => output::print_output(content.trim_end_matches('\n'), global.quiet),
            }
            Ok(())
        }

        FilesCommand::Put { path, from } => {
            let content = std::fs::read_to_string(&from)?;
            let result = console.execute(Command::PutFile { path: path.clone(), content }).await?;
            util::report(&result, &format!("Uploaded {path}"), global);
            Ok(())
        }
    }
}
