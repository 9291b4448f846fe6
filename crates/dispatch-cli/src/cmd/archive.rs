use crate::output::print_json;
use clap::Subcommand;
use dispatch_core::archive;
use dispatch_core::session;
use std::path::Path;

#[derive(Subcommand)]
pub enum ArchiveSubcommand {
    /// Archive the list to cold storage and clear its live records
    Run {
        /// Why the list is being retired (recorded in the manifest)
        #[arg(long)]
        reason: Option<String>,
    },
    /// Restore an archived list into live storage
    Restore { name: String },
    /// List archives
    List,
}

pub fn run(
    root: &Path,
    list: Option<&str>,
    subcmd: ArchiveSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    match subcmd {
        ArchiveSubcommand::Run { reason } => {
            let list = session::resolve(list, root)?;
            archive_list(root, &list, reason.as_deref(), json)
        }
        ArchiveSubcommand::Restore { name } => restore(root, &name, json),
        ArchiveSubcommand::List => list_archives(root, json),
    }
}

fn archive_list(root: &Path, list: &str, reason: Option<&str>, json: bool) -> anyhow::Result<()> {
    let manifest = archive::archive(root, list, reason)?;

    if json {
        print_json(&manifest)?;
        return Ok(());
    }
    match &manifest.name {
        Some(name) => println!(
            "Archived '{list}' as {name} ({} completed, {} in progress, {} pending)",
            manifest.counts.completed, manifest.counts.in_progress, manifest.counts.pending
        ),
        None => println!("Nothing to archive in '{list}'."),
    }
    Ok(())
}

fn restore(root: &Path, name: &str, json: bool) -> anyhow::Result<()> {
    let list = archive::restore(root, name)?;
    if json {
        print_json(&serde_json::json!({ "restored": name, "list": list }))?;
    } else {
        println!("Restored {name} into '{list}'");
    }
    Ok(())
}

fn list_archives(root: &Path, json: bool) -> anyhow::Result<()> {
    let names = archive::archives(root)?;
    if json {
        print_json(&names)?;
        return Ok(());
    }
    if names.is_empty() {
        println!("No archives.");
        return Ok(());
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}
