use crate::output::print_json;
use clap::Subcommand;
use dispatch_core::session;
use dispatch_core::snapshot::{self, Snapshot, SnapshotDiff};
use std::path::Path;

#[derive(Subcommand)]
pub enum SnapshotSubcommand {
    /// Capture a snapshot and update the latest pointer
    Take,
    /// Compare two snapshots (default: latest snapshot vs live state)
    Diff {
        /// Snapshot name to diff from (default: latest)
        #[arg(long)]
        from: Option<String>,
        /// Snapshot name to diff to (default: the live list, uncaptured)
        #[arg(long)]
        to: Option<String>,
    },
    /// List snapshots for the list, oldest first
    List,
}

pub fn run(
    root: &Path,
    list: Option<&str>,
    subcmd: SnapshotSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let list = session::resolve(list, root)?;
    match subcmd {
        SnapshotSubcommand::Take => take(root, &list, json),
        SnapshotSubcommand::Diff { from, to } => {
            diff(root, &list, from.as_deref(), to.as_deref(), json)
        }
        SnapshotSubcommand::List => list_snapshots(root, &list, json),
    }
}

fn take(root: &Path, list: &str, json: bool) -> anyhow::Result<()> {
    let (name, snap) = snapshot::take(root, list)?;
    if json {
        print_json(&serde_json::json!({ "name": name, "tasks": snap.tasks.len() }))?;
    } else {
        println!("Snapshot {name} ({} tasks)", snap.tasks.len());
    }
    Ok(())
}

fn diff(
    root: &Path,
    list: &str,
    from: Option<&str>,
    to: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let prev = match from {
        Some(name) => snapshot::load(root, list, name)?,
        None => snapshot::latest(root, list)?,
    };
    let curr = match to {
        Some(name) => snapshot::load(root, list, name)?,
        None => Snapshot::capture(root, list)?,
    };
    let delta = snapshot::diff(&prev, &curr);

    if json {
        print_json(&delta)?;
        return Ok(());
    }
    if delta.is_empty() {
        println!("No changes.");
        return Ok(());
    }
    print_delta(&delta);
    Ok(())
}

fn print_delta(delta: &SnapshotDiff) {
    for id in &delta.added {
        println!("+ {id}");
    }
    for id in &delta.removed {
        println!("- {id}");
    }
    for change in &delta.changed {
        for field in &change.fields {
            println!(
                "~ {} {}: {} -> {}",
                change.id, field.field, field.before, field.after
            );
        }
    }
}

fn list_snapshots(root: &Path, list: &str, json: bool) -> anyhow::Result<()> {
    let names = snapshot::list_snapshots(root, list)?;
    if json {
        print_json(&names)?;
        return Ok(());
    }
    if names.is_empty() {
        println!("No snapshots for '{list}'.");
        return Ok(());
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}
