use crate::output::{print_json, print_table};
use clap::Subcommand;
use dispatch_core::graph;
use dispatch_core::session;
use dispatch_core::store;
use std::path::Path;

#[derive(Subcommand)]
pub enum GraphSubcommand {
    /// Check the dependency graph for cycles and unknown references
    Validate,
    /// Show tasks eligible for claiming (pending, all blockers completed)
    Ready,
    /// Show queued task pairs whose descriptions mention the same file
    Conflicts,
}

pub fn run(
    root: &Path,
    list: Option<&str>,
    subcmd: GraphSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let list = session::resolve(list, root)?;
    match subcmd {
        GraphSubcommand::Validate => validate(root, &list, json),
        GraphSubcommand::Ready => ready(root, &list, json),
        GraphSubcommand::Conflicts => conflicts(root, &list, json),
    }
}

fn validate(root: &Path, list: &str, json: bool) -> anyhow::Result<()> {
    let records = store::list(root, list)?;
    graph::validate(&records)?;

    if json {
        print_json(&serde_json::json!({ "valid": true, "tasks": records.len() }))?;
    } else {
        println!("Dependency graph OK ({} tasks)", records.len());
    }
    Ok(())
}

fn ready(root: &Path, list: &str, json: bool) -> anyhow::Result<()> {
    let records = store::list(root, list)?;
    let ready = graph::ready_set(&records);

    if json {
        print_json(&ready)?;
        return Ok(());
    }

    if ready.is_empty() {
        println!("No ready tasks in '{list}'.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = ready
        .iter()
        .map(|t| vec![t.id.clone(), t.subject.clone()])
        .collect();
    print_table(&["ID", "SUBJECT"], rows);
    Ok(())
}

fn conflicts(root: &Path, list: &str, json: bool) -> anyhow::Result<()> {
    let records = store::list(root, list)?;
    let conflicts = graph::conflict_check(&records);

    if json {
        print_json(&conflicts)?;
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No file conflicts among queued tasks.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = conflicts
        .iter()
        .map(|c| vec![c.task_a.clone(), c.task_b.clone(), c.path.clone()])
        .collect();
    print_table(&["TASK A", "TASK B", "PATH"], rows);
    Ok(())
}
