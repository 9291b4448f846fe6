use crate::output::{print_json, print_table};
use clap::Subcommand;
use dispatch_core::claim::{self, ClaimOutcome};
use dispatch_core::graph;
use dispatch_core::session;
use dispatch_core::store;
use dispatch_core::task::{NewTask, OwnerPatch, TaskPatch, TaskRecord};
use dispatch_core::types::TaskStatus;
use std::path::Path;

#[derive(Subcommand)]
pub enum TaskSubcommand {
    /// Create a task
    Create {
        #[arg(required = true)]
        subject: Vec<String>,
        /// Free-form description (opaque to dispatch; external layers may
        /// embed key=value markers here)
        #[arg(long)]
        description: Option<String>,
        /// Present-participle form shown while the task runs
        #[arg(long)]
        active_form: Option<String>,
        /// Comma-separated task IDs this task waits on (e.g. T1,T2)
        #[arg(long)]
        blocked_by: Option<String>,
    },
    /// Update task fields
    Update {
        id: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        active_form: Option<String>,
        /// New status: pending, in_progress, or completed
        #[arg(long)]
        status: Option<String>,
        /// Set the owning worker (requires in_progress status)
        #[arg(long, conflicts_with = "clear_owner")]
        owner: Option<String>,
        /// Clear the owner, releasing the task back to pending
        #[arg(long)]
        clear_owner: bool,
        /// Append a line to the description
        #[arg(long)]
        append_description: Option<String>,
        /// Comma-separated task IDs to add as blockers
        #[arg(long)]
        add_blocked_by: Option<String>,
        /// Comma-separated task IDs to remove from the blockers
        #[arg(long)]
        remove_blocked_by: Option<String>,
    },
    /// Show full details for a single task
    Get { id: String },
    /// List all tasks in the list
    List,
    /// Claim a task for a worker (check, write, verify)
    Claim {
        id: String,
        /// Worker ID claiming the task
        #[arg(long)]
        owner: String,
    },
    /// Claim the first unclaimed ready task in creation order
    ClaimNext {
        /// Worker ID claiming the task
        #[arg(long)]
        owner: String,
    },
    /// Release a claimed task back to pending
    Release { id: String },
    /// Mark a task completed
    Complete { id: String },
}

pub fn run(
    root: &Path,
    list: Option<&str>,
    subcmd: TaskSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let list = session::resolve(list, root)?;
    match subcmd {
        TaskSubcommand::Create {
            subject,
            description,
            active_form,
            blocked_by,
        } => create(
            root,
            &list,
            &subject.join(" "),
            description,
            active_form,
            blocked_by.as_deref(),
            json,
        ),
        TaskSubcommand::Update {
            id,
            subject,
            active_form,
            status,
            owner,
            clear_owner,
            append_description,
            add_blocked_by,
            remove_blocked_by,
        } => {
            let patch = TaskPatch {
                subject,
                active_form,
                status: status.as_deref().map(str::parse::<TaskStatus>).transpose()?,
                owner: if clear_owner {
                    Some(OwnerPatch::Clear)
                } else {
                    owner.map(OwnerPatch::Set)
                },
                append_description,
                add_blocked_by: split_ids(add_blocked_by.as_deref()),
                remove_blocked_by: split_ids(remove_blocked_by.as_deref()),
            };
            update(root, &list, &id, patch, json)
        }
        TaskSubcommand::Get { id } => get(root, &list, &id, json),
        TaskSubcommand::List => list_tasks(root, &list, json),
        TaskSubcommand::Claim { id, owner } => claim_one(root, &list, &id, &owner, json),
        TaskSubcommand::ClaimNext { owner } => claim_next(root, &list, &owner, json),
        TaskSubcommand::Release { id } => release(root, &list, &id, json),
        TaskSubcommand::Complete { id } => complete(root, &list, &id, json),
    }
}

fn split_ids(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn create(
    root: &Path,
    list: &str,
    subject: &str,
    description: Option<String>,
    active_form: Option<String>,
    blocked_by: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let new = NewTask {
        subject: subject.to_string(),
        description,
        active_form,
        blocked_by: split_ids(blocked_by),
    };
    let task = store::create(root, list, new)?;

    if json {
        print_json(&task)?;
    } else {
        println!("Created task [{}]: {}", task.id, task.subject);
    }
    Ok(())
}

fn update(root: &Path, list: &str, id: &str, patch: TaskPatch, json: bool) -> anyhow::Result<()> {
    let task = store::update(root, list, id, patch)?;
    if json {
        print_json(&task)?;
    } else {
        println!("Updated task [{}]: {}", task.id, task.status);
    }
    Ok(())
}

fn get(root: &Path, list: &str, id: &str, json: bool) -> anyhow::Result<()> {
    let task = store::get(root, list, id)?;
    if json {
        print_json(&task)?;
        return Ok(());
    }

    println!("Task: {}", task.id);
    println!("Status:      {}", task.status);
    println!("Subject:     {}", task.subject);
    if let Some(active_form) = &task.active_form {
        println!("Active form: {}", active_form);
    }
    if let Some(description) = &task.description {
        println!("Description: {}", description);
    }
    println!("Owner:       {}", task.owner.as_deref().unwrap_or("(none)"));
    if !task.blocked_by.is_empty() {
        println!("Blocked by:  {}", task.blocked_by.join(", "));
    }
    if !task.blocks.is_empty() {
        println!("Blocks:      {}", task.blocks.join(", "));
    }
    println!("Updated:     {}", task.updated_at.format("%Y-%m-%d %H:%M:%S"));
    Ok(())
}

fn summarize(records: &[TaskRecord]) -> String {
    let total = records.len();
    let done = records
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .count();
    let in_progress = records
        .iter()
        .filter(|t| t.status == TaskStatus::InProgress)
        .count();
    let ready = graph::ready_set(records).len();
    format!("{done}/{total} completed, {in_progress} in progress, {ready} ready")
}

fn list_tasks(root: &Path, list: &str, json: bool) -> anyhow::Result<()> {
    let records = store::list(root, list)?;

    if json {
        print_json(&records)?;
        return Ok(());
    }

    if records.is_empty() {
        println!("No tasks in '{list}'.");
        return Ok(());
    }

    println!("{}", summarize(&records));
    println!();

    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|t| {
            vec![
                t.id.clone(),
                t.status.to_string(),
                t.owner.clone().unwrap_or_default(),
                t.subject.clone(),
                t.blocked_by.join(","),
            ]
        })
        .collect();
    print_table(&["ID", "STATUS", "OWNER", "SUBJECT", "BLOCKED BY"], rows);
    Ok(())
}

fn claim_one(root: &Path, list: &str, id: &str, owner: &str, json: bool) -> anyhow::Result<()> {
    match claim::claim(root, list, id, owner)? {
        ClaimOutcome::Claimed(task) => {
            if json {
                print_json(&serde_json::json!({ "claimed": true, "task": task }))?;
            } else {
                println!("Claimed [{}] for '{}'", task.id, owner);
            }
        }
        ClaimOutcome::Lost { observed } => {
            if json {
                print_json(&serde_json::json!({
                    "claimed": false,
                    "task_id": id,
                    "observed_owner": observed,
                }))?;
            } else {
                println!(
                    "Lost claim on [{id}]: owned by '{}'",
                    observed.as_deref().unwrap_or("(none)")
                );
            }
        }
    }
    Ok(())
}

fn claim_next(root: &Path, list: &str, owner: &str, json: bool) -> anyhow::Result<()> {
    match claim::claim_next(root, list, owner)? {
        Some(task) => {
            if json {
                print_json(&serde_json::json!({ "claimed": true, "task": task }))?;
            } else {
                println!("Claimed [{}] for '{}': {}", task.id, owner, task.subject);
            }
        }
        None => {
            if json {
                print_json(&serde_json::json!({ "claimed": false }))?;
            } else {
                println!("No ready unclaimed tasks in '{list}'.");
            }
        }
    }
    Ok(())
}

fn release(root: &Path, list: &str, id: &str, json: bool) -> anyhow::Result<()> {
    let task = claim::release(root, list, id)?;
    if json {
        print_json(&task)?;
    } else {
        println!("Released [{}] back to pending", task.id);
    }
    Ok(())
}

fn complete(root: &Path, list: &str, id: &str, json: bool) -> anyhow::Result<()> {
    let task = claim::complete(root, list, id)?;
    if json {
        print_json(&task)?;
    } else {
        println!("Completed [{}]", task.id);
    }
    Ok(())
}
