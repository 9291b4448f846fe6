//! Durable CRUD for task records, one YAML file per task under the list
//! directory. Every write is an atomic rename, so concurrent processes see
//! whole records only. There is no partial-field locking: concurrent updates
//! to the same record race under last-write-wins, and the claim protocol's
//! verify step is what resolves ownership races.

use crate::error::{DispatchError, Result};
use crate::graph;
use crate::io;
use crate::paths;
use crate::task::{NewTask, OwnerPatch, TaskPatch, TaskRecord};
use crate::types::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

// ---------------------------------------------------------------------------
// ListMeta
// ---------------------------------------------------------------------------

/// Per-list bookkeeping. `next_seq` is preserved across archival so task IDs
/// are never reused within a list's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListMeta {
    pub created_at: DateTime<Utc>,
    pub next_seq: u64,
}

impl ListMeta {
    fn new() -> Self {
        Self {
            created_at: Utc::now(),
            next_seq: 1,
        }
    }
}

pub fn load_meta(root: &Path, list: &str) -> Result<ListMeta> {
    let path = paths::list_meta_path(root, list);
    if !path.exists() {
        // Recover from a hand-built or partially-restored list directory:
        // resume numbering past the highest ID on disk.
        let mut meta = ListMeta::new();
        for record in load_raw(root, list)? {
            let seq = TaskRecord::sequence(&record.id);
            if seq != u64::MAX && seq >= meta.next_seq {
                meta.next_seq = seq + 1;
            }
        }
        return Ok(meta);
    }
    let data = std::fs::read_to_string(&path)?;
    Ok(serde_yaml::from_str(&data)?)
}

pub fn save_meta(root: &Path, list: &str, meta: &ListMeta) -> Result<()> {
    let data = serde_yaml::to_string(meta)?;
    io::atomic_write(&paths::list_meta_path(root, list), data.as_bytes())
}

/// Create the list directory and its meta file if absent, idempotent.
pub fn ensure_list(root: &Path, list: &str) -> Result<()> {
    paths::validate_list_id(list)?;
    io::ensure_dir(&paths::list_dir(root, list))?;
    let meta_path = paths::list_meta_path(root, list);
    if !meta_path.exists() {
        save_meta(root, list, &ListMeta::new())?;
    }
    Ok(())
}

/// All list IDs present on disk, sorted.
pub fn lists(root: &Path) -> Result<Vec<String>> {
    paths::ensure_initialized(root)?;
    let dir = paths::lists_dir(root);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            out.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    out.sort();
    Ok(out)
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// Create a task. Allocates the next `T<n>` ID from the list meta counter;
/// the create-new write is the authority on uniqueness, so two processes
/// allocating concurrently can never share an ID (the loser bumps and
/// retries).
pub fn create(root: &Path, list: &str, new: NewTask) -> Result<TaskRecord> {
    paths::ensure_initialized(root)?;
    paths::validate_list_id(list)?;
    if new.subject.trim().is_empty() {
        return Err(DispatchError::InvalidInput(
            "subject must not be empty".to_string(),
        ));
    }

    ensure_list(root, list)?;
    let records = load_raw(root, list)?;

    let mut blocked_by: Vec<String> = Vec::new();
    for dep in &new.blocked_by {
        if !records.iter().any(|r| &r.id == dep) {
            return Err(DispatchError::InvalidInput(format!(
                "blocked_by references unknown task {dep}"
            )));
        }
        if !blocked_by.contains(dep) {
            blocked_by.push(dep.clone());
        }
    }

    let mut meta = load_meta(root, list)?;
    loop {
        let id = format!("T{}", meta.next_seq);
        meta.next_seq += 1;

        let mut record = TaskRecord::new(id.clone(), new.subject.clone());
        record.description = new.description.clone();
        record.active_form = new.active_form.clone();
        record.blocked_by = blocked_by.clone();

        let data = serde_yaml::to_string(&record)?;
        if io::atomic_write_new(&paths::task_path(root, list, &id), data.as_bytes())? {
            save_meta(root, list, &meta)?;
            return Ok(record);
        }
    }
}

/// Apply a partial update as a full-record replace via atomic rename.
///
/// Enforced here, never coerced:
/// - added `blocked_by` edges must reference existing tasks and keep the
///   graph acyclic;
/// - a task with incomplete blockers cannot be (or stay) `in_progress`;
/// - `owner` is present exactly when the task is `in_progress`: clearing it
///   releases the task back to `pending`, leaving `in_progress` clears it.
pub fn update(root: &Path, list: &str, id: &str, patch: TaskPatch) -> Result<TaskRecord> {
    paths::ensure_initialized(root)?;
    paths::validate_list_id(list)?;

    let mut records = load_raw(root, list)?;
    let idx = records
        .iter()
        .position(|r| r.id == id)
        .ok_or_else(|| DispatchError::TaskNotFound(id.to_string()))?;

    if let Some(subject) = &patch.subject {
        if subject.trim().is_empty() {
            return Err(DispatchError::InvalidInput(
                "subject must not be empty".to_string(),
            ));
        }
        records[idx].subject = subject.clone();
    }
    if let Some(active_form) = &patch.active_form {
        records[idx].active_form = Some(active_form.clone());
    }
    if let Some(text) = &patch.append_description {
        let description = &mut records[idx].description;
        *description = Some(match description.take() {
            Some(existing) => format!("{existing}\n{text}"),
            None => text.clone(),
        });
    }

    if !patch.add_blocked_by.is_empty() || !patch.remove_blocked_by.is_empty() {
        for dep in &patch.add_blocked_by {
            if !records.iter().any(|r| &r.id == dep) {
                return Err(DispatchError::UnknownDependency {
                    task: id.to_string(),
                    dependency: dep.clone(),
                });
            }
        }
        let record = &mut records[idx];
        record
            .blocked_by
            .retain(|d| !patch.remove_blocked_by.contains(d));
        for dep in &patch.add_blocked_by {
            if !record.blocked_by.contains(dep) {
                record.blocked_by.push(dep.clone());
            }
        }
        // A new edge may close a loop; reject before anything reaches disk.
        graph::validate(&records)?;
    }

    let mut target = patch.status.unwrap_or(records[idx].status);
    match &patch.owner {
        Some(OwnerPatch::Set(worker)) => {
            if target != TaskStatus::InProgress {
                return Err(DispatchError::InvalidInput(format!(
                    "owner may only be set on an in_progress task, not {target}"
                )));
            }
            records[idx].owner = Some(worker.clone());
        }
        Some(OwnerPatch::Clear) => {
            records[idx].owner = None;
            if target == TaskStatus::InProgress {
                target = TaskStatus::Pending;
            }
        }
        None => {}
    }

    if target == TaskStatus::InProgress {
        let blocked_by = records[idx].blocked_by.clone();
        let incomplete: Vec<String> = blocked_by
            .into_iter()
            .filter(|dep| {
                records
                    .iter()
                    .find(|r| &r.id == dep)
                    .map(|r| r.status != TaskStatus::Completed)
                    .unwrap_or(true)
            })
            .collect();
        if !incomplete.is_empty() {
            return Err(DispatchError::Blocked {
                task: id.to_string(),
                blockers: incomplete.join(", "),
            });
        }
    } else {
        records[idx].owner = None;
    }
    records[idx].status = target;
    records[idx].updated_at = Utc::now();

    let data = serde_yaml::to_string(&records[idx])?;
    io::atomic_write(&paths::task_path(root, list, id), data.as_bytes())?;

    derive_blocks(&mut records);
    Ok(records.swap_remove(idx))
}

/// Load a single task. Unlike `list`, a corrupt record file surfaces its
/// parse error here instead of being skipped.
pub fn get(root: &Path, list: &str, id: &str) -> Result<TaskRecord> {
    paths::ensure_initialized(root)?;
    paths::validate_list_id(list)?;
    if !paths::list_dir(root, list).is_dir() {
        return Err(DispatchError::ListNotFound(list.to_string()));
    }

    let path = paths::task_path(root, list, id);
    if !path.exists() {
        return Err(DispatchError::TaskNotFound(id.to_string()));
    }
    let data = std::fs::read_to_string(&path)?;
    let mut record: TaskRecord = serde_yaml::from_str(&data)?;

    let peers = load_raw(root, list)?;
    record.blocks = peers
        .iter()
        .filter(|r| r.blocked_by.iter().any(|d| d == id))
        .map(|r| r.id.clone())
        .collect();
    record
        .blocks
        .sort_by_key(|peer| TaskRecord::sequence(peer));
    Ok(record)
}

/// All records for a list in creation order, re-read from disk on every call
/// (other processes may have just written). Unreadable record files are
/// skipped with a warning so one corrupt file doesn't abort the whole scan.
pub fn list(root: &Path, list: &str) -> Result<Vec<TaskRecord>> {
    paths::ensure_initialized(root)?;
    paths::validate_list_id(list)?;
    let mut records = load_raw(root, list)?;
    derive_blocks(&mut records);
    Ok(records)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn load_raw(root: &Path, list: &str) -> Result<Vec<TaskRecord>> {
    let dir = paths::list_dir(root, list);
    if !dir.is_dir() {
        return Err(DispatchError::ListNotFound(list.to_string()));
    }

    let mut records = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !entry.file_type()?.is_file()
            || name == paths::META_FILE
            || !name.ends_with(".yaml")
        {
            continue;
        }
        let path = entry.path();
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable task record");
                continue;
            }
        };
        match serde_yaml::from_str::<TaskRecord>(&data) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping malformed task record");
            }
        }
    }
    records.sort_by_key(|r| (TaskRecord::sequence(&r.id), r.id.clone()));
    Ok(records)
}

fn derive_blocks(records: &mut [TaskRecord]) {
    let edges: Vec<(String, String)> = records
        .iter()
        .flat_map(|r| {
            r.blocked_by
                .iter()
                .map(|dep| (dep.clone(), r.id.clone()))
                .collect::<Vec<_>>()
        })
        .collect();
    for record in records.iter_mut() {
        let mut blocks: Vec<String> = edges
            .iter()
            .filter(|(blocker, _)| *blocker == record.id)
            .map(|(_, blocked)| blocked.clone())
            .collect();
        blocks.sort_by_key(|id| TaskRecord::sequence(id));
        record.blocks = blocks;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
