//! Point-in-time capture and diffing of a list.
//!
//! Snapshots are reduced, immutable copies used only for comparison, never
//! for mutation or restore (that's the archive's job). A `latest` pointer
//! file names the most recent snapshot so incremental diffs don't have to
//! scan the snapshot directory.

use crate::error::{DispatchError, Result};
use crate::io;
use crate::paths;
use crate::store;
use crate::task::TaskRecord;
use crate::types::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub id: String,
    pub subject: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<String>,
}

impl From<&TaskRecord> for SnapshotEntry {
    fn from(task: &TaskRecord) -> Self {
        Self {
            id: task.id.clone(),
            subject: task.subject.clone(),
            status: task.status,
            owner: task.owner.clone(),
            blocked_by: task.blocked_by.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub list: String,
    pub taken_at: DateTime<Utc>,
    pub tasks: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Capture the live list in memory without persisting anything.
    pub fn capture(root: &Path, list: &str) -> Result<Self> {
        let records = store::list(root, list)?;
        Ok(Self {
            list: list.to_string(),
            taken_at: Utc::now(),
            tasks: records.iter().map(SnapshotEntry::from).collect(),
        })
    }
}

/// Capture the list, persist it as an immutable file, and point `latest` at
/// it. Returns the snapshot file name alongside the snapshot.
pub fn take(root: &Path, list: &str) -> Result<(String, Snapshot)> {
    let snapshot = Snapshot::capture(root, list)?;
    let data = serde_yaml::to_string(&snapshot)?;

    let stamp = snapshot.taken_at.format("%Y%m%d-%H%M%S");
    let mut name = format!("{stamp}.yaml");
    let mut suffix = 2;
    // Two captures in the same second get distinct names; the create-new
    // write arbitrates.
    while !io::atomic_write_new(&paths::snapshot_path(root, list, &name), data.as_bytes())? {
        name = format!("{stamp}-{suffix}.yaml");
        suffix += 1;
    }

    io::atomic_write(&paths::latest_snapshot_path(root, list), name.as_bytes())?;
    Ok((name, snapshot))
}

pub fn load(root: &Path, list: &str, name: &str) -> Result<Snapshot> {
    let path = paths::snapshot_path(root, list, name);
    if !path.exists() {
        return Err(DispatchError::SnapshotNotFound(format!("{list}/{name}")));
    }
    let data = std::fs::read_to_string(&path)?;
    Ok(serde_yaml::from_str(&data)?)
}

/// Name recorded in the `latest` pointer, if any snapshot was ever taken.
pub fn latest_name(root: &Path, list: &str) -> Result<Option<String>> {
    let path = paths::latest_snapshot_path(root, list);
    if !path.exists() {
        return Ok(None);
    }
    let name = std::fs::read_to_string(&path)?.trim().to_string();
    Ok(Some(name))
}

pub fn latest(root: &Path, list: &str) -> Result<Snapshot> {
    let name = latest_name(root, list)?
        .ok_or_else(|| DispatchError::SnapshotNotFound(format!("{list}/latest")))?;
    load(root, list, &name)
}

/// All snapshot names for a list, oldest first.
pub fn list_snapshots(root: &Path, list: &str) -> Result<Vec<String>> {
    let dir = paths::snapshot_dir(root, list);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_file() && name.ends_with(".yaml") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDelta {
    pub field: String,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDelta {
    pub id: String,
    pub fields: Vec<FieldDelta>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<TaskDelta>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

fn render_owner(owner: &Option<String>) -> String {
    owner.clone().unwrap_or_else(|| "(none)".to_string())
}

fn field_delta(field: &str, before: String, after: String) -> Option<FieldDelta> {
    (before != after).then(|| FieldDelta {
        field: field.to_string(),
        before,
        after,
    })
}

/// Compare two snapshots keyed by task ID. Pure function of its inputs:
/// identical snapshots always produce an empty diff, which makes diffs safe
/// to replay in tests and scripts.
pub fn diff(prev: &Snapshot, curr: &Snapshot) -> SnapshotDiff {
    let before: HashMap<&str, &SnapshotEntry> =
        prev.tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    let after: HashMap<&str, &SnapshotEntry> =
        curr.tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut added: Vec<String> = curr
        .tasks
        .iter()
        .filter(|t| !before.contains_key(t.id.as_str()))
        .map(|t| t.id.clone())
        .collect();
    added.sort_by_key(|id| (TaskRecord::sequence(id), id.clone()));

    let mut removed: Vec<String> = prev
        .tasks
        .iter()
        .filter(|t| !after.contains_key(t.id.as_str()))
        .map(|t| t.id.clone())
        .collect();
    removed.sort_by_key(|id| (TaskRecord::sequence(id), id.clone()));

    let mut changed: Vec<TaskDelta> = Vec::new();
    for old in &prev.tasks {
        let Some(new) = after.get(old.id.as_str()) else {
            continue;
        };
        let fields: Vec<FieldDelta> = [
            field_delta("status", old.status.to_string(), new.status.to_string()),
            field_delta("owner", render_owner(&old.owner), render_owner(&new.owner)),
            field_delta("subject", old.subject.clone(), new.subject.clone()),
            field_delta(
                "blocked_by",
                old.blocked_by.join(","),
                new.blocked_by.join(","),
            ),
        ]
        .into_iter()
        .flatten()
        .collect();

        if !fields.is_empty() {
            changed.push(TaskDelta {
                id: old.id.clone(),
                fields,
            });
        }
    }
    changed.sort_by_key(|d| (TaskRecord::sequence(&d.id), d.id.clone()));

    SnapshotDiff {
        added,
        removed,
        changed,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
