//! Retirement of whole lists into cold storage, and the way back.
//!
//! Archival copies record files byte-for-byte (even ones the store can no
//! longer parse), writes a manifest, then clears the live directory. The
//! list's meta file stays behind so the ID counter keeps counting: a task
//! ID is never reused, even across archive and restore.

use crate::error::{DispatchError, Result};
use crate::io;
use crate::paths;
use crate::store;
use crate::task::TaskRecord;
use crate::types::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl StatusCounts {
    fn tally(records: &[TaskRecord]) -> Self {
        let mut counts = Self::default();
        for record in records {
            match record.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Completed => counts.completed += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub list: String,
    /// Archive directory name, `None` when the list was empty and nothing
    /// was moved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub archived_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub counts: StatusCounts,
    pub task_count: usize,
}

// ---------------------------------------------------------------------------
// Archive / restore
// ---------------------------------------------------------------------------

/// Move every task record of `list` into `.dispatch/archives/<list>-<stamp>/`
/// with a manifest, then clear the live directory. Re-invoking on an empty
/// list is a no-op that reports zero counts instead of an error.
pub fn archive(root: &Path, list: &str, reason: Option<&str>) -> Result<ArchiveManifest> {
    let records = store::list(root, list)?;
    let archived_at = Utc::now();
    let counts = StatusCounts::tally(&records);

    if records.is_empty() {
        return Ok(ArchiveManifest {
            list: list.to_string(),
            name: None,
            archived_at,
            reason: reason.map(str::to_string),
            counts,
            task_count: 0,
        });
    }

    let stamp = archived_at.format("%Y%m%d-%H%M%S");
    let mut name = format!("{list}-{stamp}");
    let mut suffix = 2;
    while paths::archive_dir(root, &name).exists() {
        name = format!("{list}-{stamp}-{suffix}");
        suffix += 1;
    }
    let archive_dir = paths::archive_dir(root, &name);
    io::ensure_dir(&archive_dir)?;

    // Raw byte copy: a record the store skipped as malformed still gets
    // preserved, it just doesn't count toward the manifest tallies.
    let mut moved = Vec::new();
    for entry in std::fs::read_dir(paths::list_dir(root, list))? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !entry.file_type()?.is_file()
            || file_name == paths::META_FILE
            || !file_name.ends_with(".yaml")
        {
            continue;
        }
        std::fs::copy(entry.path(), archive_dir.join(&file_name))?;
        moved.push(entry.path());
    }

    let manifest = ArchiveManifest {
        list: list.to_string(),
        name: Some(name.clone()),
        archived_at,
        reason: reason.map(str::to_string),
        counts,
        task_count: records.len(),
    };
    let data = serde_yaml::to_string(&manifest)?;
    io::atomic_write(&paths::archive_manifest_path(root, &name), data.as_bytes())?;

    // Clear live records only after the archive copy and manifest landed.
    for path in moved {
        if let Err(e) = std::fs::remove_file(&path) {
            warn!(path = %path.display(), error = %e, "failed to clear archived record");
        }
    }

    Ok(manifest)
}

pub fn load_manifest(root: &Path, name: &str) -> Result<ArchiveManifest> {
    let path = paths::archive_manifest_path(root, name);
    if !path.exists() {
        return Err(DispatchError::ArchiveNotFound(name.to_string()));
    }
    let data = std::fs::read_to_string(&path)?;
    Ok(serde_yaml::from_str(&data)?)
}

/// Copy archived records back into the live list directory (recreated if
/// absent) and advance the ID counter past the highest restored ID. Returns
/// the list ID the records went back to.
pub fn restore(root: &Path, name: &str) -> Result<String> {
    paths::ensure_initialized(root)?;
    let manifest = load_manifest(root, name)?;
    let list = manifest.list;

    store::ensure_list(root, &list)?;
    let archive_dir = paths::archive_dir(root, name);
    let mut max_seq: u64 = 0;
    for entry in std::fs::read_dir(&archive_dir)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !entry.file_type()?.is_file()
            || file_name == paths::MANIFEST_FILE
            || !file_name.ends_with(".yaml")
        {
            continue;
        }
        std::fs::copy(entry.path(), paths::list_dir(root, &list).join(&file_name))?;
        if let Some(stem) = file_name.strip_suffix(".yaml") {
            let seq = TaskRecord::sequence(stem);
            if seq != u64::MAX {
                max_seq = max_seq.max(seq);
            }
        }
    }

    let mut meta = store::load_meta(root, &list)?;
    if meta.next_seq <= max_seq {
        meta.next_seq = max_seq + 1;
        store::save_meta(root, &list, &meta)?;
    }

    Ok(list)
}

/// All archive names, sorted.
pub fn archives(root: &Path) -> Result<Vec<String>> {
    paths::ensure_initialized(root)?;
    let dir = paths::archives_dir(root);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
