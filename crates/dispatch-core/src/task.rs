use crate::types::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TaskRecord
// ---------------------------------------------------------------------------

/// One persisted task. Serialized as a single YAML file under the list
/// directory; readers in other processes see either the old or the new
/// version of the file, never a partial write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_form: Option<String>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<String>,
    /// Inverse of `blocked_by`, recomputed from the whole list on every read.
    /// Never persisted, so it cannot drift out of sync with `blocked_by`.
    #[serde(default, skip_deserializing, skip_serializing)]
    pub blocks: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(id: impl Into<String>, subject: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            subject: subject.into(),
            description: None,
            active_form: None,
            status: TaskStatus::Pending,
            owner: None,
            blocked_by: Vec::new(),
            blocks: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Numeric part of a `T<n>` task ID, used for stable creation-order
    /// sorting. IDs that don't match the scheme sort last.
    pub fn sequence(id: &str) -> u64 {
        id.strip_prefix('T')
            .and_then(|n| n.parse().ok())
            .unwrap_or(u64::MAX)
    }
}

// ---------------------------------------------------------------------------
// NewTask / TaskPatch
// ---------------------------------------------------------------------------

/// Caller-supplied fields for task creation. Everything else (ID, status,
/// timestamps) is assigned by the store.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub subject: String,
    pub description: Option<String>,
    pub active_form: Option<String>,
    pub blocked_by: Vec<String>,
}

impl NewTask {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Default::default()
        }
    }
}

/// Owner changes are three-valued: leave alone, set, or clear. Clearing the
/// owner of an in-progress task returns it to pending (release semantics).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerPatch {
    Set(String),
    Clear,
}

/// Partial update applied by `store::update`. The write itself is a
/// full-record replace; the patch only describes which fields change.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub subject: Option<String>,
    pub active_form: Option<String>,
    pub status: Option<TaskStatus>,
    pub owner: Option<OwnerPatch>,
    pub append_description: Option<String>,
    pub add_blocked_by: Vec<String>,
    pub remove_blocked_by: Vec<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_defaults_to_pending() {
        let task = TaskRecord::new("T1", "Write tests");
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.owner.is_none());
        assert!(task.blocked_by.is_empty());
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn sequence_parses_task_ids() {
        assert_eq!(TaskRecord::sequence("T1"), 1);
        assert_eq!(TaskRecord::sequence("T42"), 42);
        assert_eq!(TaskRecord::sequence("bogus"), u64::MAX);
    }

    #[test]
    fn blocks_is_not_persisted() {
        let mut task = TaskRecord::new("T1", "Subject");
        task.blocks = vec!["T2".to_string()];
        let yaml = serde_yaml::to_string(&task).unwrap();
        // `blocks` only exists as a derived view; the stored file must not
        // contain it even when populated in memory.
        assert!(!yaml.contains("blocks"));

        let parsed: TaskRecord = serde_yaml::from_str(&yaml).unwrap();
        assert!(parsed.blocks.is_empty());
    }

    #[test]
    fn optional_fields_skipped_when_absent() {
        let task = TaskRecord::new("T1", "Subject");
        let yaml = serde_yaml::to_string(&task).unwrap();
        assert!(!yaml.contains("description"));
        assert!(!yaml.contains("owner"));
        assert!(!yaml.contains("blocked_by"));
    }
}
