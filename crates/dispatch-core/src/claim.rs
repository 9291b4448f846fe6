//! Last-write-wins claiming: check, claim, verify.
//!
//! N independent worker processes agree on at most one owner per task with no
//! lock server. The write in step two is an ordinary store update; two racing
//! workers may both believe they own the task for a moment, but the re-read
//! in step three is authoritative and cheap. Losing is expected, recoverable
//! control flow, not an error: losers pick a different ready task.

use crate::error::{DispatchError, Result};
use crate::graph;
use crate::store;
use crate::task::{OwnerPatch, TaskPatch, TaskRecord};
use crate::types::TaskStatus;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    Claimed(TaskRecord),
    /// Another worker won the race; `observed` is the owner the verify
    /// read saw.
    Lost { observed: Option<String> },
}

/// Claim `id` for `worker`. The task must be ready (pending, all blockers
/// completed) and unclaimed; an already-claimed task reports `Lost` without
/// writing. No retries happen here; retry policy belongs to the caller.
pub fn claim(root: &Path, list: &str, id: &str, worker: &str) -> Result<ClaimOutcome> {
    // Check: only unclaimed ready tasks are worth the write.
    let records = store::list(root, list)?;
    let task = records
        .iter()
        .find(|r| r.id == id)
        .ok_or_else(|| DispatchError::TaskNotFound(id.to_string()))?;
    if task.status == TaskStatus::Completed {
        return Err(DispatchError::InvalidInput(format!(
            "task {id} is already completed"
        )));
    }
    if let Some(observed) = &task.owner {
        return Ok(ClaimOutcome::Lost {
            observed: Some(observed.clone()),
        });
    }

    write_claim(root, list, id, worker)?;
    verify(root, list, id, worker)
}

/// Step two: the claim write. A blocked task fails here with `Blocked`.
fn write_claim(root: &Path, list: &str, id: &str, worker: &str) -> Result<()> {
    store::update(
        root,
        list,
        id,
        TaskPatch {
            status: Some(TaskStatus::InProgress),
            owner: Some(OwnerPatch::Set(worker.to_string())),
            ..Default::default()
        },
    )?;
    Ok(())
}

/// Step three: re-read and compare. Whatever owner this read observes wins.
fn verify(root: &Path, list: &str, id: &str, worker: &str) -> Result<ClaimOutcome> {
    let seen = store::get(root, list, id)?;
    match &seen.owner {
        Some(owner) if owner == worker => {
            debug!(task = id, worker, "claim verified");
            Ok(ClaimOutcome::Claimed(seen))
        }
        observed => {
            debug!(task = id, worker, observed = ?observed, "claim lost");
            Ok(ClaimOutcome::Lost {
                observed: observed.clone(),
            })
        }
    }
}

/// Claim the first unclaimed ready task in creation order, moving on to the
/// next candidate when a race is lost. Returns `None` when nothing is ready.
pub fn claim_next(root: &Path, list: &str, worker: &str) -> Result<Option<TaskRecord>> {
    let records = store::list(root, list)?;
    let candidates: Vec<String> = graph::ready_set(&records)
        .into_iter()
        .filter(|r| r.owner.is_none())
        .map(|r| r.id.clone())
        .collect();

    for id in candidates {
        match claim(root, list, &id, worker) {
            Ok(ClaimOutcome::Claimed(task)) => return Ok(Some(task)),
            Ok(ClaimOutcome::Lost { .. }) => continue,
            // Another worker completed a blocker's reversal or claimed it
            // between our read and the write; not ours, move on.
            Err(DispatchError::Blocked { .. }) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

/// Abandon a claim: clear the owner and return the task to pending. Without
/// this, an abandoned task stays falsely claimed until the staleness
/// detector or a human intervenes.
pub fn release(root: &Path, list: &str, id: &str) -> Result<TaskRecord> {
    store::update(
        root,
        list,
        id,
        TaskPatch {
            owner: Some(OwnerPatch::Clear),
            ..Default::default()
        },
    )
}

/// Mark a task completed, clearing its owner.
pub fn complete(root: &Path, list: &str, id: &str) -> Result<TaskRecord> {
    store::update(
        root,
        list,
        id,
        TaskPatch {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        },
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::NewTask;
    use tempfile::TempDir;

    fn init_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".dispatch/lists")).unwrap();
        dir
    }

    fn seed(dir: &TempDir, subject: &str, blocked_by: &[&str]) -> TaskRecord {
        let mut new = NewTask::new(subject);
        new.blocked_by = blocked_by.iter().map(|s| s.to_string()).collect();
        store::create(dir.path(), "sprint", new).unwrap()
    }

    #[test]
    fn uncontended_claim_succeeds() {
        let dir = init_dir();
        let task = seed(&dir, "X", &[]);

        match claim(dir.path(), "sprint", &task.id, "w1").unwrap() {
            ClaimOutcome::Claimed(claimed) => {
                assert_eq!(claimed.owner.as_deref(), Some("w1"));
                assert_eq!(claimed.status, TaskStatus::InProgress);
            }
            ClaimOutcome::Lost { .. } => panic!("uncontended claim lost"),
        }
    }

    #[test]
    fn claim_of_already_claimed_task_loses_without_writing() {
        let dir = init_dir();
        let task = seed(&dir, "X", &[]);
        claim(dir.path(), "sprint", &task.id, "w1").unwrap();

        match claim(dir.path(), "sprint", &task.id, "w2").unwrap() {
            ClaimOutcome::Lost { observed } => assert_eq!(observed.as_deref(), Some("w1")),
            ClaimOutcome::Claimed(_) => panic!("steal should not succeed"),
        }
        let current = store::get(dir.path(), "sprint", &task.id).unwrap();
        assert_eq!(current.owner.as_deref(), Some("w1"));
    }

    #[test]
    fn interleaved_claims_leave_exactly_one_owner() {
        let dir = init_dir();
        let task = seed(&dir, "X", &[]);

        // Both workers pass the check and write before either verifies.
        write_claim(dir.path(), "sprint", &task.id, "w1").unwrap();
        write_claim(dir.path(), "sprint", &task.id, "w2").unwrap();

        // w1's verify observes the foreign owner and must not proceed.
        match verify(dir.path(), "sprint", &task.id, "w1").unwrap() {
            ClaimOutcome::Lost { observed } => assert_eq!(observed.as_deref(), Some("w2")),
            ClaimOutcome::Claimed(_) => panic!("w1 must lose"),
        }
        match verify(dir.path(), "sprint", &task.id, "w2").unwrap() {
            ClaimOutcome::Claimed(claimed) => assert_eq!(claimed.owner.as_deref(), Some("w2")),
            ClaimOutcome::Lost { .. } => panic!("w2 must win"),
        }

        let current = store::get(dir.path(), "sprint", &task.id).unwrap();
        assert_eq!(current.owner.as_deref(), Some("w2"));
    }

    #[test]
    fn blocked_task_cannot_be_claimed() {
        let dir = init_dir();
        let a = seed(&dir, "A", &[]);
        let b = seed(&dir, "B", &[&a.id]);

        let err = claim(dir.path(), "sprint", &b.id, "w1").unwrap_err();
        assert!(matches!(err, DispatchError::Blocked { .. }));
    }

    #[test]
    fn claim_next_walks_ready_set_in_creation_order() {
        let dir = init_dir();
        let a = seed(&dir, "A", &[]);
        let b = seed(&dir, "B", &[]);
        seed(&dir, "C", &[&a.id]);

        let first = claim_next(dir.path(), "sprint", "w1").unwrap().unwrap();
        assert_eq!(first.id, a.id);
        let second = claim_next(dir.path(), "sprint", "w2").unwrap().unwrap();
        assert_eq!(second.id, b.id);
        // C is blocked by A, which is in progress, so nothing is left.
        assert!(claim_next(dir.path(), "sprint", "w3").unwrap().is_none());
    }

    #[test]
    fn release_returns_task_to_pending() {
        let dir = init_dir();
        let task = seed(&dir, "X", &[]);
        claim(dir.path(), "sprint", &task.id, "w1").unwrap();

        let released = release(dir.path(), "sprint", &task.id).unwrap();
        assert_eq!(released.status, TaskStatus::Pending);
        assert!(released.owner.is_none());

        // Claimable again after release.
        match claim(dir.path(), "sprint", &task.id, "w2").unwrap() {
            ClaimOutcome::Claimed(claimed) => assert_eq!(claimed.owner.as_deref(), Some("w2")),
            ClaimOutcome::Lost { .. } => panic!("released task must be claimable"),
        }
    }

    #[test]
    fn dependency_chain_completes_in_order() {
        let dir = init_dir();
        let a = seed(&dir, "A", &[]);
        let b = seed(&dir, "B", &[&a.id]);

        let records = store::list(dir.path(), "sprint").unwrap();
        let ready: Vec<&str> = graph::ready_set(&records).iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ready, [a.id.as_str()]);

        claim(dir.path(), "sprint", &a.id, "w1").unwrap();
        complete(dir.path(), "sprint", &a.id).unwrap();

        let records = store::list(dir.path(), "sprint").unwrap();
        let ready: Vec<&str> = graph::ready_set(&records).iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ready, [b.id.as_str()]);

        claim(dir.path(), "sprint", &b.id, "w1").unwrap();
        let done = complete(dir.path(), "sprint", &b.id).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.owner.is_none());
    }

    #[test]
    fn completing_a_completed_task_fails_claim() {
        let dir = init_dir();
        let task = seed(&dir, "X", &[]);
        claim(dir.path(), "sprint", &task.id, "w1").unwrap();
        complete(dir.path(), "sprint", &task.id).unwrap();

        let err = claim(dir.path(), "sprint", &task.id, "w2").unwrap_err();
        assert!(matches!(err, DispatchError::InvalidInput(_)));
    }
}
