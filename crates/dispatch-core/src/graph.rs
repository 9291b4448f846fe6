//! Readiness and cycle queries over the `blocked_by` edges of a list.
//!
//! The engine is pure: it operates on a slice of records the caller already
//! loaded, so the same functions serve the store's write-time checks and the
//! CLI's read-only queries.

use crate::error::{DispatchError, Result};
use crate::task::TaskRecord;
use crate::types::TaskStatus;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Cycle detection
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Depth-first traversal over `blocked_by` edges. Returns `Cycle` with the
/// offending path when a task transitively blocks itself, and
/// `UnknownDependency` when an edge points outside the list.
pub fn validate(records: &[TaskRecord]) -> Result<()> {
    let by_id: HashMap<&str, &TaskRecord> =
        records.iter().map(|r| (r.id.as_str(), r)).collect();

    for record in records {
        for dep in &record.blocked_by {
            if !by_id.contains_key(dep.as_str()) {
                return Err(DispatchError::UnknownDependency {
                    task: record.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    let mut marks: HashMap<&str, Mark> = records
        .iter()
        .map(|r| (r.id.as_str(), Mark::Unvisited))
        .collect();
    let mut path: Vec<String> = Vec::new();
    for record in records {
        visit(record.id.as_str(), &by_id, &mut marks, &mut path)?;
    }
    Ok(())
}

fn visit<'a>(
    id: &'a str,
    by_id: &HashMap<&'a str, &'a TaskRecord>,
    marks: &mut HashMap<&'a str, Mark>,
    path: &mut Vec<String>,
) -> Result<()> {
    match marks[id] {
        Mark::Done => return Ok(()),
        Mark::OnPath => {
            let start = path.iter().position(|p| p == id).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].to_vec();
            cycle.push(id.to_string());
            return Err(DispatchError::Cycle { path: cycle });
        }
        Mark::Unvisited => {}
    }

    marks.insert(id, Mark::OnPath);
    path.push(id.to_string());
    if let Some(record) = by_id.get(id) {
        for dep in &record.blocked_by {
            visit(dep.as_str(), by_id, marks, path)?;
        }
    }
    path.pop();
    marks.insert(id, Mark::Done);
    Ok(())
}

// ---------------------------------------------------------------------------
// Ready set
// ---------------------------------------------------------------------------

/// Pending tasks whose every blocker is completed, in creation order. This is
/// the sole serialization point for dispatch: a task never appears here (and
/// so is never claimable) while any blocker is incomplete, regardless of
/// owner state. Tie-breaking beyond creation order is the caller's business.
pub fn ready_set(records: &[TaskRecord]) -> Vec<&TaskRecord> {
    let completed: HashSet<&str> = records
        .iter()
        .filter(|r| r.status == TaskStatus::Completed)
        .map(|r| r.id.as_str())
        .collect();

    records
        .iter()
        .filter(|r| {
            r.status == TaskStatus::Pending
                && r.blocked_by.iter().all(|dep| completed.contains(dep.as_str()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Conflict heuristic
// ---------------------------------------------------------------------------

/// Advisory signal that two queued tasks may touch the same file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileConflict {
    pub task_a: String,
    pub task_b: String,
    pub path: String,
}

static PATH_TOKEN_RE: OnceLock<Regex> = OnceLock::new();

fn path_token_re() -> &'static Regex {
    PATH_TOKEN_RE.get_or_init(|| Regex::new(r"[\w.-]+(?:/[\w.-]+)+").unwrap())
}

/// Flag pairs of unclaimed pending tasks whose subject or description mention
/// the same file-path-shaped token, to bias dispatch toward serializing them.
/// Purely advisory: nothing stops a caller from claiming both.
pub fn conflict_check(records: &[TaskRecord]) -> Vec<FileConflict> {
    let mut by_token: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for record in records {
        if record.status != TaskStatus::Pending || record.owner.is_some() {
            continue;
        }
        let mut text = record.subject.clone();
        if let Some(description) = &record.description {
            text.push('\n');
            text.push_str(description);
        }
        let mut seen: HashSet<String> = HashSet::new();
        for token in path_token_re().find_iter(&text) {
            if seen.insert(token.as_str().to_string()) {
                by_token
                    .entry(token.as_str().to_string())
                    .or_default()
                    .push(record.id.as_str());
            }
        }
    }

    let mut conflicts = Vec::new();
    for (token, ids) in by_token {
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                conflicts.push(FileConflict {
                    task_a: a.to_string(),
                    task_b: b.to_string(),
                    path: token.clone(),
                });
            }
        }
    }
    conflicts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, blocked_by: &[&str]) -> TaskRecord {
        let mut record = TaskRecord::new(id, format!("Task {id}"));
        record.blocked_by = blocked_by.iter().map(|s| s.to_string()).collect();
        record
    }

    #[test]
    fn empty_and_linear_graphs_validate() {
        validate(&[]).unwrap();
        let records = vec![task("T1", &[]), task("T2", &["T1"]), task("T3", &["T2"])];
        validate(&records).unwrap();
    }

    #[test]
    fn two_node_cycle_reports_path() {
        let records = vec![task("T1", &["T2"]), task("T2", &["T1"])];
        let err = validate(&records).unwrap_err();
        match err {
            DispatchError::Cycle { path } => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 3);
            }
            other => panic!("expected cycle, got {other}"),
        }
    }

    #[test]
    fn self_cycle_detected() {
        let records = vec![task("T1", &["T1"])];
        let err = validate(&records).unwrap_err();
        assert!(matches!(err, DispatchError::Cycle { path } if path == ["T1", "T1"]));
    }

    #[test]
    fn unknown_dependency_detected() {
        let records = vec![task("T1", &["T9"])];
        let err = validate(&records).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownDependency { .. }));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let records = vec![
            task("T1", &[]),
            task("T2", &["T1"]),
            task("T3", &["T1"]),
            task("T4", &["T2", "T3"]),
        ];
        validate(&records).unwrap();
    }

    // Deterministic linear-congruential generator, so the random-graph
    // property tests are reproducible without extra dev-dependencies.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            self.0 >> 33
        }

        fn below(&mut self, n: u64) -> u64 {
            self.next() % n
        }
    }

    fn random_dag(rng: &mut Lcg, n: u64) -> Vec<TaskRecord> {
        // Edges only point from later tasks to earlier ones, so the graph is
        // acyclic by construction.
        (1..=n)
            .map(|i| {
                let mut deps = Vec::new();
                for j in 1..i {
                    if rng.below(3) == 0 {
                        deps.push(format!("T{j}"));
                    }
                }
                let mut record = TaskRecord::new(format!("T{i}"), format!("Task {i}"));
                record.blocked_by = deps;
                record
            })
            .collect()
    }

    #[test]
    fn random_dags_validate_clean() {
        let mut rng = Lcg(42);
        for _ in 0..50 {
            let records = random_dag(&mut rng, 12);
            validate(&records).unwrap();
        }
    }

    #[test]
    fn random_dags_with_injected_back_edge_fail() {
        let mut rng = Lcg(7);
        for _ in 0..50 {
            let mut records = random_dag(&mut rng, 12);
            // Close a loop: make an early task depend on a later one that
            // (transitively) depends on it.
            let from = rng.below(6) + 1;
            let to = from + rng.below(6) + 1;
            records[(to - 1) as usize]
                .blocked_by
                .push(format!("T{from}"));
            records[(from - 1) as usize].blocked_by = vec![format!("T{to}")];
            let err = validate(&records).unwrap_err();
            assert!(matches!(err, DispatchError::Cycle { .. }));
        }
    }

    #[test]
    fn ready_set_requires_completed_blockers() {
        let mut records = vec![task("T1", &[]), task("T2", &["T1"])];
        let ready: Vec<&str> = ready_set(&records).iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ready, ["T1"]);

        records[0].status = TaskStatus::InProgress;
        assert!(ready_set(&records).is_empty());

        records[0].status = TaskStatus::Completed;
        let ready: Vec<&str> = ready_set(&records).iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ready, ["T2"]);
    }

    #[test]
    fn ready_set_never_contains_blocked_tasks() {
        // Random status churn; the invariant must hold at every step.
        let mut rng = Lcg(99);
        let mut records = random_dag(&mut rng, 10);
        for _ in 0..200 {
            let i = rng.below(10) as usize;
            records[i].status = match rng.below(3) {
                0 => TaskStatus::Pending,
                1 => TaskStatus::InProgress,
                _ => TaskStatus::Completed,
            };
            let completed: HashSet<&str> = records
                .iter()
                .filter(|r| r.status == TaskStatus::Completed)
                .map(|r| r.id.as_str())
                .collect();
            for ready in ready_set(&records) {
                assert_eq!(ready.status, TaskStatus::Pending);
                for dep in &ready.blocked_by {
                    assert!(completed.contains(dep.as_str()));
                }
            }
        }
    }

    #[test]
    fn conflict_check_flags_shared_path_token() {
        let mut a = task("T1", &[]);
        a.description = Some("touch src/auth/session.rs and tests".to_string());
        let mut b = task("T2", &[]);
        b.description = Some("refactor src/auth/session.rs".to_string());
        let mut c = task("T3", &[]);
        c.description = Some("unrelated docs/readme.md".to_string());

        let conflicts = conflict_check(&[a, b, c]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].task_a, "T1");
        assert_eq!(conflicts[0].task_b, "T2");
        assert_eq!(conflicts[0].path, "src/auth/session.rs");
    }

    #[test]
    fn conflict_check_ignores_claimed_and_done_tasks() {
        let mut a = task("T1", &[]);
        a.description = Some("edit src/main.rs".to_string());
        let mut b = task("T2", &[]);
        b.description = Some("also edit src/main.rs".to_string());
        b.status = TaskStatus::InProgress;
        b.owner = Some("w1".to_string());

        assert!(conflict_check(&[a, b]).is_empty());
    }
}
