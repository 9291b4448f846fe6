//! Stall detection over poll cycles.
//!
//! The detector only counts; it never mutates the store and never escalates.
//! A supervisor reads the reports and decides what to do (follow-up task,
//! notification, forced release).
//!
//! A task is "unchanged" for a cycle when its comparable tuple
//! (status, owner, subject, blocked_by) is identical to the previous cycle's
//! observation AND the task is in progress. Pending tasks waiting on
//! dependencies are never flagged. Comparison is by field content only;
//! filesystem mtimes play no part.

use crate::task::TaskRecord;
use crate::types::TaskStatus;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Unchanged-cycle counts at which a task becomes suspected, then flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleThresholds {
    pub suspect_after: u32,
    pub flag_after: u32,
}

impl StaleThresholds {
    pub fn new(suspect_after: u32, flag_after: u32) -> Self {
        Self {
            suspect_after,
            flag_after,
        }
    }

    /// Quick tasks: flag after 2 unchanged cycles.
    pub fn simple() -> Self {
        Self::new(1, 2)
    }

    /// Typical tasks: flag after 4 unchanged cycles.
    pub fn complex() -> Self {
        Self::new(2, 4)
    }

    /// Explicitly long-running tasks: flag after 8 unchanged cycles.
    pub fn long_running() -> Self {
        Self::new(4, 8)
    }
}

impl Default for StaleThresholds {
    fn default() -> Self {
        Self::complex()
    }
}

impl From<&crate::config::StaleConfig> for StaleThresholds {
    fn from(config: &crate::config::StaleConfig) -> Self {
        Self::new(config.suspect_after, config.flag_after)
    }
}

// ---------------------------------------------------------------------------
// States and reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleState {
    Fresh,
    Suspected,
    Flagged,
}

impl std::fmt::Display for StaleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StaleState::Fresh => "fresh",
            StaleState::Suspected => "suspected",
            StaleState::Flagged => "flagged",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StaleReport {
    pub task_id: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub state: StaleState,
    pub unchanged_cycles: u32,
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    status: TaskStatus,
    owner: Option<String>,
    subject: String,
    blocked_by: Vec<String>,
}

impl Fingerprint {
    fn of(task: &TaskRecord) -> Self {
        Self {
            status: task.status,
            owner: task.owner.clone(),
            subject: task.subject.clone(),
            blocked_by: task.blocked_by.clone(),
        }
    }
}

struct Observation {
    fingerprint: Fingerprint,
    unchanged_cycles: u32,
}

/// Counts consecutive unchanged poll cycles per in-progress task. Feed it one
/// `observe` call per cycle; any change in the comparable tuple resets that
/// task's counter to zero immediately.
pub struct StalenessDetector {
    thresholds: StaleThresholds,
    observed: HashMap<String, Observation>,
}

impl StalenessDetector {
    pub fn new(thresholds: StaleThresholds) -> Self {
        Self {
            thresholds,
            observed: HashMap::new(),
        }
    }

    /// Record one poll cycle and return every task that is currently
    /// suspected or flagged. The first sighting of a task is its baseline
    /// and counts as zero unchanged cycles.
    pub fn observe(&mut self, records: &[TaskRecord]) -> Vec<StaleReport> {
        let mut reports = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for task in records {
            seen.insert(task.id.as_str());
            let fingerprint = Fingerprint::of(task);

            match self.observed.get_mut(&task.id) {
                Some(entry)
                    if entry.fingerprint == fingerprint
                        && task.status == TaskStatus::InProgress =>
                {
                    entry.unchanged_cycles += 1;
                }
                Some(entry) => {
                    entry.fingerprint = fingerprint;
                    entry.unchanged_cycles = 0;
                }
                None => {
                    self.observed.insert(
                        task.id.clone(),
                        Observation {
                            fingerprint,
                            unchanged_cycles: 0,
                        },
                    );
                }
            }

            let entry = &self.observed[&task.id];
            let state = self.state_for(entry.unchanged_cycles, task.status);
            if state != StaleState::Fresh {
                reports.push(StaleReport {
                    task_id: task.id.clone(),
                    subject: task.subject.clone(),
                    owner: task.owner.clone(),
                    state,
                    unchanged_cycles: entry.unchanged_cycles,
                });
            }
        }

        // Forget tasks that left the list (archived or restored elsewhere).
        self.observed.retain(|id, _| seen.contains(id.as_str()));
        reports
    }

    fn state_for(&self, unchanged_cycles: u32, status: TaskStatus) -> StaleState {
        if status != TaskStatus::InProgress {
            return StaleState::Fresh;
        }
        if unchanged_cycles >= self.thresholds.flag_after {
            StaleState::Flagged
        } else if unchanged_cycles >= self.thresholds.suspect_after {
            StaleState::Suspected
        } else {
            StaleState::Fresh
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn running(id: &str, owner: &str) -> TaskRecord {
        let mut task = TaskRecord::new(id, format!("Task {id}"));
        task.status = TaskStatus::InProgress;
        task.owner = Some(owner.to_string());
        task
    }

    fn state_of(reports: &[StaleReport], id: &str) -> Option<StaleState> {
        reports.iter().find(|r| r.task_id == id).map(|r| r.state)
    }

    #[test]
    fn flags_on_exactly_the_configured_cycle() {
        // Threshold 2: three identical polls flag on the 2nd unchanged
        // cycle, which is the third poll: the first only establishes the baseline.
        let mut detector = StalenessDetector::new(StaleThresholds::new(1, 2));
        let tasks = vec![running("T1", "w1")];

        let reports = detector.observe(&tasks);
        assert!(state_of(&reports, "T1").is_none());

        let reports = detector.observe(&tasks);
        assert_eq!(state_of(&reports, "T1"), Some(StaleState::Suspected));

        let reports = detector.observe(&tasks);
        assert_eq!(state_of(&reports, "T1"), Some(StaleState::Flagged));
    }

    #[test]
    fn pending_tasks_are_never_flagged() {
        let mut detector = StalenessDetector::new(StaleThresholds::new(1, 1));
        let task = TaskRecord::new("T1", "Waiting on deps");
        let tasks = vec![task];
        for _ in 0..5 {
            assert!(detector.observe(&tasks).is_empty());
        }
    }

    #[test]
    fn any_change_resets_the_counter() {
        let mut detector = StalenessDetector::new(StaleThresholds::new(1, 2));
        let mut tasks = vec![running("T1", "w1")];

        detector.observe(&tasks);
        detector.observe(&tasks);
        // Owner change resets the count; the next cycle starts over.
        tasks[0].owner = Some("w2".to_string());
        let reports = detector.observe(&tasks);
        assert!(state_of(&reports, "T1").is_none());

        let reports = detector.observe(&tasks);
        assert_eq!(state_of(&reports, "T1"), Some(StaleState::Suspected));
    }

    #[test]
    fn leaving_in_progress_resets_and_unflags() {
        let mut detector = StalenessDetector::new(StaleThresholds::new(1, 2));
        let mut tasks = vec![running("T1", "w1")];
        for _ in 0..3 {
            detector.observe(&tasks);
        }
        assert_eq!(
            state_of(&detector.observe(&tasks), "T1"),
            Some(StaleState::Flagged)
        );

        tasks[0].status = TaskStatus::Completed;
        tasks[0].owner = None;
        assert!(detector.observe(&tasks).is_empty());
    }

    #[test]
    fn removed_tasks_are_forgotten() {
        let mut detector = StalenessDetector::new(StaleThresholds::new(1, 2));
        let tasks = vec![running("T1", "w1")];
        detector.observe(&tasks);
        detector.observe(&tasks);

        // List archived out from under the detector.
        detector.observe(&[]);

        // A task reappearing under the same ID starts from a fresh baseline.
        let reports = detector.observe(&tasks);
        assert!(state_of(&reports, "T1").is_none());
    }

    #[test]
    fn default_thresholds_suspect_then_flag() {
        let mut detector = StalenessDetector::new(StaleThresholds::default());
        let tasks = vec![running("T1", "w1")];

        detector.observe(&tasks); // baseline
        detector.observe(&tasks); // 1 unchanged
        let reports = detector.observe(&tasks); // 2 unchanged
        assert_eq!(state_of(&reports, "T1"), Some(StaleState::Suspected));

        detector.observe(&tasks); // 3 unchanged
        let reports = detector.observe(&tasks); // 4 unchanged
        assert_eq!(state_of(&reports, "T1"), Some(StaleState::Flagged));
    }
}
