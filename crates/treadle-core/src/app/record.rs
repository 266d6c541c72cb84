//! RunRecord - what happened to every task in one run.
//!
//! Immutable once the executor returns it. Everything a caller needs to tell
//! "the root sequence failed" from "a branch of the pipeline failed" can be
//! derived from the record alone.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::domain::{
    BranchResult, RunError, RunId, SkipReason, TaskError, TaskName, TaskOutcome, TaskOutput,
};

/// Overall verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Every task that ran completed.
    Succeeded,
    /// The root sequence completed but a task after the branch failed.
    BranchFailed,
    /// A task on the root sequence failed.
    Failed,
    /// The run was cancelled before every task was launched.
    Cancelled,
}

/// The routing decision taken by the branch task.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchDecision {
    pub task: TaskName,
    pub selected: BranchResult,

    /// Selected tasks and everything downstream of them.
    pub happy_path: Vec<TaskName>,
}

#[derive(Debug, Clone)]
pub struct RunRecord {
    run_id: RunId,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,

    /// Outcomes in topological order.
    entries: Vec<(TaskName, TaskOutcome)>,
    index: HashMap<TaskName, usize>,

    /// The branch task's name, when the graph has one.
    branch_task: Option<TaskName>,
    decision: Option<BranchDecision>,

    /// The branch task and its ancestors (every task without a branch).
    root_sequence: HashSet<TaskName>,
}

impl RunRecord {
    pub(crate) fn new(
        run_id: RunId,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        entries: Vec<(TaskName, TaskOutcome)>,
        branch_task: Option<TaskName>,
        decision: Option<BranchDecision>,
        root_sequence: HashSet<TaskName>,
    ) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), i))
            .collect();
        Self {
            run_id,
            started_at,
            finished_at,
            entries,
            index,
            branch_task,
            decision,
            root_sequence,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&TaskOutcome> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    /// `(task, outcome)` pairs in execution order.
    pub fn iter(&self) -> impl Iterator<Item = (&TaskName, &TaskOutcome)> {
        self.entries.iter().map(|(name, outcome)| (name, outcome))
    }

    pub fn is_completed(&self, name: &str) -> bool {
        self.get(name).is_some_and(TaskOutcome::is_completed)
    }

    pub fn is_skipped(&self, name: &str) -> bool {
        self.get(name).is_some_and(TaskOutcome::is_skipped)
    }

    pub fn is_failed(&self, name: &str) -> bool {
        self.get(name).is_some_and(TaskOutcome::is_failed)
    }

    pub fn output(&self, name: &str) -> Option<&TaskOutput> {
        self.get(name).and_then(TaskOutcome::output)
    }

    pub fn branch_task(&self) -> Option<&TaskName> {
        self.branch_task.as_ref()
    }

    /// The branch task's selection, if it completed.
    pub fn chosen_branch(&self) -> Option<&BranchResult> {
        self.decision.as_ref().map(|d| &d.selected)
    }

    pub fn decision(&self) -> Option<&BranchDecision> {
        self.decision.as_ref()
    }

    pub fn is_root_task(&self, name: &str) -> bool {
        self.root_sequence.contains(name)
    }

    /// Did the path the run was routed down finish?
    ///
    /// With a branch task: every selected task and everything downstream of
    /// it is `Completed` (false when the branch never decided). Without one:
    /// every task is `Completed`.
    pub fn happy_path_completed(&self) -> bool {
        if self.branch_task.is_none() {
            return self.entries.iter().all(|(_, o)| o.is_completed());
        }
        match &self.decision {
            Some(decision) => decision
                .happy_path
                .iter()
                .all(|name| self.is_completed(name.as_str())),
            None => false,
        }
    }

    /// First failed task on the root sequence, in execution order.
    pub fn root_failure(&self) -> Option<(&TaskName, &TaskError)> {
        self.failures()
            .find(|(name, _)| self.root_sequence.contains(name.as_str()))
    }

    /// Every failed task, in execution order.
    pub fn failures(&self) -> impl Iterator<Item = (&TaskName, &TaskError)> {
        self.entries
            .iter()
            .filter_map(|(name, outcome)| outcome.error().map(|e| (name, e)))
    }

    pub fn was_cancelled(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, o)| o.skip_reason() == Some(&SkipReason::Cancelled))
    }

    pub fn status(&self) -> RunStatus {
        if self.was_cancelled() {
            RunStatus::Cancelled
        } else if self.root_failure().is_some() {
            RunStatus::Failed
        } else if self.failures().next().is_some() {
            RunStatus::BranchFailed
        } else {
            RunStatus::Succeeded
        }
    }

    /// Turn the record into the caller-facing verdict.
    ///
    /// Only a root-sequence failure (or cancellation) is an error; failures
    /// after the branch stay in the record for the caller to inspect.
    pub fn into_result(self) -> Result<RunRecord, RunError> {
        if self.was_cancelled() {
            return Err(RunError::Cancelled);
        }
        if let Some((task, error)) = self.root_failure() {
            return Err(RunError::RootTaskFailed {
                task: task.clone(),
                error: error.clone(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskOutput;
    use chrono::TimeZone;
    use serde_json::json;
    use ulid::Ulid;

    fn completed() -> TaskOutcome {
        TaskOutcome::Completed(TaskOutput::single(json!(null)))
    }

    fn failed(task: &str) -> TaskOutcome {
        TaskOutcome::Failed(TaskError::Body {
            task: task.into(),
            message: "boom".into(),
        })
    }

    fn record(entries: Vec<(&str, TaskOutcome)>, selected: Option<&[&str]>) -> RunRecord {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let decision = selected.map(|s| BranchDecision {
            task: "branching".into(),
            selected: BranchResult::new(s.iter().copied()),
            happy_path: s.iter().map(|&n| TaskName::from(n)).collect(),
        });
        RunRecord::new(
            RunId::from(Ulid::nil()),
            at,
            at,
            entries.into_iter().map(|(n, o)| (n.into(), o)).collect(),
            Some("branching".into()),
            decision,
            ["evaluate", "branching"].into_iter().map(TaskName::from).collect(),
        )
    }

    #[test]
    fn failure_after_branch_is_not_a_run_error() {
        let rec = record(
            vec![
                ("evaluate", completed()),
                ("branching", completed()),
                ("save", failed("save")),
                ("failure", TaskOutcome::Skipped(SkipReason::BranchNotTaken {
                    branch: "branching".into(),
                })),
            ],
            Some(&["save"]),
        );

        assert_eq!(rec.status(), RunStatus::BranchFailed);
        assert!(rec.root_failure().is_none());
        assert!(!rec.happy_path_completed());
        assert!(rec.into_result().is_ok());
    }

    #[test]
    fn root_failure_is_a_run_error() {
        let rec = record(
            vec![
                ("evaluate", failed("evaluate")),
                ("branching", TaskOutcome::Skipped(SkipReason::UpstreamFailed {
                    task: "evaluate".into(),
                })),
            ],
            None,
        );

        assert_eq!(rec.status(), RunStatus::Failed);
        assert!(!rec.happy_path_completed());
        let err = rec.into_result().unwrap_err();
        assert!(matches!(err, RunError::RootTaskFailed { ref task, .. } if task == "evaluate"));
    }

    #[test]
    fn lookups_by_name() {
        let rec = record(
            vec![
                ("evaluate", completed()),
                ("branching", completed()),
                ("failure", completed()),
            ],
            Some(&["failure"]),
        );

        assert!(rec.is_completed("failure"));
        assert!(!rec.is_failed("failure"));
        assert!(rec.get("missing").is_none());
        assert!(rec.happy_path_completed());
        assert!(rec.chosen_branch().unwrap().contains("failure"));
        assert_eq!(rec.status(), RunStatus::Succeeded);
    }
}
