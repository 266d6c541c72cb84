//! RunReport - a serializable summary of a `RunRecord`.
//!
//! Outputs are left out on purpose: they can be large (frames, model
//! state). The CLI prints a report as JSON or as a plain text table.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{RunRecord, RunStatus};
use crate::domain::{OutcomeKind, RunId, TaskName, TaskOutcome};

#[derive(Debug, Clone, Serialize)]
pub struct TaskLine {
    pub task: TaskName,
    pub state: OutcomeKind,

    /// Skip reason or error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chosen_branch: Option<Vec<TaskName>>,
    pub happy_path_completed: bool,
    pub counts: OutcomeCounts,
    pub tasks: Vec<TaskLine>,
}

impl RunReport {
    pub fn from_record(record: &RunRecord) -> Self {
        let mut counts = OutcomeCounts::default();
        let tasks = record
            .iter()
            .map(|(task, outcome)| {
                match outcome.kind() {
                    OutcomeKind::Completed => counts.completed += 1,
                    OutcomeKind::Skipped => counts.skipped += 1,
                    OutcomeKind::Failed => counts.failed += 1,
                }
                TaskLine {
                    task: task.clone(),
                    state: outcome.kind(),
                    detail: detail(outcome),
                }
            })
            .collect();

        Self {
            run_id: record.run_id(),
            status: record.status(),
            started_at: record.started_at(),
            finished_at: record.finished_at(),
            chosen_branch: record.chosen_branch().map(|b| b.iter().cloned().collect()),
            happy_path_completed: record.happy_path_completed(),
            counts,
            tasks,
        }
    }
}

fn detail(outcome: &TaskOutcome) -> Option<String> {
    use crate::domain::SkipReason::*;

    match outcome {
        TaskOutcome::Completed(_) => None,
        TaskOutcome::Failed(e) => Some(e.to_string()),
        TaskOutcome::Skipped(reason) => Some(match reason {
            UpstreamFailed { task } => format!("upstream '{task}' failed"),
            UpstreamSkipped { task } => format!("upstream '{task}' was skipped"),
            BranchNotTaken { branch } => format!("not selected by '{branch}'"),
            Cancelled => "run cancelled".to_string(),
        }),
    }
}

/// Plain text table, one line per task.
impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {:?}", self.run_id, self.status)?;
        if let Some(branch) = &self.chosen_branch {
            let names: Vec<&str> = branch.iter().map(TaskName::as_str).collect();
            writeln!(f, "branch: {}", names.join(", "))?;
        }

        let width = self
            .tasks
            .iter()
            .map(|t| t.task.as_str().len())
            .max()
            .unwrap_or(0);
        for line in &self.tasks {
            let state = format!("{:?}", line.state).to_uppercase();
            write!(f, "  {:<width$}  {:<9}", line.task.as_str(), state)?;
            if let Some(detail) = &line.detail {
                write!(f, "  {detail}")?;
            }
            writeln!(f)?;
        }

        write!(
            f,
            "completed={} skipped={} failed={}",
            self.counts.completed, self.counts.skipped, self.counts.failed
        )
    }
}
