//! Outcome model: the per-task entry of a run record.
//!
//! Architecture-agnostic like the rest of `domain`: it only describes the
//! shape of what happened to a task, not how the executor got there.

use serde::{Deserialize, Serialize};

use super::{TaskError, TaskName, TaskOutput};

/// Coarse classification, serialized as COMPLETED / SKIPPED / FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Completed,
    Skipped,
    Failed,
}

/// Why a task was not executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// An ancestor failed.
    UpstreamFailed { task: TaskName },

    /// An ancestor was skipped.
    UpstreamSkipped { task: TaskName },

    /// The branch task routed the run elsewhere.
    BranchNotTaken { branch: TaskName },

    /// The run was cancelled before this task was launched.
    Cancelled,
}

/// What happened to one task in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed(TaskOutput),
    Skipped(SkipReason),
    Failed(TaskError),
}

impl TaskOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            TaskOutcome::Completed(_) => OutcomeKind::Completed,
            TaskOutcome::Skipped(_) => OutcomeKind::Skipped,
            TaskOutcome::Failed(_) => OutcomeKind::Failed,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TaskOutcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TaskOutcome::Failed(_))
    }

    pub fn output(&self) -> Option<&TaskOutput> {
        match self {
            TaskOutcome::Completed(output) => Some(output),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TaskError> {
        match self {
            TaskOutcome::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            TaskOutcome::Skipped(reason) => Some(reason),
            _ => None,
        }
    }
}
