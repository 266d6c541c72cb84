//! Error taxonomy.
//!
//! - `ValidationError`: the declarations do not form a runnable graph. Raised
//!   by `Graph::build`, before anything runs.
//! - `TaskError`: one task did not produce a usable output. Stored in the
//!   run record as `Failed`; never thrown out of `Executor::run`.
//! - `HandlerError`: what a `DynHandler` reports back to the executor; the
//!   executor turns it into a `TaskError` tagged with the task name.
//! - `RunError`: the caller-facing verdict of `RunRecord::into_result`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::TaskName;

/// The task declarations do not form a valid graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("graph has no tasks")]
    EmptyGraph,

    #[error("task '{name}' is declared more than once")]
    DuplicateTask { name: TaskName },

    #[error("task '{task}' binds input '{binding}' more than once")]
    DuplicateBinding { task: TaskName, binding: String },

    #[error("task '{task}' references unknown task '{producer}'")]
    UnknownTask { task: TaskName, producer: TaskName },

    #[error(
        "task '{task}' references field {} of '{producer}', which does not declare it",
        display_field(.field)
    )]
    UnknownReference {
        task: TaskName,
        producer: TaskName,
        field: Option<String>,
    },

    #[error("dependency cycle: {}", display_path(.path))]
    Cycle { path: Vec<TaskName> },

    #[error("task '{task}' references '{producer}', which is declared after it")]
    ForwardReference { task: TaskName, producer: TaskName },

    #[error("graph declares more than one branch task: '{first}' and '{second}'")]
    MultipleBranches { first: TaskName, second: TaskName },

    #[error("branch task '{task}' cannot declare output fields")]
    BranchWithOutputs { task: TaskName },
}

fn display_field(field: &Option<String>) -> String {
    match field {
        Some(field) => format!("'{field}'"),
        None => "<single output>".to_string(),
    }
}

fn display_path(path: &[TaskName]) -> String {
    path.iter()
        .map(TaskName::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Why a task ended up `Failed`.
///
/// Carries messages rather than source errors so the run record stays
/// `Clone` and serializable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskError {
    /// The external operation behind the task body raised.
    #[error("task '{task}' failed: {message}")]
    Body { task: TaskName, message: String },

    /// The body returned a field set different from the declared one.
    #[error("task '{task}' returned fields {actual:?}, expected {expected:?}")]
    ContractViolation {
        task: TaskName,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// The body declares fields but returned something other than an object.
    #[error("task '{task}' returned {found}, expected an object with fields {expected:?}")]
    NotAnObject {
        task: TaskName,
        expected: Vec<String>,
        found: String,
    },

    /// An input could not be resolved at run time.
    #[error("task '{task}' could not resolve input '{binding}': {reason}")]
    InputResolution {
        task: TaskName,
        binding: String,
        reason: String,
    },

    #[error("task '{task}' could not decode its inputs: {reason}")]
    Decode { task: TaskName, reason: String },

    #[error("task '{task}' could not encode its output: {reason}")]
    Encode { task: TaskName, reason: String },

    /// The branch selected something that is not one of its downstream tasks.
    #[error("branch task '{task}' selected unknown downstream tasks {unknown:?}")]
    InvalidBranch { task: TaskName, unknown: Vec<TaskName> },

    #[error("task '{task}' timed out after {after_ms}ms")]
    Timeout { task: TaskName, after_ms: u64 },

    #[error("task '{task}' panicked: {reason}")]
    Panicked { task: TaskName, reason: String },
}

impl TaskError {
    pub fn task(&self) -> &TaskName {
        match self {
            TaskError::Body { task, .. }
            | TaskError::ContractViolation { task, .. }
            | TaskError::NotAnObject { task, .. }
            | TaskError::InputResolution { task, .. }
            | TaskError::Decode { task, .. }
            | TaskError::Encode { task, .. }
            | TaskError::InvalidBranch { task, .. }
            | TaskError::Timeout { task, .. }
            | TaskError::Panicked { task, .. } => task,
        }
    }

    /// Did the task return outputs that break its declared contract?
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            TaskError::ContractViolation { .. } | TaskError::NotAnObject { .. }
        )
    }
}

/// Error reported by a `DynHandler`.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("json decode: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("json encode: {0}")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Body(#[from] anyhow::Error),
}

impl HandlerError {
    pub(crate) fn into_task_error(self, task: &TaskName) -> TaskError {
        match self {
            HandlerError::Decode(e) => TaskError::Decode {
                task: task.clone(),
                reason: e.to_string(),
            },
            HandlerError::Encode(e) => TaskError::Encode {
                task: task.clone(),
                reason: e.to_string(),
            },
            // `{:#}` keeps the whole anyhow context chain on one line.
            HandlerError::Body(e) => TaskError::Body {
                task: task.clone(),
                message: format!("{e:#}"),
            },
        }
    }
}

/// Overall verdict of a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// A task on the root sequence (the branch task or one of its ancestors)
    /// failed, so no branch of the pipeline could run.
    #[error("root task '{task}' failed: {error}")]
    RootTaskFailed { task: TaskName, error: TaskError },

    #[error("run was cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_error_renders_path() {
        let err = ValidationError::Cycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
    }

    #[test]
    fn unknown_reference_renders_single_output() {
        let err = ValidationError::UnknownReference {
            task: "predict".into(),
            producer: "train".into(),
            field: None,
        };
        assert!(err.to_string().contains("<single output>"));
    }

    #[test]
    fn body_error_keeps_context_chain() {
        let err = anyhow::anyhow!("connection refused").context("persist-model");
        let task_err = HandlerError::Body(err).into_task_error(&"save".into());

        match task_err {
            TaskError::Body { task, message } => {
                assert_eq!(task, "save");
                assert_eq!(message, "persist-model: connection refused");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn task_error_serializes_with_kind_tag() {
        let err = TaskError::Timeout {
            task: "train".into(),
            after_ms: 50,
        };
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["kind"], "timeout");
        assert_eq!(v["task"], "train");
    }
}
