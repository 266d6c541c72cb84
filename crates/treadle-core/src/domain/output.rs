//! TaskOutput: the named-field result of one successful task execution.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{TaskError, TaskName};

/// Field under which a task without declared output fields stores its value.
pub const RETURN_VALUE: &str = "return_value";

/// Immutable mapping from field name to value.
///
/// Built by the executor after the output contract check, so a stored
/// `TaskOutput` always carries exactly the fields its task declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskOutput {
    fields: BTreeMap<String, Value>,
}

impl TaskOutput {
    /// Output of a task that declares no fields.
    pub fn single(value: Value) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(RETURN_VALUE.to_string(), value);
        Self { fields }
    }

    pub(crate) fn from_fields(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }

    /// Check `value` against the declared field set of `task` and build the
    /// output.
    pub(crate) fn from_declared(
        task: &TaskName,
        declared: &BTreeSet<String>,
        value: Value,
    ) -> Result<Self, TaskError> {
        if declared.is_empty() {
            return Ok(Self::single(value));
        }
        let expected = || -> Vec<String> { declared.iter().cloned().collect() };

        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(TaskError::NotAnObject {
                    task: task.clone(),
                    expected: expected(),
                    found: json_type(&other).to_string(),
                });
            }
        };

        let actual: BTreeSet<&String> = map.keys().collect();
        if actual.len() != declared.len() || !declared.iter().all(|f| actual.contains(f)) {
            return Err(TaskError::ContractViolation {
                task: task.clone(),
                expected: expected(),
                actual: map.keys().cloned().collect(),
            });
        }

        Ok(Self::from_fields(map.into_iter().collect()))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The single unnamed output, if this is one.
    pub fn value(&self) -> Option<&Value> {
        self.get(RETURN_VALUE)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
