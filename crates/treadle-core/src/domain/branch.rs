//! BranchResult: the routing decision returned by a branch task.

use serde::{Deserialize, Deserializer, Serialize};

use super::TaskName;

/// The set of downstream tasks a branch task keeps active.
///
/// Order is the order the branch returned them in; duplicates are dropped.
/// Deserializes from a single task name or from a list of names, so a branch
/// body may return `"failure"` as well as `["save", "send_result"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BranchResult {
    selected: Vec<TaskName>,
}

impl BranchResult {
    pub fn new<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<TaskName>,
    {
        let mut selected: Vec<TaskName> = Vec::new();
        for name in names {
            let name = name.into();
            if !selected.contains(&name) {
                selected.push(name);
            }
        }
        Self { selected }
    }

    pub fn one(name: impl Into<TaskName>) -> Self {
        Self::new([name])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.selected.iter().any(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskName> {
        self.selected.iter()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

impl<'de> Deserialize<'de> for BranchResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            One(TaskName),
            Many(Vec<TaskName>),
        }

        let names = match Shape::deserialize(deserializer)? {
            Shape::One(name) => vec![name],
            Shape::Many(names) => names,
        };
        if names.is_empty() {
            return Err(serde::de::Error::custom(
                "branch result must select at least one task",
            ));
        }
        Ok(Self::new(names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_from_single_name() {
        let r: BranchResult = serde_json::from_value(json!("failure")).unwrap();
        assert_eq!(r, BranchResult::one("failure"));
    }

    #[test]
    fn deserializes_from_list_and_drops_duplicates() {
        let r: BranchResult =
            serde_json::from_value(json!(["save", "send_result", "save"])).unwrap();
        assert_eq!(r.len(), 2);
        assert!(r.contains("save"));
        assert!(r.contains("send_result"));
    }

    #[test]
    fn empty_selection_is_rejected() {
        assert!(serde_json::from_value::<BranchResult>(json!([])).is_err());
    }

    #[test]
    fn serializes_as_list() {
        let v = serde_json::to_value(BranchResult::new(["a", "b"])).unwrap();
        assert_eq!(v, json!(["a", "b"]));
    }
}
