//! Run parameters: the literal inputs an external trigger hands to a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::RunId;

/// Initial parameters of one run.
///
/// `run_id` and `logical_date` are filled in by the executor when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl RunParams {
    pub fn new(parameters: Map<String, Value>) -> Self {
        Self {
            run_id: None,
            logical_date: None,
            parameters,
        }
    }

    /// Build from a JSON object; anything else is rejected.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let parameters: Map<String, Value> = serde_json::from_value(value)?;
        Ok(Self::new(parameters))
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn with_logical_date(mut self, logical_date: DateTime<Utc>) -> Self {
        self.logical_date = Some(logical_date);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }
}

/// Fully resolved context of a running graph, handed to `Input::RunContext`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: RunId,
    pub logical_date: DateTime<Utc>,
    pub params: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_accepts_objects_only() {
        let params = RunParams::from_value(json!({"date": "2024-01-01"})).unwrap();
        assert_eq!(params.get("date"), Some(&json!("2024-01-01")));

        assert!(RunParams::from_value(json!(["date"])).is_err());
    }

    #[test]
    fn params_without_ids_deserialize() {
        let params: RunParams =
            serde_json::from_value(json!({"parameters": {"lot_id": "LOT-1"}})).unwrap();
        assert!(params.run_id.is_none());
        assert_eq!(params.get("lot_id"), Some(&json!("LOT-1")));
    }
}
