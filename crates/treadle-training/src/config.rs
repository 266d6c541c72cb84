//! Training configuration and run parameters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use treadle_core::RunParams;

use crate::branch::DEFAULT_MSE_THRESHOLD;
use crate::split::{DEFAULT_SEED, DEFAULT_TEST_SIZE};

/// Fixed knobs of the pipeline, set once when the graph is declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// `mse_score` above this routes to the save path.
    pub mse_threshold: f64,
    pub test_size: f64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            mse_threshold: DEFAULT_MSE_THRESHOLD,
            test_size: DEFAULT_TEST_SIZE,
            seed: DEFAULT_SEED,
        }
    }
}

/// Per-run parameters supplied by the trigger. Defaults are the values the
/// production pipeline ships with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    pub model_id: String,
    pub date: String,
    pub lot_id: String,
    pub features_name: Vec<String>,
    pub targets_name: Vec<String>,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            model_id: "multi_y_regressor".to_string(),
            date: "2024-01-01".to_string(),
            lot_id: "ATWLOT-010124-0852-553-001".to_string(),
            features_name: strings(&["equipment_id", "lf_id", "proc_datetime", "heat_pre"]),
            targets_name: strings(&[
                "al_squeeze_out_x",
                "al_squeeze_out_y",
                "outer_ball_size_x",
                "outer_ball_size_y",
                "ball_thickness",
                "loop_height",
                "outer_ball_shape",
                "inner_ball_shape",
            ]),
        }
    }
}

impl From<TrainingParams> for RunParams {
    fn from(p: TrainingParams) -> Self {
        let mut parameters = Map::new();
        parameters.insert("model_id".into(), Value::String(p.model_id));
        parameters.insert("date".into(), Value::String(p.date));
        parameters.insert("lot_id".into(), Value::String(p.lot_id));
        parameters.insert("features_name".into(), string_list(p.features_name));
        parameters.insert("targets_name".into(), string_list(p.targets_name));
        RunParams::new(parameters)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn string_list(items: Vec<String>) -> Value {
    Value::Array(items.into_iter().map(Value::String).collect())
}
