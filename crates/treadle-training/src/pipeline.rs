//! The model-training graph.
//!
//! ```text
//! data_collect -> data_preprocess -> train -> predict -> evaluate -> branching
//!                                                                     |-> save
//!                                                                     |-> collect_metric
//!                                                                     |-> send_result
//!                                                                     `-> failure
//! ```

use treadle_core::domain::{Input, TaskDecl};
use treadle_core::{Graph, ValidationError};

use crate::TrainingConfig;
use crate::ports::TrainingOps;
use crate::tasks::{
    Branching, CollectMetric, DataCollect, DataPreprocess, Evaluate, Failure, Predict, Save,
    SendResult, Train,
};

pub const DATA_COLLECT: &str = "data_collect";
pub const DATA_PREPROCESS: &str = "data_preprocess";
pub const TRAIN: &str = "train";
pub const PREDICT: &str = "predict";
pub const EVALUATE: &str = "evaluate";
pub const BRANCHING: &str = "branching";
pub const SAVE: &str = "save";
pub const COLLECT_METRIC: &str = "collect_metric";
pub const SEND_RESULT: &str = "send_result";
pub const FAILURE: &str = "failure";

/// Declare and validate the training graph.
///
/// Run parameters it reads: `date`, `lot_id`, `features_name`,
/// `targets_name`, `model_id` (see `TrainingParams`).
pub fn model_training(
    ops: &TrainingOps,
    config: &TrainingConfig,
) -> Result<Graph, ValidationError> {
    Graph::build(declarations(ops, config))
}

pub fn declarations(ops: &TrainingOps, config: &TrainingConfig) -> Vec<TaskDecl> {
    vec![
        TaskDecl::typed(DATA_COLLECT, DataCollect::new(ops.source.clone()))
            .param("date")
            .param("lot_id"),
        TaskDecl::typed(DATA_PREPROCESS, DataPreprocess::new(ops.features.clone(), config))
            .input("raw_data", Input::single(DATA_COLLECT))
            .param("features_name")
            .param("targets_name")
            .outputs(["train_feature", "test_feature", "train_target", "test_target"]),
        TaskDecl::typed(TRAIN, Train::new(ops.models.clone()))
            .input("train_feature", Input::field(DATA_PREPROCESS, "train_feature"))
            .input("train_target", Input::field(DATA_PREPROCESS, "train_target"))
            .outputs(["model", "model_parameter"]),
        TaskDecl::typed(PREDICT, Predict::new(ops.models.clone()))
            .input("model", Input::field(TRAIN, "model"))
            .input("test_feature", Input::field(DATA_PREPROCESS, "test_feature"))
            .param("targets_name"),
        TaskDecl::typed(EVALUATE, Evaluate)
            .input("test_target", Input::field(DATA_PREPROCESS, "test_target"))
            .input("prediction", Input::single(PREDICT)),
        TaskDecl::typed(BRANCHING, Branching::new(config.mse_threshold))
            .input("metrics", Input::single(EVALUATE))
            .branch(),
        TaskDecl::typed(SAVE, Save::new(ops.sink.clone()))
            .input("model", Input::field(TRAIN, "model"))
            .param("model_id")
            .after(BRANCHING),
        TaskDecl::typed(COLLECT_METRIC, CollectMetric::new(ops.sink.clone()))
            .input("metrics", Input::single(EVALUATE))
            .input("model_parameter", Input::field(TRAIN, "model_parameter"))
            .param("model_id")
            .after(BRANCHING),
        TaskDecl::typed(SEND_RESULT, SendResult::new(ops.sink.clone()))
            .input("metrics", Input::single(EVALUATE))
            .param("model_id")
            .run_context("context")
            .after(BRANCHING),
        TaskDecl::typed(FAILURE, Failure).after(BRANCHING),
    ]
}
