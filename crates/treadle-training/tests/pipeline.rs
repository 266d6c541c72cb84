use std::sync::Arc;

use async_trait::async_trait;
use rstest::rstest;
use serde_json::{Value, json};
use treadle_core::domain::RunContext;
use treadle_core::{
    Executor, ExecutorConfig, RunError, RunParams, RunStatus, SkipReason, TaskError,
};
use treadle_training::local::{FrameFeatureOps, InMemorySource, MeanRegressorFactory, RecordingSink};
use treadle_training::pipeline::*;
use treadle_training::ports::ModelParameters;
use treadle_training::{
    Frame, Metrics, Model, ModelArtifact, ModelFactory, ResultSink, TrainingConfig,
    TrainingOps, TrainingParams, model_training,
};

const TARGETS: [&str; 2] = ["loop_height", "ball_thickness"];

/// `rows` lot records; target columns come from `target(i)`.
fn lot_records(rows: usize, target: impl Fn(usize) -> f64) -> Frame {
    let records = (0..rows)
        .map(|i| {
            json!({
                "equipment_id": format!("EQ-{}", i % 3),
                "lf_id": format!("LF-{}", i % 2),
                "proc_datetime": format!("2024-01-01 08:{:02}:00", i % 60),
                "heat_pre": 150.0 + i as f64,
                "loop_height": target(i),
                "ball_thickness": target(i) / 2.0,
            })
        })
        .collect();
    Frame::from_records(records).unwrap()
}

fn params() -> RunParams {
    TrainingParams {
        date: "2024-01-01".into(),
        lot_id: "LOT-1".into(),
        targets_name: TARGETS.iter().map(|s| s.to_string()).collect(),
        ..TrainingParams::default()
    }
    .into()
}

fn ops(records: Frame, sink: Arc<RecordingSink>) -> TrainingOps {
    TrainingOps {
        source: Arc::new(InMemorySource::new(records)),
        features: Arc::new(FrameFeatureOps),
        models: Arc::new(MeanRegressorFactory),
        sink,
    }
}

fn metrics_of(record: &treadle_core::RunRecord) -> Metrics {
    serde_json::from_value(record.output(EVALUATE).unwrap().value().unwrap().clone()).unwrap()
}

#[tokio::test]
async fn perfect_model_takes_the_failure_path() {
    let sink = Arc::new(RecordingSink::new());
    let graph = model_training(
        &ops(lot_records(100, |_| 42.0), sink.clone()),
        &TrainingConfig::default(),
    )
    .unwrap();

    let record = Executor::new(ExecutorConfig::default())
        .run(&graph, params())
        .await;

    // constant targets, mean model: exact predictions
    let metrics = metrics_of(&record);
    assert_eq!(metrics.mse_score, 0.0);
    assert_eq!(metrics.r2_score, 1.0);

    // 0 > 50 is false
    assert!(record.chosen_branch().unwrap().contains(FAILURE));
    assert!(record.is_completed(FAILURE));
    for name in [SAVE, COLLECT_METRIC, SEND_RESULT] {
        assert_eq!(
            record.get(name).unwrap().skip_reason(),
            Some(&SkipReason::BranchNotTaken {
                branch: BRANCHING.into()
            }),
            "{name} should be skipped"
        );
    }
    assert!(sink.calls().is_empty());
    assert!(record.happy_path_completed());
    assert_eq!(record.status(), RunStatus::Succeeded);
}

#[tokio::test]
async fn preprocess_splits_eighty_twenty() {
    let graph = model_training(
        &ops(lot_records(100, |_| 42.0), Arc::new(RecordingSink::new())),
        &TrainingConfig::default(),
    )
    .unwrap();

    let record = Executor::new(ExecutorConfig::sequential())
        .run(&graph, params())
        .await;

    let split = record.output(DATA_PREPROCESS).unwrap();
    let train: Frame = serde_json::from_value(split.get("train_feature").unwrap().clone()).unwrap();
    let test: Frame = serde_json::from_value(split.get("test_target").unwrap().clone()).unwrap();
    assert_eq!(train.len(), 80);
    assert_eq!(test.len(), 20);
    assert_eq!(test.columns(), TARGETS);

    let parameters = record.output(TRAIN).unwrap().get("model_parameter").unwrap();
    assert_eq!(parameters["outputs"], 2);
}

/// Predicts every target plus a fixed offset, so `mse_score = offset^2`.
struct OffsetModel {
    offset: f64,
    targets: Vec<Vec<f64>>,
}

impl Model for OffsetModel {
    fn fit(&mut self, _features: &[Vec<f64>], targets: &[Vec<f64>]) -> anyhow::Result<()> {
        self.targets = targets.to_vec();
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> anyhow::Result<Vec<Vec<f64>>> {
        // every target row is identical in these tests
        let row: Vec<f64> = self.targets[0].iter().map(|y| y + self.offset).collect();
        Ok(vec![row; features.len()])
    }

    fn parameters(&self) -> ModelParameters {
        ModelParameters::new()
    }

    fn to_artifact(&self) -> anyhow::Result<ModelArtifact> {
        Ok(ModelArtifact {
            kind: "offset".into(),
            state: json!({ "offset": self.offset, "targets": self.targets }),
        })
    }
}

struct OffsetFactory(f64);

impl ModelFactory for OffsetFactory {
    fn create(&self, _targets: &[Vec<f64>]) -> anyhow::Result<Box<dyn Model>> {
        Ok(Box::new(OffsetModel {
            offset: self.0,
            targets: Vec::new(),
        }))
    }

    fn restore(&self, artifact: &ModelArtifact) -> anyhow::Result<Box<dyn Model>> {
        Ok(Box::new(OffsetModel {
            offset: self.0,
            targets: serde_json::from_value(artifact.state["targets"].clone())?,
        }))
    }
}

// Under scrutiny: a large error selects the save path. The comparison is
// kept literal until the intent is confirmed.
#[rstest]
#[case::mse_100_saves(10.0, true)]
#[case::mse_9_reports_failure(3.0, false)]
#[tokio::test]
async fn error_metric_routes_the_run(#[case] offset: f64, #[case] save_path: bool) {
    let sink = Arc::new(RecordingSink::new());
    let ops = TrainingOps {
        models: Arc::new(OffsetFactory(offset)),
        ..ops(lot_records(100, |_| 42.0), sink.clone())
    };
    let graph = model_training(&ops, &TrainingConfig::default()).unwrap();

    let record = Executor::new(ExecutorConfig::default())
        .run(&graph, params())
        .await;

    assert_eq!(metrics_of(&record).mse_score, offset * offset);
    for name in [SAVE, COLLECT_METRIC, SEND_RESULT] {
        assert_eq!(record.is_completed(name), save_path, "{name}");
    }
    assert_eq!(record.is_skipped(FAILURE), save_path);

    let mut calls = sink.calls();
    calls.sort();
    if save_path {
        assert_eq!(
            calls,
            vec![
                "log_metric:multi_y_regressor",
                "log_parameter:multi_y_regressor",
                "persist_model:multi_y_regressor",
                "send_result:multi_y_regressor",
            ]
        );
    } else {
        assert!(calls.is_empty());
    }
}

struct BrokenModelFactory;

impl ModelFactory for BrokenModelFactory {
    fn create(&self, targets: &[Vec<f64>]) -> anyhow::Result<Box<dyn Model>> {
        MeanRegressorFactory.create(targets)
    }

    fn restore(&self, _artifact: &ModelArtifact) -> anyhow::Result<Box<dyn Model>> {
        anyhow::bail!("model registry unavailable")
    }
}

#[tokio::test]
async fn predict_failure_skips_everything_after_it() {
    let ops = TrainingOps {
        models: Arc::new(BrokenModelFactory),
        ..ops(lot_records(100, |_| 42.0), Arc::new(RecordingSink::new()))
    };
    let graph = model_training(&ops, &TrainingConfig::default()).unwrap();

    let record = Executor::new(ExecutorConfig::default())
        .run(&graph, params())
        .await;

    assert!(record.is_completed(TRAIN));
    assert!(record.is_failed(PREDICT));
    for name in [EVALUATE, BRANCHING, SAVE, COLLECT_METRIC, SEND_RESULT, FAILURE] {
        assert!(record.is_skipped(name), "{name} should be skipped");
    }
    assert_eq!(record.status(), RunStatus::Failed);

    match record.into_result().unwrap_err() {
        RunError::RootTaskFailed { task, error } => {
            assert_eq!(task, PREDICT);
            let TaskError::Body { message, .. } = error else {
                panic!("unexpected task error: {error:?}");
            };
            assert!(message.contains("model registry unavailable"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

/// Accepts everything except `send_result`.
struct FlakyResultServer(RecordingSink);

#[async_trait]
impl ResultSink for FlakyResultServer {
    async fn persist_model(&self, model_id: &str, model: &ModelArtifact) -> anyhow::Result<Value> {
        self.0.persist_model(model_id, model).await
    }

    async fn log_metric(&self, model_id: &str, metrics: &Metrics) -> anyhow::Result<Value> {
        self.0.log_metric(model_id, metrics).await
    }

    async fn log_parameter(
        &self,
        model_id: &str,
        parameters: &ModelParameters,
    ) -> anyhow::Result<Value> {
        self.0.log_parameter(model_id, parameters).await
    }

    async fn send_result(
        &self,
        _model_id: &str,
        _context: &RunContext,
        _metrics: &Metrics,
    ) -> anyhow::Result<Value> {
        anyhow::bail!("result server returned 503")
    }
}

#[tokio::test]
async fn failure_after_the_branch_is_reported_not_raised() {
    let ops = TrainingOps {
        models: Arc::new(OffsetFactory(10.0)),
        sink: Arc::new(FlakyResultServer(RecordingSink::new())),
        ..ops(lot_records(100, |_| 42.0), Arc::new(RecordingSink::new()))
    };
    let graph = model_training(&ops, &TrainingConfig::default()).unwrap();

    let record = Executor::new(ExecutorConfig::default())
        .run(&graph, params())
        .await;

    assert!(record.is_failed(SEND_RESULT));
    assert!(record.is_completed(SAVE));
    assert!(record.is_completed(COLLECT_METRIC));
    assert!(!record.happy_path_completed());
    assert_eq!(record.status(), RunStatus::BranchFailed);
    assert!(record.into_result().is_ok());
}

#[tokio::test]
async fn missing_feature_column_fails_preprocess() {
    let records = lot_records(100, |_| 42.0).without_column("lf_id").unwrap();
    let graph = model_training(
        &ops(records, Arc::new(RecordingSink::new())),
        &TrainingConfig::default(),
    )
    .unwrap();

    let record = Executor::new(ExecutorConfig::default())
        .run(&graph, params())
        .await;

    let error = record.get(DATA_PREPROCESS).unwrap().error().unwrap();
    assert!(error.to_string().contains("column 'lf_id' not found"));
    assert!(record.is_skipped(TRAIN));
}

#[test]
fn graph_order_follows_declarations() {
    let graph = model_training(
        &ops(lot_records(1, |_| 0.0), Arc::new(RecordingSink::new())),
        &TrainingConfig::default(),
    )
    .unwrap();

    let order: Vec<&str> = graph.topological_order().into_iter().map(|n| n.as_str()).collect();
    assert_eq!(
        order,
        vec![
            DATA_COLLECT,
            DATA_PREPROCESS,
            TRAIN,
            PREDICT,
            EVALUATE,
            BRANCHING,
            SAVE,
            COLLECT_METRIC,
            SEND_RESULT,
            FAILURE
        ]
    );
    assert_eq!(graph.branch_task().unwrap().name(), BRANCHING);
}
