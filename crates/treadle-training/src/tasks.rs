//! Task bodies of the training pipeline, one typed `Handler` each.
//!
//! Input struct field names are the binding names declared in
//! `pipeline::model_training`; output struct field names are the declared
//! output fields.

use std::sync::Arc;

use anyhow::{Context, ensure};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;
use treadle_core::BranchResult;
use treadle_core::domain::RunContext;
use treadle_core::typed::Handler;

use crate::ports::{
    FeatureOps, ModelArtifact, ModelFactory, ModelParameters, RecordSource, ResultSink,
};
use crate::split::{Split, train_test_split};
use crate::{Frame, Metrics, TrainingConfig, branch, metrics};

// data_collect

#[derive(Debug, Deserialize)]
pub struct CollectInput {
    pub date: String,
    pub lot_id: String,
}

pub struct DataCollect {
    source: Arc<dyn RecordSource>,
}

impl DataCollect {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Handler for DataCollect {
    type Input = CollectInput;
    type Output = Frame;

    async fn handle(&self, input: CollectInput) -> anyhow::Result<Frame> {
        info!(date = %input.date, lot_id = %input.lot_id, "collecting records");
        self.source
            .fetch_records(&input.date, &input.lot_id)
            .await
            .with_context(|| format!("fetch records for lot {}", input.lot_id))
    }
}

// data_preprocess

#[derive(Debug, Deserialize)]
pub struct PreprocessInput {
    pub raw_data: Frame,
    pub features_name: Vec<String>,
    pub targets_name: Vec<String>,
}

pub struct DataPreprocess {
    ops: Arc<dyn FeatureOps>,
    test_size: f64,
    seed: u64,
}

impl DataPreprocess {
    pub fn new(ops: Arc<dyn FeatureOps>, config: &TrainingConfig) -> Self {
        Self {
            ops,
            test_size: config.test_size,
            seed: config.seed,
        }
    }
}

#[async_trait]
impl Handler for DataPreprocess {
    type Input = PreprocessInput;
    type Output = Split;

    async fn handle(&self, input: PreprocessInput) -> anyhow::Result<Split> {
        let columns: Vec<&String> = input
            .features_name
            .iter()
            .chain(&input.targets_name)
            .collect();
        let data = input.raw_data.select(&columns)?;
        info!(rows = data.len(), "preprocessing");

        let data = self.ops.clean(data).context("clean")?;
        let (features, targets) = self
            .ops
            .engineer(data, &input.features_name, &input.targets_name)
            .context("feature engineering")?;
        let features = self.ops.expand_datetime(features).context("expand datetime")?;
        let features = self.ops.one_hot_encode(features).context("one-hot encode")?;

        Ok(train_test_split(&features, &targets, self.test_size, self.seed)?)
    }
}

// train

#[derive(Debug, Deserialize)]
pub struct TrainInput {
    pub train_feature: Frame,
    pub train_target: Frame,
}

#[derive(Debug, Serialize)]
pub struct TrainOutput {
    pub model: ModelArtifact,
    pub model_parameter: ModelParameters,
}

pub struct Train {
    models: Arc<dyn ModelFactory>,
}

impl Train {
    pub fn new(models: Arc<dyn ModelFactory>) -> Self {
        Self { models }
    }
}

#[async_trait]
impl Handler for Train {
    type Input = TrainInput;
    type Output = TrainOutput;

    async fn handle(&self, input: TrainInput) -> anyhow::Result<TrainOutput> {
        let x = input.train_feature.to_matrix()?;
        let y = input.train_target.to_matrix()?;

        let mut model = self.models.create(&y)?;
        info!(rows = x.len(), outputs = input.train_target.width(), "fitting model");
        model.fit(&x, &y).context("fit")?;

        Ok(TrainOutput {
            model_parameter: model.parameters(),
            model: model.to_artifact()?,
        })
    }
}

// predict

#[derive(Debug, Deserialize)]
pub struct PredictInput {
    pub model: ModelArtifact,
    pub test_feature: Frame,
    pub targets_name: Vec<String>,
}

pub struct Predict {
    models: Arc<dyn ModelFactory>,
}

impl Predict {
    pub fn new(models: Arc<dyn ModelFactory>) -> Self {
        Self { models }
    }
}

#[async_trait]
impl Handler for Predict {
    type Input = PredictInput;
    type Output = Frame;

    async fn handle(&self, input: PredictInput) -> anyhow::Result<Frame> {
        let model = self.models.restore(&input.model)?;
        let predictions = model.predict(&input.test_feature.to_matrix()?)?;

        ensure!(
            predictions.len() == input.test_feature.len(),
            "model returned {} rows for {} inputs",
            predictions.len(),
            input.test_feature.len()
        );
        Ok(Frame::from_matrix(input.targets_name, &predictions)?)
    }
}

// evaluate

#[derive(Debug, Deserialize)]
pub struct EvaluateInput {
    pub test_target: Frame,
    pub prediction: Frame,
}

pub struct Evaluate;

#[async_trait]
impl Handler for Evaluate {
    type Input = EvaluateInput;
    type Output = Metrics;

    async fn handle(&self, input: EvaluateInput) -> anyhow::Result<Metrics> {
        let m = metrics::evaluate(&input.test_target, &input.prediction)?;
        info!(r2 = m.r2_score, mse = m.mse_score, "evaluated");
        Ok(m)
    }
}

// branching

#[derive(Debug, Deserialize)]
pub struct BranchingInput {
    pub metrics: Metrics,
}

pub struct Branching {
    threshold: f64,
}

impl Branching {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

#[async_trait]
impl Handler for Branching {
    type Input = BranchingInput;
    type Output = BranchResult;

    async fn handle(&self, input: BranchingInput) -> anyhow::Result<BranchResult> {
        Ok(branch::decide(&input.metrics, self.threshold))
    }
}

// save

#[derive(Debug, Deserialize)]
pub struct SaveInput {
    pub model: ModelArtifact,
    pub model_id: String,
}

pub struct Save {
    sink: Arc<dyn ResultSink>,
}

impl Save {
    pub fn new(sink: Arc<dyn ResultSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Handler for Save {
    type Input = SaveInput;
    type Output = Value;

    async fn handle(&self, input: SaveInput) -> anyhow::Result<Value> {
        info!(model_id = %input.model_id, "saving model");
        self.sink
            .persist_model(&input.model_id, &input.model)
            .await
            .context("persist model")
    }
}

// collect_metric

#[derive(Debug, Deserialize)]
pub struct CollectMetricInput {
    pub metrics: Metrics,
    pub model_parameter: ModelParameters,
    pub model_id: String,
}

pub struct CollectMetric {
    sink: Arc<dyn ResultSink>,
}

impl CollectMetric {
    pub fn new(sink: Arc<dyn ResultSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Handler for CollectMetric {
    type Input = CollectMetricInput;
    type Output = Value;

    async fn handle(&self, input: CollectMetricInput) -> anyhow::Result<Value> {
        let metric = self
            .sink
            .log_metric(&input.model_id, &input.metrics)
            .await
            .context("log metric")?;
        let parameter = self
            .sink
            .log_parameter(&input.model_id, &input.model_parameter)
            .await
            .context("log parameter")?;
        Ok(json!({ "metric": metric, "parameter": parameter }))
    }
}

// send_result

#[derive(Debug, Deserialize)]
pub struct SendResultInput {
    pub metrics: Metrics,
    pub model_id: String,
    pub context: RunContext,
}

pub struct SendResult {
    sink: Arc<dyn ResultSink>,
}

impl SendResult {
    pub fn new(sink: Arc<dyn ResultSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Handler for SendResult {
    type Input = SendResultInput;
    type Output = Value;

    async fn handle(&self, input: SendResultInput) -> anyhow::Result<Value> {
        info!(model_id = %input.model_id, run_id = %input.context.run_id, "sending result");
        self.sink
            .send_result(&input.model_id, &input.context, &input.metrics)
            .await
            .context("send result")
    }
}

// failure

#[derive(Debug, Deserialize)]
pub struct FailureInput {}

/// Terminal reporting task of the alternate branch.
pub struct Failure;

#[async_trait]
impl Handler for Failure {
    type Input = FailureInput;
    type Output = ();

    async fn handle(&self, _input: FailureInput) -> anyhow::Result<()> {
        info!("model did not meet the performance criteria");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use treadle_core::typed::{DynHandler, TypedHandler};

    #[tokio::test]
    async fn branching_decodes_metrics_and_returns_names() {
        let handler = TypedHandler::new(Branching::new(50.0));

        let out = handler
            .handle_dyn(json!({"metrics": {
                "r2_score": 0.1, "mse_score": 60.0, "pos_max_err": 3.0, "neg_max_err": -3.0
            }}))
            .await
            .unwrap();

        assert_eq!(out, json!(["save", "send_result", "collect_metric"]));
    }

    #[tokio::test]
    async fn evaluate_rejects_misaligned_frames() {
        let target = Frame::from_matrix(vec!["y".into()], &[vec![1.0], vec![2.0]]).unwrap();
        let prediction = Frame::from_matrix(vec!["y".into()], &[vec![1.0]]).unwrap();

        let err = Evaluate
            .handle(EvaluateInput {
                test_target: target,
                prediction,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("shape mismatch"));
    }

    #[tokio::test]
    async fn failure_takes_no_inputs_and_returns_null() {
        let out = TypedHandler::new(Failure).handle_dyn(json!({})).await.unwrap();
        assert_eq!(out, Value::Null);
    }
}
