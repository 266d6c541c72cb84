//! Ports - the external operations behind the training tasks.
//!
//! The pipeline never looks inside these; each is a black box that either
//! returns or fails. I/O-bound operations are async, CPU-bound ones are not.
//!
//! | port | used by |
//! |---|---|
//! | `RecordSource` | data_collect |
//! | `FeatureOps` | data_preprocess |
//! | `ModelFactory` / `Model` | train, predict |
//! | `ResultSink` | save, collect_metric, send_result |

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use treadle_core::domain::RunContext;

use crate::{Frame, Metrics};

/// Parameters a fitted model reports about itself (e.g. `iterations`,
/// `learning_rate`).
pub type ModelParameters = Map<String, Value>;

/// Fetches the raw records for one production lot.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch_records(&self, date: &str, lot_id: &str) -> anyhow::Result<Frame>;
}

/// Data cleaning and feature engineering.
pub trait FeatureOps: Send + Sync {
    /// Drop or repair unusable rows.
    fn clean(&self, data: Frame) -> anyhow::Result<Frame>;

    /// Split cleaned data into `(features, targets)`. Fails on schema mismatch.
    fn engineer(
        &self,
        data: Frame,
        features: &[String],
        targets: &[String],
    ) -> anyhow::Result<(Frame, Frame)>;

    /// Replace datetime columns with derived numeric columns.
    fn expand_datetime(&self, features: Frame) -> anyhow::Result<Frame>;

    /// Replace categorical columns with indicator columns.
    fn one_hot_encode(&self, features: Frame) -> anyhow::Result<Frame>;
}

/// A multi-output regressor.
pub trait Model: Send + Sync {
    fn fit(&mut self, features: &[Vec<f64>], targets: &[Vec<f64>]) -> anyhow::Result<()>;

    /// One row of predictions per feature row, one column per target.
    fn predict(&self, features: &[Vec<f64>]) -> anyhow::Result<Vec<Vec<f64>>>;

    fn parameters(&self) -> ModelParameters;

    /// Serializable snapshot, so the model can travel between tasks.
    fn to_artifact(&self) -> anyhow::Result<ModelArtifact>;
}

/// Creates untrained models and rebuilds fitted ones from artifacts.
pub trait ModelFactory: Send + Sync {
    /// `targets` lets the factory pick a model shape (e.g. output count).
    fn create(&self, targets: &[Vec<f64>]) -> anyhow::Result<Box<dyn Model>>;

    fn restore(&self, artifact: &ModelArtifact) -> anyhow::Result<Box<dyn Model>>;
}

/// A fitted model in transit: a kind tag plus opaque state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub kind: String,
    pub state: Value,
}

/// Where results go: model registry, metric store, result server.
/// Every call returns the remote acknowledgement as JSON.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn persist_model(&self, model_id: &str, model: &ModelArtifact) -> anyhow::Result<Value>;

    async fn log_metric(&self, model_id: &str, metrics: &Metrics) -> anyhow::Result<Value>;

    async fn log_parameter(
        &self,
        model_id: &str,
        parameters: &ModelParameters,
    ) -> anyhow::Result<Value>;

    async fn send_result(
        &self,
        model_id: &str,
        context: &RunContext,
        metrics: &Metrics,
    ) -> anyhow::Result<Value>;
}

/// Every external operation the pipeline needs, shared by its tasks.
#[derive(Clone)]
pub struct TrainingOps {
    pub source: Arc<dyn RecordSource>,
    pub features: Arc<dyn FeatureOps>,
    pub models: Arc<dyn ModelFactory>,
    pub sink: Arc<dyn ResultSink>,
}

impl TrainingOps {
    pub fn new(
        source: impl RecordSource + 'static,
        features: impl FeatureOps + 'static,
        models: impl ModelFactory + 'static,
        sink: impl ResultSink + 'static,
    ) -> Self {
        Self {
            source: Arc::new(source),
            features: Arc::new(features),
            models: Arc::new(models),
            sink: Arc::new(sink),
        }
    }
}

impl fmt::Debug for TrainingOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainingOps").finish_non_exhaustive()
    }
}
