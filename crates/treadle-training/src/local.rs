//! Local implementations of the training ports.
//!
//! Good enough to run the pipeline end to end without any external system:
//! - **InMemorySource**: serves one fixed frame
//! - **FrameFeatureOps**: null-row cleaning, datetime expansion, one-hot
//! - **MeanRegressor**: predicts the per-column training mean
//! - **RecordingSink**: logs every call and keeps it for inspection

use std::collections::BTreeSet;
use std::sync::Mutex;

use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde_json::{Value, json};
use tracing::{debug, info};
use treadle_core::domain::RunContext;

use crate::ports::{
    FeatureOps, Model, ModelArtifact, ModelFactory, ModelParameters, RecordSource, ResultSink,
};
use crate::{Frame, Metrics};

// source

pub struct InMemorySource {
    frame: Frame,
}

impl InMemorySource {
    pub fn new(frame: Frame) -> Self {
        Self { frame }
    }
}

#[async_trait]
impl RecordSource for InMemorySource {
    async fn fetch_records(&self, date: &str, lot_id: &str) -> anyhow::Result<Frame> {
        debug!(date, lot_id, rows = self.frame.len(), "serving in-memory records");
        Ok(self.frame.clone())
    }
}

// features

/// Feature operations over plain frames.
///
/// - `clean` drops rows holding a `null`
/// - `expand_datetime` turns every column whose name contains `datetime`
///   into `_year`, `_month`, `_day`, `_hour`, `_minute`, `_weekday`
/// - `one_hot_encode` turns every column holding strings into one `0/1`
///   column per distinct value, named `{column}_{value}`
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameFeatureOps;

impl FeatureOps for FrameFeatureOps {
    fn clean(&self, data: Frame) -> anyhow::Result<Frame> {
        let before = data.len();
        let data = data.filter_rows(|row| row.iter().all(|v| !v.is_null()));
        debug!(dropped = before - data.len(), "cleaned");
        Ok(data)
    }

    fn engineer(
        &self,
        data: Frame,
        features: &[String],
        targets: &[String],
    ) -> anyhow::Result<(Frame, Frame)> {
        Ok((data.select(features)?, data.select(targets)?))
    }

    fn expand_datetime(&self, features: Frame) -> anyhow::Result<Frame> {
        let datetime_columns: Vec<String> = features
            .columns()
            .iter()
            .filter(|c| c.contains("datetime"))
            .cloned()
            .collect();

        let mut frame = features;
        for column in datetime_columns {
            let parsed = frame
                .column(&column)?
                .into_iter()
                .enumerate()
                .map(|(row, v)| {
                    parse_datetime(v).with_context(|| format!("column '{column}' row {row}"))
                })
                .collect::<anyhow::Result<Vec<NaiveDateTime>>>()?;

            let parts: [(&str, fn(&NaiveDateTime) -> u32); 6] = [
                ("year", |d| d.year().max(0) as u32),
                ("month", |d| d.month()),
                ("day", |d| d.day()),
                ("hour", |d| d.hour()),
                ("minute", |d| d.minute()),
                ("weekday", |d| d.weekday().num_days_from_monday()),
            ];
            frame = frame.without_column(&column)?;
            for (suffix, part) in parts {
                let values = parsed.iter().map(|d| json!(part(d))).collect();
                frame = frame.with_column(format!("{column}_{suffix}"), values)?;
            }
        }
        Ok(frame)
    }

    fn one_hot_encode(&self, features: Frame) -> anyhow::Result<Frame> {
        let mut columns: Vec<String> = Vec::new();
        let mut encoders: Vec<Encoder> = Vec::new();

        for (i, name) in features.columns().iter().enumerate() {
            let categorical = features.rows().iter().any(|r| r[i].is_string());
            if !categorical {
                columns.push(name.clone());
                encoders.push(Encoder::Keep(i));
                continue;
            }
            let levels: BTreeSet<String> = features
                .rows()
                .iter()
                .filter(|r| !r[i].is_null())
                .map(|r| level(&r[i]))
                .collect();
            columns.extend(levels.iter().map(|l| format!("{name}_{l}")));
            encoders.push(Encoder::OneHot(i, levels.into_iter().collect()));
        }

        let rows = features
            .rows()
            .iter()
            .map(|row| {
                let mut out = Vec::with_capacity(columns.len());
                for encoder in &encoders {
                    match encoder {
                        Encoder::Keep(i) => out.push(row[*i].clone()),
                        Encoder::OneHot(i, levels) => {
                            let value = (!row[*i].is_null()).then(|| level(&row[*i]));
                            out.extend(levels.iter().map(|l| {
                                json!(if value.as_ref() == Some(l) { 1.0 } else { 0.0 })
                            }));
                        }
                    }
                }
                out
            })
            .collect();

        Ok(Frame::new(columns, rows)?)
    }
}

enum Encoder {
    Keep(usize),
    OneHot(usize, Vec<String>),
}

fn level(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_datetime(value: &Value) -> anyhow::Result<NaiveDateTime> {
    let s = value
        .as_str()
        .ok_or_else(|| anyhow!("expected a datetime string, got {value}"))?;

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(date) => date.and_hms_opt(0, 0, 0).context("midnight"),
        Err(_) => bail!("unrecognised datetime '{s}'"),
    }
}

// model

pub const MEAN_REGRESSOR: &str = "mean_regressor";

/// Predicts the training mean of every target column.
#[derive(Debug, Clone, Default)]
pub struct MeanRegressor {
    means: Option<Vec<f64>>,
}

impl Model for MeanRegressor {
    fn fit(&mut self, _features: &[Vec<f64>], targets: &[Vec<f64>]) -> anyhow::Result<()> {
        let Some(first) = targets.first() else {
            bail!("cannot fit on zero rows");
        };
        let n = targets.len() as f64;
        let means = (0..first.len())
            .map(|c| targets.iter().map(|r| r[c]).sum::<f64>() / n)
            .collect();
        self.means = Some(means);
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> anyhow::Result<Vec<Vec<f64>>> {
        let means = self.means.as_ref().context("model is not fitted")?;
        Ok(vec![means.clone(); features.len()])
    }

    fn parameters(&self) -> ModelParameters {
        let mut params = ModelParameters::new();
        params.insert("strategy".into(), json!("mean"));
        params.insert(
            "outputs".into(),
            json!(self.means.as_ref().map_or(0, Vec::len)),
        );
        params
    }

    fn to_artifact(&self) -> anyhow::Result<ModelArtifact> {
        Ok(ModelArtifact {
            kind: MEAN_REGRESSOR.to_string(),
            state: json!({ "means": self.means }),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MeanRegressorFactory;

impl ModelFactory for MeanRegressorFactory {
    fn create(&self, _targets: &[Vec<f64>]) -> anyhow::Result<Box<dyn Model>> {
        Ok(Box::new(MeanRegressor::default()))
    }

    fn restore(&self, artifact: &ModelArtifact) -> anyhow::Result<Box<dyn Model>> {
        if artifact.kind != MEAN_REGRESSOR {
            bail!("unsupported model kind '{}'", artifact.kind);
        }
        let means: Option<Vec<f64>> = serde_json::from_value(artifact.state["means"].clone())
            .context("decode mean_regressor state")?;
        Ok(Box::new(MeanRegressor { means }))
    }
}

// sink

/// Accepts everything, logs it, and remembers which calls were made.
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls made so far, as `"{operation}:{model_id}"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn ack(&self, operation: &str, model_id: &str, payload: Value) -> Value {
        info!(operation, model_id, %payload, "result sink");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(format!("{operation}:{model_id}"));
        }
        json!({ "status": "ok", "operation": operation, "model_id": model_id })
    }
}

#[async_trait]
impl ResultSink for RecordingSink {
    async fn persist_model(&self, model_id: &str, model: &ModelArtifact) -> anyhow::Result<Value> {
        Ok(self.ack("persist_model", model_id, json!({ "kind": model.kind })))
    }

    async fn log_metric(&self, model_id: &str, metrics: &Metrics) -> anyhow::Result<Value> {
        Ok(self.ack("log_metric", model_id, serde_json::to_value(metrics)?))
    }

    async fn log_parameter(
        &self,
        model_id: &str,
        parameters: &ModelParameters,
    ) -> anyhow::Result<Value> {
        Ok(self.ack("log_parameter", model_id, Value::Object(parameters.clone())))
    }

    async fn send_result(
        &self,
        model_id: &str,
        context: &RunContext,
        metrics: &Metrics,
    ) -> anyhow::Result<Value> {
        let payload = json!({ "run_id": context.run_id, "metrics": metrics });
        Ok(self.ack("send_result", model_id, payload))
    }
}
