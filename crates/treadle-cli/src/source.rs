//! Record source backed by a JSON file.

use std::path::PathBuf;

use anyhow::{Context, bail};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use treadle_training::{Frame, RecordSource};

/// Serves the same file for every lot. Accepts either a frame
/// (`{"columns": [...], "rows": [...]}`) or an array of record objects.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RecordSource for JsonFileSource {
    async fn fetch_records(&self, date: &str, lot_id: &str) -> anyhow::Result<Frame> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("read {}", self.path.display()))?;
        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("parse {}", self.path.display()))?;

        let frame = parse_records(value)?;
        debug!(date, lot_id, rows = frame.len(), path = %self.path.display(), "loaded records");
        Ok(frame)
    }
}

fn parse_records(value: Value) -> anyhow::Result<Frame> {
    match value {
        Value::Array(records) => Ok(Frame::from_records(records)?),
        object @ Value::Object(_) => Ok(serde_json::from_value(object)?),
        other => bail!("expected a frame object or an array of records, got {other}"),
    }
}
