//! Config and parameter files.
//!
//! ```json
//! {
//!   "executor": { "max_concurrency": 2, "per_task_timeout_ms": 60000 },
//!   "training": { "mse_threshold": 50.0, "test_size": 0.2, "seed": 42 }
//! }
//! ```
//!
//! Every key is optional. A missing file argument means all defaults.

use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use treadle_core::ExecutorConfig;
use treadle_training::{TrainingConfig, TrainingParams};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub executor: ExecutorConfig,
    pub training: TrainingConfig,
}

impl CliConfig {
    pub async fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        read_json_or_default(path).await
    }
}

/// Run parameters; unset keys fall back to the production defaults.
pub async fn load_params(path: Option<&Path>) -> anyhow::Result<TrainingParams> {
    read_json_or_default(path).await
}

async fn read_json_or_default<T: DeserializeOwned + Default>(
    path: Option<&Path>,
) -> anyhow::Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file_with(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn missing_path_means_defaults() {
        assert_eq!(CliConfig::load(None).await.unwrap(), CliConfig::default());
    }

    #[tokio::test]
    async fn partial_config_keeps_other_defaults() {
        let file = file_with(r#"{"executor": {"max_concurrency": 1}}"#);

        let config = CliConfig::load(Some(file.path())).await.unwrap();
        assert_eq!(config.executor, ExecutorConfig::sequential());
        assert_eq!(config.training, TrainingConfig::default());
    }

    #[tokio::test]
    async fn params_override_only_given_keys() {
        let file = file_with(r#"{"lot_id": "LOT-7", "targets_name": ["loop_height"]}"#);

        let params = load_params(Some(file.path())).await.unwrap();
        assert_eq!(params.lot_id, "LOT-7");
        assert_eq!(params.targets_name, vec!["loop_height".to_string()]);
        assert_eq!(params.model_id, TrainingParams::default().model_id);
    }

    #[tokio::test]
    async fn malformed_file_names_the_path() {
        let file = file_with("{ not json");

        let err = CliConfig::load(Some(file.path())).await.unwrap_err();
        assert!(err.to_string().starts_with("parse "));
    }
}
