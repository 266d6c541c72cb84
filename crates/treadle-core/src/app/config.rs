//! Executor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the executor schedules task bodies.
///
/// ```json
/// { "max_concurrency": 4, "per_task_timeout_ms": 30000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Upper bound on task bodies in flight at once. `1` walks the graph
    /// strictly sequentially; `0` is treated as `1`.
    pub max_concurrency: usize,

    /// Per-task time limit. A body still running after this is recorded as
    /// `Failed(Timeout)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_task_timeout_ms: Option<u64>,
}

impl ExecutorConfig {
    pub fn sequential() -> Self {
        Self {
            max_concurrency: 1,
            ..Self::default()
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_task_timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    pub(crate) fn slots(&self) -> usize {
        self.max_concurrency.max(1)
    }

    pub(crate) fn timeout(&self) -> Option<Duration> {
        self.per_task_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            per_task_timeout_ms: None,
        }
    }
}
