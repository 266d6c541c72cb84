//! App - runs validated graphs.
//!
//! # Components
//! - **Executor**: walks a graph once, launching ready tasks concurrently
//! - **ExecutorConfig**: concurrency and per-task timeout
//! - **CancelHandle / CancelToken**: caller-initiated abort
//! - **RunRecord / RunReport**: what happened, for code and for humans

pub mod cancel;
pub mod config;
pub mod executor;
pub mod record;
pub mod report;

pub use self::cancel::{CancelHandle, CancelToken};
pub use self::config::ExecutorConfig;
pub use self::executor::Executor;
pub use self::record::{BranchDecision, RunRecord, RunStatus};
pub use self::report::{OutcomeCounts, RunReport, TaskLine};
