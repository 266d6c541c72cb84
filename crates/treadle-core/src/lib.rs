//! treadle-core
//!
//! Declarative task-graph execution: declare tasks with typed inputs and
//! outputs, validate them into a `Graph` once, then run the graph as many
//! times as needed with an `Executor`.
//!
//! # Modules
//! - **domain**: task declarations, outputs, outcomes, errors, run parameters
//! - **graph**: validation, topological order, dependency queries
//! - **typed**: task body traits (`Handler`, `DynHandler`)
//! - **app**: executor, cancellation, run record and report
//! - **ports**: clock and id generation
//!
//! ```ignore
//! let graph = Graph::build([
//!     TaskDecl::typed("data_collect", Collect::new(source)).param("date").param("lot_id"),
//!     TaskDecl::typed("data_preprocess", Preprocess::new(ops))
//!         .input("raw_data", Input::single("data_collect"))
//!         .outputs(["train_feature", "test_feature", "train_target", "test_target"]),
//! ])?;
//!
//! let record = Executor::new(ExecutorConfig::default())
//!     .run(&graph, RunParams::default().with_param("date", "2024-01-01"))
//!     .await;
//! ```

pub mod app;
pub mod domain;
pub mod graph;
pub mod ports;
pub mod typed;

pub use app::{
    CancelHandle, CancelToken, Executor, ExecutorConfig, RunRecord, RunReport, RunStatus,
};
pub use domain::{
    BranchResult, Input, RunError, RunParams, SkipReason, TaskDecl, TaskError, TaskName,
    TaskOutcome, TaskOutput, ValidationError,
};
pub use graph::Graph;
pub use typed::Handler;
