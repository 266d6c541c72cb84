//! treadle-training
//!
//! The model-training pipeline on top of `treadle-core`: collect lot
//! records, preprocess, train, predict, evaluate, then route on the error
//! metric to either the save/report path or the failure report.
//!
//! # Modules
//! - **pipeline**: the graph declaration (`model_training`)
//! - **tasks**: one typed handler per task
//! - **ports**: external operations (record source, features, models, sink)
//! - **local**: in-process implementations of the ports
//! - **frame / split / metrics / branch**: the data plumbing the tasks use

pub mod branch;
pub mod config;
pub mod error;
pub mod frame;
pub mod local;
pub mod metrics;
pub mod pipeline;
pub mod ports;
pub mod split;
pub mod tasks;

pub use config::{TrainingConfig, TrainingParams};
pub use error::TrainingError;
pub use frame::Frame;
pub use metrics::Metrics;
pub use pipeline::model_training;
pub use ports::{
    FeatureOps, Model, ModelArtifact, ModelFactory, RecordSource, ResultSink, TrainingOps,
};
pub use split::Split;
