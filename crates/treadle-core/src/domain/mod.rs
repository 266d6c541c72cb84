//! Domain model (names, declarations, outputs, outcomes, errors).

pub mod branch;
pub mod errors;
pub mod ids;
pub mod outcome;
pub mod output;
pub mod params;
pub mod task;

pub use branch::BranchResult;
pub use errors::{HandlerError, RunError, TaskError, ValidationError};
pub use ids::{RunId, TaskName};
pub use outcome::{OutcomeKind, SkipReason, TaskOutcome};
pub use output::{RETURN_VALUE, TaskOutput};
pub use params::{RunContext, RunParams};
pub use task::{Binding, Input, TaskDecl, TaskKind};
