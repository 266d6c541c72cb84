//! Task declarations: what a task consumes, what it produces, how it runs.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use super::TaskName;
use crate::typed::{DynHandler, FnHandler, Handler, TypedHandler};

/// Ordinary tasks produce outputs; a branch task produces a `BranchResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Ordinary,
    Branch,
}

/// Where one input value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A literal run parameter, looked up in the run's initial parameters.
    Param(String),

    /// A field of an upstream task's output. `None` is the single unnamed
    /// output of a producer that declares no fields.
    Output {
        task: TaskName,
        field: Option<String>,
    },

    /// The whole run context: run id, logical date and every parameter.
    RunContext,
}

impl Input {
    pub fn param(name: impl Into<String>) -> Self {
        Input::Param(name.into())
    }

    pub fn field(task: impl Into<TaskName>, field: impl Into<String>) -> Self {
        Input::Output {
            task: task.into(),
            field: Some(field.into()),
        }
    }

    pub fn single(task: impl Into<TaskName>) -> Self {
        Input::Output {
            task: task.into(),
            field: None,
        }
    }

    /// The upstream task this input depends on, if any.
    pub fn producer(&self) -> Option<&TaskName> {
        match self {
            Input::Output { task, .. } => Some(task),
            Input::Param(_) | Input::RunContext => None,
        }
    }
}

/// An input bound to the name the task body sees it under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub input: Input,
}

/// Static declaration of one task.
///
/// ```ignore
/// let train = TaskDecl::typed("train", TrainHandler::new(ops))
///     .input("train_feature", Input::field("data_preprocess", "train_feature"))
///     .input("train_target", Input::field("data_preprocess", "train_target"))
///     .outputs(["model", "model_parameter"]);
/// ```
#[derive(Clone)]
pub struct TaskDecl {
    pub(crate) name: TaskName,
    pub(crate) bindings: Vec<Binding>,
    pub(crate) outputs: BTreeSet<String>,
    pub(crate) after: Vec<TaskName>,
    pub(crate) kind: TaskKind,
    pub(crate) body: Arc<dyn DynHandler>,
}

impl TaskDecl {
    pub fn new(name: impl Into<TaskName>, body: Arc<dyn DynHandler>) -> Self {
        Self {
            name: name.into(),
            bindings: Vec::new(),
            outputs: BTreeSet::new(),
            after: Vec::new(),
            kind: TaskKind::Ordinary,
            body,
        }
    }

    /// Declare a task backed by a typed `Handler`.
    pub fn typed<H: Handler + 'static>(name: impl Into<TaskName>, handler: H) -> Self {
        Self::new(name, Arc::new(TypedHandler::new(handler)))
    }

    /// Declare a task backed by an async closure over its raw JSON inputs.
    pub fn from_fn<F, Fut>(name: impl Into<TaskName>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let name = name.into();
        let handler = FnHandler::new(name.as_str(), f);
        Self::new(name, Arc::new(handler))
    }

    pub fn input(mut self, binding: impl Into<String>, input: Input) -> Self {
        self.bindings.push(Binding {
            name: binding.into(),
            input,
        });
        self
    }

    /// Bind the run parameter `name` under the same name.
    pub fn param(self, name: &str) -> Self {
        self.input(name, Input::param(name))
    }

    pub fn run_context(self, binding: impl Into<String>) -> Self {
        self.input(binding, Input::RunContext)
    }

    pub fn outputs<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Ordering-only dependency: run after `upstream` without reading its output.
    pub fn after(mut self, upstream: impl Into<TaskName>) -> Self {
        self.after.push(upstream.into());
        self
    }

    pub fn branch(mut self) -> Self {
        self.kind = TaskKind::Branch;
        self
    }

    pub fn name(&self) -> &TaskName {
        &self.name
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn declared_outputs(&self) -> &BTreeSet<String> {
        &self.outputs
    }

    pub fn upstream_order(&self) -> &[TaskName] {
        &self.after
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn is_branch(&self) -> bool {
        self.kind == TaskKind::Branch
    }

    pub fn body(&self) -> &Arc<dyn DynHandler> {
        &self.body
    }

    /// Every upstream task, data and control edges alike, without duplicates.
    pub fn upstreams(&self) -> Vec<&TaskName> {
        let mut upstreams: Vec<&TaskName> = Vec::new();
        let producers = self.bindings.iter().filter_map(|b| b.input.producer());
        for name in producers.chain(self.after.iter()) {
            if !upstreams.contains(&name) {
                upstreams.push(name);
            }
        }
        upstreams
    }
}

impl fmt::Debug for TaskDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDecl")
            .field("name", &self.name)
            .field("bindings", &self.bindings)
            .field("outputs", &self.outputs)
            .field("after", &self.after)
            .field("kind", &self.kind)
            .field("body", &self.body.name())
            .finish()
    }
}
