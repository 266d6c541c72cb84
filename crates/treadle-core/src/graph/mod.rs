//! Graph: validated task declarations plus their dependency edges.
//!
//! Built once from static declarations; immutable afterwards. Edges are never
//! stored by the caller, they are derived from input bindings and `after`
//! declarations at build time.

mod builder;
pub mod dependency;

use std::collections::{HashMap, HashSet};

pub use builder::GraphBuilder;
pub use dependency::DependencyGraph;

use crate::domain::{TaskDecl, TaskName, ValidationError};

#[derive(Debug, Clone)]
pub struct Graph {
    /// Declarations, in declaration order.
    tasks: Vec<TaskDecl>,

    /// name -> declaration index
    index: HashMap<TaskName, usize>,

    deps: DependencyGraph,

    /// Declaration indices in execution order.
    order: Vec<usize>,

    /// Index of the branch task, if the graph has one.
    branch: Option<usize>,
}

impl Graph {
    /// Validate `decls` and build the graph.
    pub fn build(decls: impl IntoIterator<Item = TaskDecl>) -> Result<Self, ValidationError> {
        decls
            .into_iter()
            .fold(GraphBuilder::new(), GraphBuilder::task)
            .build()
    }

    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn task(&self, name: &str) -> Option<&TaskDecl> {
        self.index.get(name).map(|&i| &self.tasks[i])
    }

    /// Declarations in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskDecl> {
        self.tasks.iter()
    }

    /// Task names in execution order.
    pub fn topological_order(&self) -> Vec<&TaskName> {
        self.order.iter().map(|&i| &self.tasks[i].name).collect()
    }

    pub fn branch_task(&self) -> Option<&TaskDecl> {
        self.branch.map(|i| &self.tasks[i])
    }

    /// Direct upstream tasks of `name`.
    pub fn dependencies(&self, name: &str) -> Vec<&TaskName> {
        self.names(self.index.get(name).map(|&i| self.deps.dependencies(i)))
    }

    /// Direct downstream tasks of `name`.
    pub fn dependents(&self, name: &str) -> Vec<&TaskName> {
        self.names(self.index.get(name).map(|&i| self.deps.dependents(i)))
    }

    /// All transitive downstream tasks of `name`, breadth first.
    pub fn descendants(&self, name: &str) -> Vec<&TaskName> {
        let found = self.index.get(name).map(|&i| self.deps.descendants(i));
        self.names(found.as_deref())
    }

    /// All transitive upstream tasks of `name`, breadth first.
    pub fn ancestors(&self, name: &str) -> Vec<&TaskName> {
        let found = self.index.get(name).map(|&i| self.deps.ancestors(i));
        self.names(found.as_deref())
    }

    /// The branch task and all of its ancestors: the part of the graph that
    /// runs before any routing decision. Without a branch, every task.
    pub fn root_sequence(&self) -> HashSet<TaskName> {
        match self.branch {
            Some(b) => std::iter::once(b)
                .chain(self.deps.ancestors(b))
                .map(|i| self.tasks[i].name.clone())
                .collect(),
            None => self.tasks.iter().map(|t| t.name.clone()).collect(),
        }
    }

    pub(crate) fn decl(&self, index: usize) -> &TaskDecl {
        &self.tasks[index]
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn order_indices(&self) -> &[usize] {
        &self.order
    }

    pub(crate) fn edges(&self) -> &DependencyGraph {
        &self.deps
    }

    fn names(&self, indices: Option<&[usize]>) -> Vec<&TaskName> {
        indices
            .unwrap_or_default()
            .iter()
            .map(|&i| &self.tasks[i].name)
            .collect()
    }
}
