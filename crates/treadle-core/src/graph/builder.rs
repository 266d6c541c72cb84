//! GraphBuilder - collects declarations and validates them (fail fast).
//!
//! Checks run in a fixed order so the same declarations always produce the
//! same error:
//! 1. empty graph
//! 2. duplicate names, then duplicate input bindings within a task
//! 3. unknown producers and undeclared fields
//! 4. dependency cycles (self references included)
//! 5. forward references
//! 6. branch rules (at most one, no declared outputs)

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::{DependencyGraph, Graph};
use crate::domain::{Input, TaskDecl, TaskName, ValidationError};

/// ```ignore
/// let graph = GraphBuilder::new()
///     .task(TaskDecl::typed("data_collect", Collect::new(source)).param("date"))
///     .task(TaskDecl::typed("data_preprocess", Preprocess::new(ops))
///         .input("raw_data", Input::single("data_collect")))
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct GraphBuilder {
    decls: Vec<TaskDecl>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self { decls: Vec::new() }
    }

    pub fn task(mut self, decl: TaskDecl) -> Self {
        self.decls.push(decl);
        self
    }

    pub fn build(self) -> Result<Graph, ValidationError> {
        let decls = self.decls;
        if decls.is_empty() {
            return Err(ValidationError::EmptyGraph);
        }

        let mut index: HashMap<TaskName, usize> = HashMap::with_capacity(decls.len());
        for (i, decl) in decls.iter().enumerate() {
            if index.insert(decl.name.clone(), i).is_some() {
                return Err(ValidationError::DuplicateTask {
                    name: decl.name.clone(),
                });
            }
        }

        for decl in &decls {
            let mut seen: HashSet<&str> = HashSet::with_capacity(decl.bindings.len());
            if let Some(binding) = decl.bindings.iter().find(|b| !seen.insert(b.name.as_str())) {
                return Err(ValidationError::DuplicateBinding {
                    task: decl.name.clone(),
                    binding: binding.name.clone(),
                });
            }
        }

        let mut deps = DependencyGraph::with_nodes(decls.len());
        for (i, decl) in decls.iter().enumerate() {
            for binding in &decl.bindings {
                if let Input::Output { task, field } = &binding.input {
                    let producer = resolve(&index, &decl.name, task)?;
                    check_field(&decls[producer], &decl.name, field)?;
                    deps.add_dependency(i, producer);
                }
            }
            for upstream in &decl.after {
                let producer = resolve(&index, &decl.name, upstream)?;
                deps.add_dependency(i, producer);
            }
        }

        if let Some(cycle) = deps.detect_cycle() {
            return Err(ValidationError::Cycle {
                path: cycle.into_iter().map(|i| decls[i].name.clone()).collect(),
            });
        }

        for (i, decl) in decls.iter().enumerate() {
            if let Some(&producer) = deps.dependencies(i).iter().find(|&&p| p > i) {
                return Err(ValidationError::ForwardReference {
                    task: decl.name.clone(),
                    producer: decls[producer].name.clone(),
                });
            }
        }

        let mut branch: Option<usize> = None;
        for (i, decl) in decls.iter().enumerate().filter(|(_, d)| d.is_branch()) {
            if let Some(first) = branch {
                return Err(ValidationError::MultipleBranches {
                    first: decls[first].name.clone(),
                    second: decl.name.clone(),
                });
            }
            if !decl.outputs.is_empty() {
                return Err(ValidationError::BranchWithOutputs {
                    task: decl.name.clone(),
                });
            }
            branch = Some(i);
        }

        // Acyclic was checked above, so Kahn's algorithm always succeeds here.
        let order = deps.topological_order().ok_or_else(|| ValidationError::Cycle {
            path: Vec::new(),
        })?;

        debug!(tasks = decls.len(), "graph validated");

        Ok(Graph {
            tasks: decls,
            index,
            deps,
            order,
            branch,
        })
    }
}

fn resolve(
    index: &HashMap<TaskName, usize>,
    task: &TaskName,
    producer: &TaskName,
) -> Result<usize, ValidationError> {
    index
        .get(producer)
        .copied()
        .ok_or_else(|| ValidationError::UnknownTask {
            task: task.clone(),
            producer: producer.clone(),
        })
}

/// A named field must be declared by the producer; the unnamed output is
/// only available from producers that declare no fields.
fn check_field(
    producer: &TaskDecl,
    task: &TaskName,
    field: &Option<String>,
) -> Result<(), ValidationError> {
    let ok = match field {
        Some(f) => producer.outputs.contains(f),
        None => producer.outputs.is_empty(),
    };
    if ok {
        Ok(())
    } else {
        Err(ValidationError::UnknownReference {
            task: task.clone(),
            producer: producer.name.clone(),
            field: field.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn task(name: &str) -> TaskDecl {
        TaskDecl::from_fn(name, |_| async { Ok(json!(null)) })
    }

    fn names(graph: &Graph) -> Vec<&str> {
        graph.topological_order().into_iter().map(|n| n.as_str()).collect()
    }

    #[test]
    fn every_task_comes_after_its_references() {
        let graph = GraphBuilder::new()
            .task(task("collect"))
            .task(
                task("preprocess")
                    .input("raw", Input::single("collect"))
                    .outputs(["train_feature", "test_feature"]),
            )
            .task(task("train").input("x", Input::field("preprocess", "train_feature")))
            .task(
                task("predict")
                    .input("model", Input::single("train"))
                    .input("x", Input::field("preprocess", "test_feature")),
            )
            .build()
            .unwrap();

        let order = names(&graph);
        assert_eq!(order, vec!["collect", "preprocess", "train", "predict"]);
        for decl in graph.tasks() {
            let pos = order.iter().position(|n| *n == decl.name().as_str()).unwrap();
            for up in decl.upstreams() {
                let up_pos = order.iter().position(|n| *n == up.as_str()).unwrap();
                assert!(up_pos < pos, "{up} must run before {}", decl.name());
            }
        }
    }

    #[test]
    fn building_twice_gives_the_same_order() {
        let decls = || {
            vec![
                task("a"),
                task("b"),
                task("c").input("a", Input::single("a")),
                task("d").after("b"),
                task("e").after("c").after("d"),
            ]
        };

        let first = Graph::build(decls()).unwrap();
        let second = Graph::build(decls()).unwrap();
        assert_eq!(names(&first), names(&second));
        assert_eq!(names(&first), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn empty_graph_is_rejected() {
        let err = GraphBuilder::new().build().unwrap_err();
        assert_eq!(err, ValidationError::EmptyGraph);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let err = Graph::build([task("a"), task("a")]).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateTask { name: "a".into() });
    }

    #[test]
    fn input_bound_twice_is_rejected() {
        let err = Graph::build([
            task("a"),
            task("b"),
            task("c")
                .input("x", Input::single("a"))
                .input("x", Input::single("b")),
        ])
        .unwrap_err();

        assert_eq!(
            err,
            ValidationError::DuplicateBinding {
                task: "c".into(),
                binding: "x".into()
            }
        );
    }

    #[test]
    fn duplicate_name_wins_over_duplicate_binding() {
        let err = Graph::build([
            task("a").param("date").param("date"),
            task("a"),
        ])
        .unwrap_err();
        assert_eq!(err, ValidationError::DuplicateTask { name: "a".into() });
    }

    #[test]
    fn mutual_reference_is_a_cycle() {
        let err = Graph::build([
            task("a").input("b", Input::single("b")),
            task("b").input("a", Input::single("a")),
        ])
        .unwrap_err();

        assert_eq!(
            err,
            ValidationError::Cycle {
                path: vec!["a".into(), "b".into(), "a".into()]
            }
        );
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let err = Graph::build([task("a").input("me", Input::single("a"))]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Cycle {
                path: vec!["a".into(), "a".into()]
            }
        );
    }

    #[test]
    fn acyclic_forward_reference_is_rejected() {
        let err = Graph::build([task("a").input("b", Input::single("b")), task("b")]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::ForwardReference {
                task: "a".into(),
                producer: "b".into()
            }
        );
    }

    #[rstest]
    #[case::unknown_task(Input::single("nowhere"), "unknown task")]
    #[case::undeclared_field(Input::field("train", "weights"), "'weights'")]
    #[case::single_from_multi(Input::single("train"), "<single output>")]
    fn bad_reference_is_rejected(#[case] input: Input, #[case] expected: &str) {
        let err = Graph::build([
            task("train").outputs(["model", "model_parameter"]),
            task("predict").input("model", input),
        ])
        .unwrap_err();

        assert!(
            err.to_string().contains(expected),
            "unexpected message: {err}"
        );
    }

    #[test]
    fn unknown_control_edge_is_rejected() {
        let err = Graph::build([task("failure").after("branching")]).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownTask { .. }));
    }

    #[test]
    fn second_branch_is_rejected() {
        let err = Graph::build([task("a").branch(), task("b").branch()]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MultipleBranches {
                first: "a".into(),
                second: "b".into()
            }
        );
    }

    #[test]
    fn branch_with_outputs_is_rejected() {
        let err = Graph::build([task("a").branch().outputs(["x"])]).unwrap_err();
        assert_eq!(err, ValidationError::BranchWithOutputs { task: "a".into() });
    }
}
