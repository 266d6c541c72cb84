//! Executor - walks a validated graph once and records every outcome.
//!
//! # Scheduling
//! - the coordinator (this module) is the only writer of the outcome table
//! - a task is launched once all of its upstreams are terminal and every one
//!   of them `Completed`; otherwise it is recorded `Skipped`
//! - ready tasks run as spawned tokio tasks, at most `max_concurrency` at once
//! - a failure never cancels siblings; it only skips its downstream cone
//!
//! # Skip propagation
//! - `Failed(t)`: every descendant of `t` becomes `Skipped(UpstreamFailed)`
//! - branch decision: direct dependents that are neither selected nor an
//!   ancestor of a selected task become `Skipped(BranchNotTaken)`, their
//!   descendants `Skipped(UpstreamSkipped)`
//! - the first recorded outcome of a task is final

use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, info_span, warn};

use super::{BranchDecision, CancelToken, ExecutorConfig, RunRecord};
use crate::domain::{
    BranchResult, Input, RETURN_VALUE, RunContext, RunParams, SkipReason, TaskError, TaskName,
    TaskOutcome, TaskOutput,
};
use crate::graph::Graph;
use crate::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};

/// Runs graphs. Holds no per-run state, so one executor can serve any
/// number of sequential or concurrent runs.
pub struct Executor {
    config: ExecutorConfig,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    pub fn with_clock(config: ExecutorConfig, clock: impl Clock + 'static) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(clock);
        let ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        Self { config, clock, ids }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub async fn run(&self, graph: &Graph, params: RunParams) -> RunRecord {
        self.run_with_cancel(graph, params, CancelToken::never()).await
    }

    /// Run `graph` once. Task failures never surface as an error here; they
    /// are recorded and the run carries on with whatever is still runnable.
    pub async fn run_with_cancel(
        &self,
        graph: &Graph,
        params: RunParams,
        cancel: CancelToken,
    ) -> RunRecord {
        let started_at = self.clock.now();
        let context = Arc::new(RunContext {
            run_id: params.run_id.unwrap_or_else(|| self.ids.generate_run_id()),
            logical_date: params.logical_date.unwrap_or(started_at),
            params: params.parameters,
        });

        let span = info_span!("run", run_id = %context.run_id, tasks = graph.len());
        let mut run = Run::new(graph, &self.config, context, cancel);
        run.drive().instrument(span.clone()).await;

        let finished_at = self.clock.now();
        let record = run.into_record(started_at, finished_at);
        span.in_scope(|| info!(status = ?record.status(), "run finished"));
        record
    }
}

/// Result of one task body, reported back to the coordinator.
type Finished = (usize, Result<Value, TaskError>);

/// Per-run mutable state. Owned by the coordinator future; never shared.
struct Run<'g> {
    graph: &'g Graph,
    config: &'g ExecutorConfig,
    context: Arc<RunContext>,
    cancel: CancelToken,

    /// Outcome per declaration index.
    outcomes: Vec<Option<TaskOutcome>>,
    launched: Vec<bool>,
    in_flight: JoinSet<Finished>,
    decision: Option<BranchDecision>,
}

impl<'g> Run<'g> {
    fn new(
        graph: &'g Graph,
        config: &'g ExecutorConfig,
        context: Arc<RunContext>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            graph,
            config,
            context,
            cancel,
            outcomes: vec![None; graph.len()],
            launched: vec![false; graph.len()],
            in_flight: JoinSet::new(),
            decision: None,
        }
    }

    async fn drive(&mut self) {
        loop {
            self.schedule();

            let Some(joined) = self.in_flight.join_next().await else {
                break;
            };
            match joined {
                Ok((index, result)) => self.finish(index, result),
                // The supervising future only awaits the body's own handle,
                // so it cannot panic; this arm is unreachable in practice.
                Err(e) => warn!(error = %e, "task supervisor did not complete"),
            }
        }

        // Anything still undecided could not be reached (its supervisor was
        // lost above). Record it rather than leave a hole in the record.
        for index in 0..self.outcomes.len() {
            if self.outcomes[index].is_none() {
                self.record(index, TaskOutcome::Skipped(SkipReason::Cancelled));
            }
        }
    }

    /// One pass over the topological order: decide skips, launch what is
    /// ready while slots remain.
    fn schedule(&mut self) {
        let order = self.graph.order_indices();
        for &index in order {
            if self.outcomes[index].is_some() || self.launched[index] {
                continue;
            }

            let deps = self.graph.edges().dependencies(index);
            if deps.iter().any(|&d| self.outcomes[d].is_none()) {
                continue;
            }

            let blocked = deps.iter().find_map(|&d| match &self.outcomes[d] {
                Some(TaskOutcome::Failed(_)) => Some(SkipReason::UpstreamFailed {
                    task: self.graph.decl(d).name.clone(),
                }),
                Some(TaskOutcome::Skipped(_)) => Some(SkipReason::UpstreamSkipped {
                    task: self.graph.decl(d).name.clone(),
                }),
                _ => None,
            });
            if let Some(reason) = blocked {
                self.record(index, TaskOutcome::Skipped(reason));
                continue;
            }

            if self.cancel.is_cancelled() {
                self.record(index, TaskOutcome::Skipped(SkipReason::Cancelled));
                continue;
            }

            if self.in_flight.len() >= self.config.slots() {
                // Later tasks in the order may still be skippable, keep going.
                continue;
            }

            match self.resolve_inputs(index) {
                Ok(inputs) => self.launch(index, inputs),
                Err(e) => self.fail(index, e),
            }
        }
    }

    fn resolve_inputs(&self, index: usize) -> Result<Value, TaskError> {
        let decl = self.graph.decl(index);
        let mut inputs = Map::new();

        for binding in &decl.bindings {
            let unresolved = |reason: String| TaskError::InputResolution {
                task: decl.name.clone(),
                binding: binding.name.clone(),
                reason,
            };

            let value = match &binding.input {
                Input::Param(name) => self
                    .context
                    .params
                    .get(name)
                    .cloned()
                    .ok_or_else(|| unresolved(format!("run parameter '{name}' not supplied")))?,

                Input::Output { task, field } => {
                    let output = self
                        .graph
                        .index_of(task.as_str())
                        .and_then(|p| self.outcomes[p].as_ref())
                        .and_then(TaskOutcome::output)
                        .ok_or_else(|| unresolved(format!("'{task}' has no completed output")))?;
                    let key = field.as_deref().unwrap_or(RETURN_VALUE);
                    output
                        .get(key)
                        .cloned()
                        .ok_or_else(|| unresolved(format!("'{task}' did not produce '{key}'")))?
                }

                Input::RunContext => serde_json::to_value(self.context.as_ref())
                    .map_err(|e| unresolved(e.to_string()))?,
            };
            inputs.insert(binding.name.clone(), value);
        }

        Ok(Value::Object(inputs))
    }

    fn launch(&mut self, index: usize, inputs: Value) {
        let decl = self.graph.decl(index);
        let name = decl.name.clone();
        let body = Arc::clone(&decl.body);
        let timeout = self.config.timeout();
        self.launched[index] = true;

        let span = info_span!("task", task = %name);
        span.in_scope(|| debug!(body = body.name(), "launching"));

        self.in_flight.spawn(
            async move {
                let mut handle = tokio::spawn(
                    async move { body.handle_dyn(inputs).await }.in_current_span(),
                );

                let joined = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            handle.abort();
                            return (
                                index,
                                Err(TaskError::Timeout {
                                    task: name,
                                    after_ms: limit.as_millis().try_into().unwrap_or(u64::MAX),
                                }),
                            );
                        }
                    },
                    None => handle.await,
                };

                let result = match joined {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => Err(e.into_task_error(&name)),
                    Err(e) if e.is_panic() => Err(TaskError::Panicked {
                        reason: panic_message(e.into_panic()),
                        task: name,
                    }),
                    Err(e) => Err(TaskError::Panicked {
                        reason: e.to_string(),
                        task: name,
                    }),
                };
                (index, result)
            }
            .instrument(span),
        );
    }

    fn finish(&mut self, index: usize, result: Result<Value, TaskError>) {
        let decl = self.graph.decl(index);
        let outcome = result.and_then(|value| {
            if decl.is_branch() {
                self.decide_branch(index, value)
            } else {
                TaskOutput::from_declared(&decl.name, &decl.outputs, value)
            }
        });

        match outcome {
            Ok(output) => {
                info!(task = %decl.name, "completed");
                self.record(index, TaskOutcome::Completed(output));
                if decl.is_branch() {
                    self.skip_not_taken(index);
                }
            }
            Err(e) => self.fail(index, e),
        }
    }

    /// Decode and validate a branch selection. Every selected name must be a
    /// direct dependent of the branch task.
    fn decide_branch(&mut self, index: usize, value: Value) -> Result<TaskOutput, TaskError> {
        let decl = self.graph.decl(index);
        let selected: BranchResult =
            serde_json::from_value(value.clone()).map_err(|e| TaskError::Decode {
                task: decl.name.clone(),
                reason: e.to_string(),
            })?;

        let dependents = self.graph.edges().dependents(index);
        let unknown: Vec<TaskName> = selected
            .iter()
            .filter(|name| {
                self.graph
                    .index_of(name.as_str())
                    .is_none_or(|i| !dependents.contains(&i))
            })
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(TaskError::InvalidBranch {
                task: decl.name.clone(),
                unknown,
            });
        }

        let mut happy_path: Vec<TaskName> = Vec::new();
        for name in selected.iter() {
            if let Some(i) = self.graph.index_of(name.as_str()) {
                let cone = std::iter::once(i).chain(self.graph.edges().descendants(i));
                for j in cone {
                    let task = &self.graph.decl(j).name;
                    if !happy_path.contains(task) {
                        happy_path.push(task.clone());
                    }
                }
            }
        }

        info!(task = %decl.name, selected = ?selected, "branch decided");
        self.decision = Some(BranchDecision {
            task: decl.name.clone(),
            selected,
            happy_path,
        });
        Ok(TaskOutput::single(value))
    }

    fn skip_not_taken(&mut self, branch: usize) {
        let Some(decision) = &self.decision else {
            return;
        };
        let edges = self.graph.edges();

        let mut keep: HashSet<usize> = HashSet::new();
        for name in decision.selected.iter() {
            if let Some(i) = self.graph.index_of(name.as_str()) {
                keep.insert(i);
                keep.extend(edges.ancestors(i));
            }
        }

        let branch_name = self.graph.decl(branch).name.clone();
        let not_taken: Vec<usize> = edges
            .dependents(branch)
            .iter()
            .copied()
            .filter(|d| !keep.contains(d))
            .collect();

        for d in not_taken {
            self.record(
                d,
                TaskOutcome::Skipped(SkipReason::BranchNotTaken {
                    branch: branch_name.clone(),
                }),
            );
            let skipped = self.graph.decl(d).name.clone();
            self.skip_descendants(d, |_| SkipReason::UpstreamSkipped {
                task: skipped.clone(),
            });
        }
    }

    fn fail(&mut self, index: usize, error: TaskError) {
        warn!(task = %self.graph.decl(index).name, error = %error, "failed");
        self.record(index, TaskOutcome::Failed(error));

        let failed = self.graph.decl(index).name.clone();
        self.skip_descendants(index, |_| SkipReason::UpstreamFailed {
            task: failed.clone(),
        });
    }

    /// Breadth-first over the downstream cone of `index`; tasks that already
    /// have an outcome keep it.
    fn skip_descendants(&mut self, index: usize, reason: impl Fn(usize) -> SkipReason) {
        let mut queue = VecDeque::from([index]);
        let mut seen = vec![false; self.outcomes.len()];
        seen[index] = true;

        while let Some(node) = queue.pop_front() {
            for &next in self.graph.edges().dependents(node) {
                if seen[next] {
                    continue;
                }
                seen[next] = true;
                if !self.launched[next] {
                    self.record(next, TaskOutcome::Skipped(reason(next)));
                }
                queue.push_back(next);
            }
        }
    }

    /// Write an outcome unless one is already recorded.
    fn record(&mut self, index: usize, outcome: TaskOutcome) {
        let slot = &mut self.outcomes[index];
        if slot.is_some() {
            return;
        }
        if let TaskOutcome::Skipped(reason) = &outcome {
            debug!(task = %self.graph.decl(index).name, ?reason, "skipped");
        }
        *slot = Some(outcome);
    }

    fn into_record(
        self,
        started_at: chrono::DateTime<chrono::Utc>,
        finished_at: chrono::DateTime<chrono::Utc>,
    ) -> RunRecord {
        let graph = self.graph;
        let mut outcomes = self.outcomes;
        let entries = graph
            .order_indices()
            .iter()
            .map(|&i| {
                let outcome = outcomes[i]
                    .take()
                    .unwrap_or(TaskOutcome::Skipped(SkipReason::Cancelled));
                (graph.decl(i).name.clone(), outcome)
            })
            .collect();

        RunRecord::new(
            self.context.run_id,
            started_at,
            finished_at,
            entries,
            graph.branch_task().map(|t| t.name.clone()),
            self.decision,
            graph.root_sequence(),
        )
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
