use crate::executions::RunHandle;
use crate::registry::NodeRegistry;
use crate::runtime::RuntimeConfig;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use ledgercore::{
    Branch, EventBus, ExecutionEvent, ExecutionStatus, FlowError, NodeContext, NodeError,
    NodeExecution, NodeExecutor, NodeOutput, NodeSpec, NodeType, Workflow, WorkflowError,
    WorkflowGraph,
};
use petgraph::graph::NodeIndex;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};

/// Runs workflows as dependency-counted DAGs with bounded parallelism
pub struct WorkflowExecutor {
    max_parallel: usize,
    default_timeout: Duration,
    node_timeouts: HashMap<NodeType, Duration>,
}

impl WorkflowExecutor {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            max_parallel: config.max_parallel_nodes.max(1),
            default_timeout: config.default_node_timeout,
            node_timeouts: config.node_timeouts.clone(),
        }
    }

    /// Drive a registered run until nothing is running or eligible. The
    /// workflow must already have passed validation.
    ///
    /// Never fails: every error ends up in the run record.
    pub async fn drive(
        &self,
        workflow: &Workflow,
        registry: &NodeRegistry,
        event_bus: &EventBus,
        run: &RunHandle,
        seed: Value,
    ) {
        let execution_id = run.id();
        let start_time = Instant::now();
        let (triggered_by, trigger_node) = run
            .update(|e| (e.triggered_by.clone(), e.trigger_node.clone()))
            .await;

        event_bus.emit(ExecutionEvent::WorkflowStarted {
            execution_id,
            workflow_id: workflow.id,
            triggered_by,
            timestamp: Utc::now(),
        });

        tracing::info!(
            "Starting execution {} of workflow '{}' ({})",
            execution_id,
            workflow.name,
            workflow.id
        );

        let (status, error) = match self
            .execute_dag(workflow, registry, event_bus, run, seed, trigger_node)
            .await
        {
            Ok(None) => (ExecutionStatus::Completed, None),
            Ok(Some(failure)) => (ExecutionStatus::Failed, Some(failure)),
            Err(e) => {
                tracing::error!("Execution {} aborted: {}", execution_id, e);
                (ExecutionStatus::Failed, Some(e.to_string()))
            }
        };

        run.update(|e| e.finish(status, error)).await;
        let status = run.status().await;
        let duration_ms = start_time.elapsed().as_millis() as u64;

        event_bus.emit(ExecutionEvent::WorkflowFinished {
            execution_id,
            status,
            duration_ms,
            timestamp: Utc::now(),
        });

        tracing::info!(
            "Execution {} finished as {} in {}ms",
            execution_id,
            status,
            duration_ms
        );
    }

    /// Returns the first failure of a non-optional node, if any
    async fn execute_dag(
        &self,
        workflow: &Workflow,
        registry: &NodeRegistry,
        event_bus: &EventBus,
        run: &RunHandle,
        seed: Value,
        trigger_node: Option<String>,
    ) -> Result<Option<String>, FlowError> {
        let graph = WorkflowGraph::new(workflow);
        let plan = Plan::resolve(workflow, &graph, registry)?;
        let max_parallel = workflow
            .settings
            .max_parallel_nodes
            .unwrap_or(self.max_parallel)
            .max(1);

        let mut schedule = Schedule::new(&graph);
        let mut outputs: HashMap<NodeIndex, Value> = HashMap::new();
        let mut failure: Option<String> = None;
        let mut running = FuturesUnordered::new();

        let seeded = match &trigger_node {
            Some(id) => {
                let idx = graph
                    .index_of(id)
                    .ok_or_else(|| WorkflowError::NodeNotFound(id.clone()))?;
                let unreachable = schedule.seed_trigger(idx);
                self.record_skipped(&plan, &unreachable, event_bus, run).await;
                Some(idx)
            }
            None => {
                schedule.seed_roots();
                None
            }
        };

        loop {
            while running.len() < max_parallel && !run.is_cancelled() {
                let Some(idx) = schedule.next_ready() else {
                    break;
                };
                let step = &plan.steps[idx.index()];

                let inputs = if graph.in_degree(idx) == 0 || seeded == Some(idx) {
                    let mut inputs = Map::new();
                    inputs.insert("input".to_string(), seed.clone());
                    inputs
                } else {
                    graph
                        .predecessors(idx)
                        .into_iter()
                        .filter_map(|pred| {
                            outputs
                                .get(&pred)
                                .map(|out| (graph.node_id(pred).clone(), out.clone()))
                        })
                        .collect()
                };

                run.update(|e| {
                    e.node_executions.push(NodeExecution::started(
                        step.spec.id.clone(),
                        step.spec.node_type.clone(),
                        Value::Object(inputs.clone()),
                    ))
                })
                .await;

                event_bus.emit(ExecutionEvent::NodeStarted {
                    execution_id: run.id(),
                    node_id: step.spec.id.clone(),
                    node_type: step.spec.node_type.to_string(),
                    timestamp: Utc::now(),
                });
                tracing::debug!("Dispatching node {} ({})", step.spec.id, step.spec.node_type);

                let ctx = NodeContext::new(
                    step.spec.id.clone(),
                    event_bus.create_emitter(run.id(), step.spec.id.clone()),
                )
                .with_inputs(inputs)
                .with_config(step.spec.config.clone());

                let executor = step.executor.clone();
                let limit = self.timeout_for(workflow, step);
                let task = tokio::spawn(async move {
                    let start = Instant::now();
                    let result = run_node(executor, ctx, limit).await;
                    (result, start.elapsed().as_millis() as u64)
                });
                running.push(task.map(move |joined| (idx, joined)));
            }

            // Nothing running and nothing eligible: the run is over
            if running.is_empty() {
                break;
            }

            let Some((idx, joined)) = running.next().await else {
                break;
            };
            let (result, duration_ms) = joined.unwrap_or_else(|e| {
                (
                    Err(NodeError::ExecutionFailed(format!("task join error: {}", e))),
                    0,
                )
            });
            let spec = plan.steps[idx.index()].spec;

            let skipped = match result {
                Ok(output) => {
                    tracing::info!("Node {} completed in {}ms", spec.id, duration_ms);
                    let branch = output.branch;
                    let value = output.into_value();
                    run.update(|e| {
                        if let Some(node) = e.node_mut(&spec.id) {
                            node.complete(value.clone());
                        }
                    })
                    .await;
                    event_bus.emit(ExecutionEvent::NodeCompleted {
                        execution_id: run.id(),
                        node_id: spec.id.clone(),
                        output: value.clone(),
                        duration_ms,
                        timestamp: Utc::now(),
                    });
                    outputs.insert(idx, value);
                    schedule.settle(idx, Settled::Completed(branch))
                }
                Err(e) => {
                    run.update(|rec| {
                        if let Some(node) = rec.node_mut(&spec.id) {
                            node.fail(e.to_string());
                        }
                    })
                    .await;
                    event_bus.emit(ExecutionEvent::NodeFailed {
                        execution_id: run.id(),
                        node_id: spec.id.clone(),
                        error: e.to_string(),
                        optional: spec.optional,
                        timestamp: Utc::now(),
                    });

                    if spec.optional {
                        tracing::warn!("Optional node {} failed, continuing: {}", spec.id, e);
                        outputs.insert(idx, json!({}));
                        schedule.settle(idx, Settled::Completed(None))
                    } else {
                        tracing::error!("Node {} failed: {}", spec.id, e);
                        if failure.is_none() {
                            failure = Some(format!("Node {} failed: {}", spec.id, e));
                        }
                        schedule.settle(idx, Settled::Blocked)
                    }
                }
            };
            self.record_skipped(&plan, &skipped, event_bus, run).await;
        }

        if run.is_cancelled() {
            let undispatched = schedule.undispatched();
            if !undispatched.is_empty() {
                tracing::debug!("{} nodes left pending by cancellation", undispatched.len());
                run.update(|e| {
                    for idx in &undispatched {
                        let spec = plan.steps[idx.index()].spec;
                        e.node_executions
                            .push(NodeExecution::pending(spec.id.clone(), spec.node_type.clone()));
                    }
                })
                .await;
            }
        }

        Ok(failure)
    }

    async fn record_skipped(
        &self,
        plan: &Plan<'_>,
        skipped: &[NodeIndex],
        event_bus: &EventBus,
        run: &RunHandle,
    ) {
        if skipped.is_empty() {
            return;
        }
        run.update(|e| {
            for idx in skipped {
                let spec = plan.steps[idx.index()].spec;
                e.node_executions
                    .push(NodeExecution::skipped(spec.id.clone(), spec.node_type.clone()));
            }
        })
        .await;
        for idx in skipped {
            let spec = plan.steps[idx.index()].spec;
            tracing::debug!("Skipping node {}", spec.id);
            event_bus.emit(ExecutionEvent::NodeSkipped {
                execution_id: run.id(),
                node_id: spec.id.clone(),
                timestamp: Utc::now(),
            });
        }
    }

    /// Node setting, then per-type override, then executor default, then
    /// workflow default, then the runtime-wide default.
    fn timeout_for(&self, workflow: &Workflow, step: &Step<'_>) -> Duration {
        step.spec
            .timeout_ms
            .map(Duration::from_millis)
            .or_else(|| self.node_timeouts.get(&step.spec.node_type).copied())
            .or_else(|| step.executor.default_timeout())
            .or_else(|| workflow.settings.node_timeout_ms.map(Duration::from_millis))
            .unwrap_or(self.default_timeout)
    }
}

async fn run_node(
    executor: Arc<dyn NodeExecutor>,
    ctx: NodeContext,
    limit: Duration,
) -> Result<NodeOutput, NodeError> {
    let guarded = AssertUnwindSafe(executor.execute(ctx)).catch_unwind();
    match timeout(limit, guarded).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(NodeError::Panicked(message))
        }
        Err(_) => Err(NodeError::Timeout {
            ms: limit.as_millis() as u64,
        }),
    }
}

struct Step<'w> {
    spec: &'w NodeSpec,
    executor: Arc<dyn NodeExecutor>,
}

/// Node specs and executors resolved up front, indexed like the graph
struct Plan<'w> {
    steps: Vec<Step<'w>>,
}

impl<'w> Plan<'w> {
    fn resolve(
        workflow: &'w Workflow,
        graph: &WorkflowGraph,
        registry: &NodeRegistry,
    ) -> Result<Self, FlowError> {
        let mut steps = Vec::with_capacity(graph.len());
        for idx in graph.indices() {
            let id = graph.node_id(idx);
            let spec = workflow
                .find_node(id)
                .ok_or_else(|| WorkflowError::NodeNotFound(id.clone()))?;
            let executor = registry.get(&spec.node_type)?;
            steps.push(Step { spec, executor });
        }
        Ok(Self { steps })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Waiting,
    Queued,
    Running,
    Done,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    state: SlotState,
    /// Incoming connections whose source has not settled yet
    remaining: usize,
    /// Incoming connections that will carry data
    active: usize,
}

/// How a settled node releases its outgoing connections
#[derive(Debug, Clone, Copy)]
enum Settled {
    /// Follow unlabeled connections and those labeled with the chosen branch
    Completed(Option<Branch>),
    /// Follow nothing
    Blocked,
}

/// Dependency counting over the graph.
///
/// A node becomes eligible once every incoming connection has settled and
/// at least one of them is active; with none active it is skipped and the
/// skip cascades. Only waiting nodes react, so each node is queued or
/// skipped at most once.
struct Schedule<'g> {
    graph: &'g WorkflowGraph,
    slots: Vec<Slot>,
    ready: VecDeque<NodeIndex>,
}

impl<'g> Schedule<'g> {
    fn new(graph: &'g WorkflowGraph) -> Self {
        let slots = graph
            .indices()
            .map(|idx| Slot {
                state: SlotState::Waiting,
                remaining: graph.in_degree(idx),
                active: 0,
            })
            .collect();
        Self {
            graph,
            slots,
            ready: VecDeque::new(),
        }
    }

    fn seed_roots(&mut self) {
        for idx in self.graph.roots() {
            self.queue(idx);
        }
    }

    /// Seed a partial run. Returns the nodes skipped because the trigger
    /// cannot reach them.
    fn seed_trigger(&mut self, trigger: NodeIndex) -> Vec<NodeIndex> {
        let reachable = self.graph.reachable_from(trigger);
        self.slots[trigger.index()].remaining = 0;
        self.queue(trigger);

        let mut skipped = Vec::new();
        for idx in self.graph.indices() {
            if reachable.contains(&idx) || self.slots[idx.index()].state != SlotState::Waiting {
                continue;
            }
            skipped.push(idx);
            skipped.extend(self.settle(idx, Settled::Blocked));
        }
        skipped
    }

    fn queue(&mut self, idx: NodeIndex) {
        self.slots[idx.index()].state = SlotState::Queued;
        self.ready.push_back(idx);
    }

    fn next_ready(&mut self) -> Option<NodeIndex> {
        let idx = self.ready.pop_front()?;
        self.slots[idx.index()].state = SlotState::Running;
        Some(idx)
    }

    /// Mark a node done and release its outgoing connections. Returns every
    /// node skipped as a consequence, in the order they were decided.
    fn settle(&mut self, idx: NodeIndex, how: Settled) -> Vec<NodeIndex> {
        let graph = self.graph;
        self.slots[idx.index()].state = SlotState::Done;

        let mut skipped = Vec::new();
        let mut work = vec![(idx, how)];
        while let Some((from, how)) = work.pop() {
            for (target, label) in graph.outgoing(from) {
                let active = match how {
                    Settled::Completed(branch) => label.is_none() || label == branch,
                    Settled::Blocked => false,
                };
                let slot = &mut self.slots[target.index()];
                if slot.state != SlotState::Waiting {
                    continue;
                }
                slot.remaining = slot.remaining.saturating_sub(1);
                if active {
                    slot.active += 1;
                }
                if slot.remaining > 0 {
                    continue;
                }
                if slot.active > 0 {
                    slot.state = SlotState::Queued;
                    self.ready.push_back(target);
                } else {
                    slot.state = SlotState::Done;
                    skipped.push(target);
                    work.push((target, Settled::Blocked));
                }
            }
        }
        skipped
    }

    /// Nodes that never started
    fn undispatched(&self) -> Vec<NodeIndex> {
        self.graph
            .indices()
            .filter(|idx| {
                matches!(
                    self.slots[idx.index()].state,
                    SlotState::Waiting | SlotState::Queued
                )
            })
            .collect()
    }
}
