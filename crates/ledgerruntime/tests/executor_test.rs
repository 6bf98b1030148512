// crates/ledgerruntime/tests/executor_test.rs

use async_trait::async_trait;
use ledgercore::{
    Branch, ExecutionStatus, NodeContext, NodeError, NodeExecutor, NodeOutput, NodeSpec,
    NodeStatus, NodeType, Workflow, WorkflowExecution, WorkflowUpdate,
};
use ledgerruntime::{FlowRuntime, NodeRegistry, RuntimeConfig};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Calls = Arc<Mutex<Vec<String>>>;

/// Records every invocation and reports which upstream keys it saw
struct EchoNode {
    calls: Calls,
}

#[async_trait]
impl NodeExecutor for EchoNode {
    fn node_type(&self) -> NodeType {
        NodeType::from("echo")
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        self.calls.lock().unwrap().push(ctx.node_id.clone());
        let seen: Vec<Value> = ctx.inputs.keys().map(|k| json!(k)).collect();
        Ok(NodeOutput::new()
            .with_output("node", ctx.node_id.clone())
            .with_output("seen", seen))
    }
}

struct FailNode;

#[async_trait]
impl NodeExecutor for FailNode {
    fn node_type(&self) -> NodeType {
        NodeType::from("fail")
    }

    async fn execute(&self, _ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        Err(NodeError::ExecutionFailed("deliberate failure".to_string()))
    }
}

struct PanicNode;

#[async_trait]
impl NodeExecutor for PanicNode {
    fn node_type(&self) -> NodeType {
        NodeType::from("panic")
    }

    async fn execute(&self, _ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        panic!("boom");
    }
}

/// Panic payload whose destructor panics again, outside the node boundary
struct Unruly;

impl Drop for Unruly {
    fn drop(&mut self) {
        panic!("payload drop");
    }
}

/// Kills its own task instead of returning
struct TaskKillerNode;

#[async_trait]
impl NodeExecutor for TaskKillerNode {
    fn node_type(&self) -> NodeType {
        NodeType::from("task_killer")
    }

    async fn execute(&self, _ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        std::panic::panic_any(Unruly);
    }
}

/// Sleeps for `ms` then completes
struct SleepNode;

#[async_trait]
impl NodeExecutor for SleepNode {
    fn node_type(&self) -> NodeType {
        NodeType::from("sleep")
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let ms = ctx.config.get("ms").and_then(Value::as_u64).unwrap_or(10);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(NodeOutput::new().with_output("slept", ms))
    }
}

/// Condition stand-in that takes the branch named by its `result` config
struct FixedBranchNode;

#[async_trait]
impl NodeExecutor for FixedBranchNode {
    fn node_type(&self) -> NodeType {
        NodeType::Condition
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let result = ctx.config.get("result").and_then(Value::as_bool).unwrap_or(false);
        Ok(NodeOutput::new()
            .with_output("result", result)
            .with_branch(Branch::from(result)))
    }
}

fn runtime_with(config: RuntimeConfig) -> (FlowRuntime, Calls) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let mut registry = NodeRegistry::new();
    registry.register(Arc::new(EchoNode {
        calls: calls.clone(),
    }));
    registry.register(Arc::new(FailNode));
    registry.register(Arc::new(PanicNode));
    registry.register(Arc::new(TaskKillerNode));
    registry.register(Arc::new(SleepNode));
    registry.register(Arc::new(FixedBranchNode));
    (FlowRuntime::with_registry(Arc::new(registry), config), calls)
}

fn runtime() -> (FlowRuntime, Calls) {
    runtime_with(RuntimeConfig::default())
}

fn echo(id: &str) -> NodeSpec {
    NodeSpec::new(id, "echo")
}

fn branch(id: &str, result: bool) -> NodeSpec {
    NodeSpec::new(id, NodeType::Condition)
        .with_config("fieldPath", "input.flag")
        .with_config("operator", "equals")
        .with_config("compareValue", true)
        .with_config("result", result)
}

fn status_of(exec: &WorkflowExecution, id: &str) -> NodeStatus {
    exec.node(id)
        .map(|n| n.status)
        .unwrap_or_else(|| panic!("no record for node {}", id))
}

async fn run(rt: &FlowRuntime, workflow: Workflow, data: Value) -> WorkflowExecution {
    let workflow = rt.create_workflow(workflow).await.unwrap();
    let id = rt.execute_workflow(workflow.id, data).await.unwrap();
    rt.wait_for_execution(id).await.unwrap()
}

#[tokio::test]
async fn test_fan_in_runs_once_after_both_predecessors() {
    let (rt, calls) = runtime();
    let mut wf = Workflow::new("diamond");
    for id in ["a", "b", "c", "d"] {
        wf.add_node(echo(id));
    }
    wf.connect("a", "b");
    wf.connect("a", "c");
    wf.connect("b", "d");
    wf.connect("c", "d");

    let exec = run(&rt, wf, json!({})).await;

    assert_eq!(exec.status, ExecutionStatus::Completed);
    let calls = calls.lock().unwrap().clone();
    assert_eq!(calls.iter().filter(|c| *c == "d").count(), 1, "calls: {:?}", calls);
    assert_eq!(calls.len(), 4);

    let d = exec.node("d").unwrap();
    assert_eq!(d.input.as_object().unwrap().len(), 2);
    assert!(d.input.get("b").is_some() && d.input.get("c").is_some());
    for pred in ["b", "c"] {
        assert!(
            d.started_at.unwrap() >= exec.node(pred).unwrap().completed_at.unwrap(),
            "d started before {} finished",
            pred
        );
    }
}

#[tokio::test]
async fn test_roots_receive_seed_under_input() {
    let (rt, _) = runtime();
    let mut wf = Workflow::new("single");
    wf.add_node(echo("only"));

    let exec = run(&rt, wf, json!({ "pan": "ABCDE1234F" })).await;

    let only = exec.node("only").unwrap();
    assert_eq!(only.input, json!({ "input": { "pan": "ABCDE1234F" } }));
    assert_eq!(only.output, Some(json!({ "node": "only", "seen": ["input"] })));
    assert!(only.execution_time_ms.is_some());
}

#[tokio::test]
async fn test_condition_skips_untaken_branch() {
    let (rt, calls) = runtime();
    let mut wf = Workflow::new("branching");
    wf.add_node(branch("check", true));
    wf.add_node(echo("yes"));
    wf.add_node(echo("no"));
    wf.add_node(echo("after_no"));
    wf.connect_branch("check", "yes", Branch::True);
    wf.connect_branch("check", "no", Branch::False);
    wf.connect("no", "after_no");

    let exec = run(&rt, wf, json!({})).await;

    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert_eq!(status_of(&exec, "yes"), NodeStatus::Completed);
    assert_eq!(status_of(&exec, "no"), NodeStatus::Skipped);
    assert_eq!(status_of(&exec, "after_no"), NodeStatus::Skipped);
    let calls = calls.lock().unwrap().clone();
    assert!(!calls.contains(&"no".to_string()));
    assert!(!calls.contains(&"after_no".to_string()));
}

#[tokio::test]
async fn test_join_after_both_branches_runs_once() {
    let (rt, calls) = runtime();
    let mut wf = Workflow::new("rejoin");
    wf.add_node(branch("check", false));
    wf.add_node(echo("t"));
    wf.add_node(echo("f"));
    wf.add_node(echo("join"));
    wf.connect_branch("check", "t", Branch::True);
    wf.connect_branch("check", "f", Branch::False);
    wf.connect("t", "join");
    wf.connect("f", "join");

    let exec = run(&rt, wf, json!({})).await;

    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert_eq!(status_of(&exec, "t"), NodeStatus::Skipped);
    assert_eq!(status_of(&exec, "f"), NodeStatus::Completed);
    assert_eq!(status_of(&exec, "join"), NodeStatus::Completed);
    let join = exec.node("join").unwrap();
    assert_eq!(join.input.as_object().unwrap().keys().collect::<Vec<_>>(), vec!["f"]);
    assert_eq!(calls.lock().unwrap().iter().filter(|c| *c == "join").count(), 1);
}

#[tokio::test]
async fn test_failure_skips_exclusive_descendants_only() {
    let (rt, _) = runtime();
    let mut wf = Workflow::new("partial failure");
    wf.add_node(echo("a"));
    wf.add_node(NodeSpec::new("broken", "fail"));
    wf.add_node(echo("child"));
    wf.add_node(echo("sibling"));
    wf.add_node(echo("join"));
    wf.connect("a", "broken");
    wf.connect("broken", "child");
    wf.connect("a", "sibling");
    wf.connect("broken", "join");
    wf.connect("sibling", "join");

    let exec = run(&rt, wf, json!({})).await;

    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert_eq!(status_of(&exec, "broken"), NodeStatus::Failed);
    assert_eq!(status_of(&exec, "child"), NodeStatus::Skipped);
    assert_eq!(status_of(&exec, "sibling"), NodeStatus::Completed);
    assert_eq!(status_of(&exec, "join"), NodeStatus::Completed);
    assert!(exec
        .node("broken")
        .and_then(|n| n.error.as_deref())
        .unwrap()
        .contains("deliberate failure"));
    assert!(exec.error.as_deref().unwrap().contains("broken"));
}

#[tokio::test]
async fn test_optional_failure_propagates_empty_output() {
    let (rt, _) = runtime();
    let mut wf = Workflow::new("optional");
    wf.add_node(NodeSpec::new("flaky", "fail").optional());
    wf.add_node(echo("next"));
    wf.connect("flaky", "next");

    let exec = run(&rt, wf, json!({})).await;

    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert_eq!(status_of(&exec, "flaky"), NodeStatus::Failed);
    assert_eq!(status_of(&exec, "next"), NodeStatus::Completed);
    assert_eq!(exec.node("next").unwrap().input, json!({ "flaky": {} }));
}

#[tokio::test]
async fn test_node_timeout_fails_node() {
    let (rt, _) = runtime();
    let mut wf = Workflow::new("slow");
    wf.add_node(
        NodeSpec::new("slow", "sleep")
            .with_config("ms", 2_000)
            .with_timeout(50),
    );
    wf.add_node(echo("after"));
    wf.connect("slow", "after");

    let exec = run(&rt, wf, json!({})).await;

    assert_eq!(exec.status, ExecutionStatus::Failed);
    let slow = exec.node("slow").unwrap();
    assert_eq!(slow.status, NodeStatus::Failed);
    assert_eq!(slow.error.as_deref(), Some("Timed out after 50ms"));
    assert_eq!(status_of(&exec, "after"), NodeStatus::Skipped);
}

#[tokio::test]
async fn test_runtime_type_timeout_applies() {
    let config = RuntimeConfig::default().with_node_timeout(NodeType::from("sleep"), Duration::from_millis(30));
    let (rt, _) = runtime_with(config);
    let mut wf = Workflow::new("typed timeout");
    wf.add_node(NodeSpec::new("slow", "sleep").with_config("ms", 1_000));

    let exec = run(&rt, wf, json!({})).await;
    assert_eq!(
        exec.node("slow").unwrap().error.as_deref(),
        Some("Timed out after 30ms")
    );
}

#[tokio::test]
async fn test_panicking_executor_is_contained() {
    let (rt, _) = runtime();
    let mut wf = Workflow::new("panics");
    wf.add_node(NodeSpec::new("bad", "panic"));
    wf.add_node(echo("independent"));

    let exec = run(&rt, wf, json!({})).await;

    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert_eq!(
        exec.node("bad").unwrap().error.as_deref(),
        Some("Executor panicked: boom")
    );
    assert_eq!(status_of(&exec, "independent"), NodeStatus::Completed);
}

#[tokio::test]
async fn test_lost_task_fails_its_node_and_siblings_are_kept() {
    let (rt, calls) = runtime();
    let mut wf = Workflow::new("lost task");
    wf.add_node(NodeSpec::new("killer", "task_killer"));
    wf.add_node(echo("after"));
    wf.add_node(NodeSpec::new("slow", "sleep").with_config("ms", 50));
    wf.connect("killer", "after");

    let exec = run(&rt, wf, json!({})).await;

    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert_eq!(status_of(&exec, "killer"), NodeStatus::Failed);
    assert!(exec
        .node("killer")
        .unwrap()
        .error
        .as_deref()
        .is_some_and(|e| e.contains("task join error")));
    assert_eq!(status_of(&exec, "after"), NodeStatus::Skipped);
    assert_eq!(status_of(&exec, "slow"), NodeStatus::Completed);
    assert!(!calls.lock().unwrap().contains(&"after".to_string()));
}

#[tokio::test]
async fn test_cancel_lets_in_flight_node_finish() {
    let (rt, calls) = runtime();
    let mut wf = Workflow::new("cancellable");
    wf.add_node(echo("first"));
    wf.add_node(NodeSpec::new("slow", "sleep").with_config("ms", 300));
    wf.add_node(echo("after"));
    wf.connect("first", "slow");
    wf.connect("slow", "after");
    let wf = rt.create_workflow(wf).await.unwrap();

    let id = rt.execute_workflow(wf.id, json!({})).await.unwrap();

    let mut slow_running = false;
    for _ in 0..200 {
        let exec = rt.get_execution_status(id).await.unwrap().unwrap();
        if exec.node("slow").map(|n| n.status) == Some(NodeStatus::Running) {
            assert_eq!(exec.status, ExecutionStatus::Running);
            slow_running = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(slow_running, "slow node never started");

    let first_before = rt
        .get_execution_status(id)
        .await
        .unwrap()
        .unwrap()
        .node("first")
        .cloned()
        .unwrap();

    assert!(rt.cancel_execution(id).await);
    assert!(!rt.cancel_execution(id).await, "second cancel must report false");

    let exec = rt.wait_for_execution(id).await.unwrap();
    assert_eq!(exec.status, ExecutionStatus::Cancelled);
    assert_eq!(exec.node("first"), Some(&first_before));
    assert_eq!(status_of(&exec, "slow"), NodeStatus::Completed);
    assert_eq!(status_of(&exec, "after"), NodeStatus::Pending);
    assert!(!calls.lock().unwrap().contains(&"after".to_string()));

    let stats = rt.get_workflow_stats().await.unwrap();
    assert_eq!(stats.executions_by_status[&ExecutionStatus::Cancelled], 1);
    assert_eq!(stats.executions_by_status[&ExecutionStatus::Failed], 0);
}

#[tokio::test]
async fn test_partial_run_from_trigger_node() {
    let (rt, calls) = runtime();
    let mut wf = Workflow::new("partial");
    for id in ["a", "x", "b", "c"] {
        wf.add_node(echo(id));
    }
    wf.connect("a", "b");
    wf.connect("x", "b");
    wf.connect("b", "c");
    let wf = rt.create_workflow(wf).await.unwrap();

    let id = rt
        .execute_workflow_from(wf.id, "b", json!({ "resume": true }))
        .await
        .unwrap();
    let exec = rt.wait_for_execution(id).await.unwrap();

    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert_eq!(exec.trigger_node.as_deref(), Some("b"));
    assert_eq!(status_of(&exec, "a"), NodeStatus::Skipped);
    assert_eq!(status_of(&exec, "x"), NodeStatus::Skipped);
    assert_eq!(status_of(&exec, "c"), NodeStatus::Completed);
    assert_eq!(
        exec.node("b").unwrap().input,
        json!({ "input": { "resume": true } })
    );
    assert_eq!(*calls.lock().unwrap(), vec!["b".to_string(), "c".to_string()]);

    let err = rt
        .execute_workflow_from(wf.id, "ghost", json!({}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("ghost"));
}

#[tokio::test]
async fn test_unknown_ids_are_typed_not_found() {
    let (rt, _) = runtime();
    let missing = uuid::Uuid::new_v4();

    let err = rt.execute_workflow(missing, json!({})).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(rt.get_execution_status(missing).await.unwrap().is_none());
    assert!(!rt.cancel_execution(missing).await);
    assert!(rt.wait_for_execution(missing).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_invalid_workflows_never_run() {
    let (rt, calls) = runtime();

    let mut cyclic = Workflow::new("cyclic");
    cyclic.add_node(echo("a"));
    cyclic.add_node(echo("b"));
    cyclic.connect("a", "b");
    cyclic.connect("b", "a");
    let err = rt.create_workflow(cyclic).await.unwrap_err();
    assert!(err.to_string().contains("cycle detected"));

    let mut unregistered = Workflow::new("needs tax");
    unregistered.add_node(NodeSpec::new("tax", NodeType::TaxCalculator).with_config("taxRegime", "old"));
    let report = rt.validate(&unregistered);
    assert!(!report.is_valid);
    assert_eq!(
        report.errors,
        vec!["no executor registered for node type: tax_calculator".to_string()]
    );

    assert!(rt.list_workflows().await.unwrap().is_empty());
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_inactive_workflow_is_refused() {
    let (rt, _) = runtime();
    let mut wf = Workflow::new("dormant");
    wf.add_node(echo("a"));
    let wf = rt.create_workflow(wf).await.unwrap();

    rt.update_workflow(
        wf.id,
        WorkflowUpdate {
            is_active: Some(false),
            ..WorkflowUpdate::default()
        },
    )
    .await
    .unwrap();

    let err = rt.execute_workflow(wf.id, json!({})).await.unwrap_err();
    assert!(err.to_string().contains("not active"));
}

#[tokio::test]
async fn test_store_queries_and_clone() {
    let (rt, _) = runtime();
    let mut wf = Workflow::new("GST Filing").with_owner("asha").with_description("monthly returns");
    wf.tags = vec!["gst".to_string()];
    wf.add_node(echo("a"));
    let wf = rt.create_workflow(wf).await.unwrap();

    assert_eq!(rt.search_workflows("gst").await.unwrap().len(), 1);
    assert_eq!(rt.search_workflows("MONTHLY").await.unwrap().len(), 1);
    assert!(rt.search_workflows("audit").await.unwrap().is_empty());
    assert_eq!(rt.workflows_by_owner("asha").await.unwrap().len(), 1);

    let copy = rt.clone_workflow(wf.id, "GST Filing (copy)").await.unwrap();
    assert_ne!(copy.id, wf.id);
    assert!(!copy.is_active);
    assert_eq!(copy.nodes, wf.nodes);
    assert_eq!(rt.list_workflows().await.unwrap().len(), 2);

    assert!(rt.delete_workflow(copy.id).await.unwrap());
    assert!(!rt.delete_workflow(copy.id).await.unwrap());
}

#[tokio::test]
async fn test_stats_count_runs_by_status() {
    let (rt, _) = runtime();

    let mut ok = Workflow::new("ok");
    ok.add_node(echo("a"));
    let ok = rt.create_workflow(ok).await.unwrap();

    let mut bad = Workflow::new("bad");
    bad.add_node(NodeSpec::new("f", "fail"));
    let bad = rt.create_workflow(bad).await.unwrap();

    for _ in 0..2 {
        let id = rt.execute_workflow(ok.id, json!({})).await.unwrap();
        rt.wait_for_execution(id).await.unwrap();
    }
    let id = rt.execute_workflow(bad.id, json!({})).await.unwrap();
    rt.wait_for_execution(id).await.unwrap();

    let stats = rt.get_workflow_stats().await.unwrap();
    assert_eq!(stats.workflow_count, 2);
    assert_eq!(stats.active_workflow_count, 2);
    assert_eq!(stats.execution_count, 3);
    assert_eq!(stats.executions_by_status[&ExecutionStatus::Completed], 2);
    assert_eq!(stats.executions_by_status[&ExecutionStatus::Failed], 1);
    assert_eq!(stats.executions_by_status[&ExecutionStatus::Running], 0);
    assert_eq!(stats.executions_by_status[&ExecutionStatus::Cancelled], 0);
    assert!(stats.average_duration_ms >= 0.0);

    assert_eq!(rt.execution_history(Some(ok.id)).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_events_bracket_the_run() {
    let (rt, _) = runtime();
    let mut events = rt.subscribe_events();
    let mut wf = Workflow::new("observed");
    wf.add_node(echo("a"));

    let exec = run(&rt, wf, json!({})).await;

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.execution_id(), exec.id);
        kinds.push(serde_json::to_value(&event).unwrap()["type"].as_str().unwrap().to_string());
    }
    assert_eq!(kinds.first().map(String::as_str), Some("WorkflowStarted"));
    assert_eq!(kinds.last().map(String::as_str), Some("WorkflowFinished"));
    assert!(kinds.contains(&"NodeCompleted".to_string()));
}
