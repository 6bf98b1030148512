use crate::{NodeId, NodeType, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

pub type ExecutionId = Uuid;

/// Run state machine: `running → completed | failed | cancelled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub const ALL: [ExecutionStatus; 4] = [
        ExecutionStatus::Running,
        ExecutionStatus::Completed,
        ExecutionStatus::Failed,
        ExecutionStatus::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node state machine: `pending → running → completed | failed | skipped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl NodeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NodeStatus::Completed | NodeStatus::Failed | NodeStatus::Skipped
        )
    }
}

/// Record of one node within one run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeExecution {
    pub node_id: NodeId,
    pub node_type: NodeType,
    pub status: NodeStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub input: Value,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub execution_time_ms: Option<u64>,
}

impl NodeExecution {
    pub fn pending(node_id: impl Into<NodeId>, node_type: NodeType) -> Self {
        Self {
            node_id: node_id.into(),
            node_type,
            status: NodeStatus::Pending,
            started_at: None,
            completed_at: None,
            input: Value::Null,
            output: None,
            error: None,
            execution_time_ms: None,
        }
    }

    pub fn started(node_id: impl Into<NodeId>, node_type: NodeType, input: Value) -> Self {
        Self {
            status: NodeStatus::Running,
            started_at: Some(Utc::now()),
            input,
            ..Self::pending(node_id, node_type)
        }
    }

    pub fn skipped(node_id: impl Into<NodeId>, node_type: NodeType) -> Self {
        Self {
            status: NodeStatus::Skipped,
            ..Self::pending(node_id, node_type)
        }
    }

    pub fn complete(&mut self, output: Value) {
        self.status = NodeStatus::Completed;
        self.output = Some(output);
        self.stop_clock();
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = NodeStatus::Failed;
        self.error = Some(error.into());
        self.stop_clock();
    }

    fn stop_clock(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.execution_time_ms = self
            .started_at
            .map(|started| (now - started).num_milliseconds().max(0) as u64);
    }
}

/// Record of one run of a workflow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowExecution {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub triggered_by: String,
    #[serde(default)]
    pub trigger_node: Option<NodeId>,
    pub node_executions: Vec<NodeExecution>,
    pub error: Option<String>,
}

impl WorkflowExecution {
    pub fn new(workflow_id: WorkflowId, triggered_by: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            triggered_by: triggered_by.into(),
            trigger_node: None,
            node_executions: Vec::new(),
            error: None,
        }
    }

    pub fn with_trigger_node(mut self, node_id: Option<NodeId>) -> Self {
        self.trigger_node = node_id;
        self
    }

    pub fn node(&self, node_id: &str) -> Option<&NodeExecution> {
        self.node_executions.iter().find(|n| n.node_id == node_id)
    }

    pub fn node_mut(&mut self, node_id: &str) -> Option<&mut NodeExecution> {
        self.node_executions.iter_mut().find(|n| n.node_id == node_id)
    }

    pub fn count(&self, status: NodeStatus) -> usize {
        self.node_executions
            .iter()
            .filter(|n| n.status == status)
            .count()
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.completed_at
            .map(|done| (done - self.started_at).num_milliseconds().max(0) as u64)
    }

    /// Move a running execution into a terminal state. Returns false when it
    /// had already left `running`, in which case nothing changes.
    pub fn finish(&mut self, status: ExecutionStatus, error: Option<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.error = error;
        self.completed_at = Some(Utc::now());
        true
    }
}
