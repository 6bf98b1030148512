use crate::{ExecutionId, NodeId, WorkflowId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlowError {
    /// True when the error is a typed "not found" answer rather than a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FlowError::Workflow(
                WorkflowError::NotFound(_)
                    | WorkflowError::TemplateNotFound(_)
                    | WorkflowError::ExecutionNotFound(_)
            )
        )
    }
}

/// Failure of a single node. Contained to that node and its exclusive descendants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Cancelled")]
    Cancelled,

    #[error("Executor panicked: {0}")]
    Panicked(String),
}

impl NodeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, NodeError::Timeout { .. })
    }

    pub fn invalid_type(field: impl Into<String>, expected: &str, actual: &serde_json::Value) -> Self {
        let actual = match actual {
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "boolean",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::String(_) => "string",
            serde_json::Value::Array(_) => "array",
            serde_json::Value::Object(_) => "object",
        };
        NodeError::InvalidInputType {
            field: field.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(WorkflowId),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(ExecutionId),

    #[error("Invalid workflow: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("Template {} produced an invalid workflow: {}", .id, .errors.join("; "))]
    InvalidTemplate { id: String, errors: Vec<String> },

    #[error("Workflow is not active: {0}")]
    Inactive(String),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),
}
