//! Core abstractions for the practice workflow engine
//!
//! This crate provides the workflow definition model, the node executor
//! contract, execution records, templates and the graph validator. It
//! does no scheduling of its own.

mod config;
mod error;
pub mod events;
mod execution;
mod graph;
mod node;
mod template;
mod validation;
mod workflow;

pub use config::{resolve_path, ConditionOperator, ConfigExt, SheetOperation, TaxRegime, TransformOperation};
pub use error::{FlowError, NodeError, WorkflowError};
pub use events::*;
pub use execution::{ExecutionId, ExecutionStatus, NodeExecution, NodeStatus, WorkflowExecution};
pub use graph::WorkflowGraph;
pub use node::{NodeContext, NodeExecutor, NodeMetadata, NodeOutput, NodeType, PortDefinition};
pub use template::{Blueprint, Complexity, TemplateCategory, TemplateOverrides, WorkflowTemplate};
pub use validation::{validate, ValidationReport};
pub use workflow::{
    Branch, Config, Connection, NodeId, NodeSpec, Position, Workflow, WorkflowId,
    WorkflowSettings, WorkflowUpdate,
};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
