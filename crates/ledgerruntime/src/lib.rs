//! Workflow execution runtime
//!
//! This crate provides the execution engine that runs workflows, the node
//! executor registry, live execution tracking, the template catalogue and
//! the stores behind them.

mod catalog;
mod executions;
mod executor;
mod registry;
mod runtime;
mod store;
mod templates;

pub use executions::{ExecutionRegistry, RunHandle, WorkflowStats};
pub use executor::WorkflowExecutor;
pub use registry::NodeRegistry;
pub use runtime::{ExecutionRequest, FlowRuntime, RuntimeConfig};
pub use store::{
    ExecutionStore, InMemoryExecutionStore, InMemoryWorkflowStore, WorkflowStore,
};
pub use templates::TemplateRegistry;
