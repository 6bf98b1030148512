use ledgercore::{NodeExecutor, NodeMetadata, NodeType, WorkflowError};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available node executors, keyed by node type tag
pub struct NodeRegistry {
    executors: HashMap<NodeType, Arc<dyn NodeExecutor>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Register an executor under its own tag, replacing any previous one
    pub fn register(&mut self, executor: Arc<dyn NodeExecutor>) {
        let node_type = executor.node_type();
        tracing::info!("Registering node type: {}", node_type);
        self.executors.insert(node_type, executor);
    }

    /// Look up the executor for a node type
    pub fn get(&self, node_type: &NodeType) -> Result<Arc<dyn NodeExecutor>, WorkflowError> {
        self.executors
            .get(node_type)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownNodeType(node_type.to_string()))
    }

    pub fn contains(&self, node_type: &NodeType) -> bool {
        self.executors.contains_key(node_type)
    }

    /// Get all registered node types, sorted by tag
    pub fn list_node_types(&self) -> Vec<NodeType> {
        let mut types: Vec<NodeType> = self.executors.keys().cloned().collect();
        types.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        types
    }

    /// Get metadata for a node type
    pub fn get_metadata(&self, node_type: &NodeType) -> Option<NodeMetadata> {
        self.executors.get(node_type).map(|e| e.metadata())
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
