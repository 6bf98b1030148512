use async_trait::async_trait;
use ledgercore::{ExecutionId, Result, Workflow, WorkflowExecution, WorkflowId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Persistence for workflow definitions
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Insert or replace by id
    async fn put(&self, workflow: Workflow) -> Result<()>;

    async fn get(&self, id: WorkflowId) -> Result<Option<Workflow>>;

    async fn delete(&self, id: WorkflowId) -> Result<bool>;

    /// All workflows, oldest first
    async fn list(&self) -> Result<Vec<Workflow>>;

    /// Case-insensitive match over name, description and tags
    async fn search(&self, query: &str) -> Result<Vec<Workflow>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|w| w.matches_query(query))
            .collect())
    }

    async fn by_owner(&self, created_by: &str) -> Result<Vec<Workflow>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|w| w.created_by == created_by)
            .collect())
    }
}

/// Persistence for execution records
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Insert or replace by id
    async fn put(&self, execution: WorkflowExecution) -> Result<()>;

    async fn get(&self, id: ExecutionId) -> Result<Option<WorkflowExecution>>;

    /// Runs of one workflow, or of all, oldest first
    async fn list(&self, workflow_id: Option<WorkflowId>) -> Result<Vec<WorkflowExecution>>;
}

#[derive(Default)]
pub struct InMemoryWorkflowStore {
    workflows: RwLock<HashMap<WorkflowId, Workflow>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn put(&self, workflow: Workflow) -> Result<()> {
        self.workflows.write().await.insert(workflow.id, workflow);
        Ok(())
    }

    async fn get(&self, id: WorkflowId) -> Result<Option<Workflow>> {
        Ok(self.workflows.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: WorkflowId) -> Result<bool> {
        Ok(self.workflows.write().await.remove(&id).is_some())
    }

    async fn list(&self) -> Result<Vec<Workflow>> {
        let mut workflows: Vec<Workflow> = self.workflows.read().await.values().cloned().collect();
        workflows.sort_by_key(|w| w.created_at);
        Ok(workflows)
    }
}

#[derive(Default)]
pub struct InMemoryExecutionStore {
    executions: RwLock<HashMap<ExecutionId, WorkflowExecution>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn put(&self, execution: WorkflowExecution) -> Result<()> {
        self.executions.write().await.insert(execution.id, execution);
        Ok(())
    }

    async fn get(&self, id: ExecutionId) -> Result<Option<WorkflowExecution>> {
        Ok(self.executions.read().await.get(&id).cloned())
    }

    async fn list(&self, workflow_id: Option<WorkflowId>) -> Result<Vec<WorkflowExecution>> {
        let mut executions: Vec<WorkflowExecution> = self
            .executions
            .read()
            .await
            .values()
            .filter(|e| workflow_id.map_or(true, |id| e.workflow_id == id))
            .cloned()
            .collect();
        executions.sort_by_key(|e| e.started_at);
        Ok(executions)
    }
}
