use crate::executions::{ExecutionRegistry, WorkflowStats};
use crate::registry::NodeRegistry;
use crate::store::{ExecutionStore, InMemoryExecutionStore, InMemoryWorkflowStore, WorkflowStore};
use crate::templates::TemplateRegistry;
use crate::WorkflowExecutor;
use chrono::Utc;
use ledgercore::{
    validate, Complexity, EventBus, ExecutionEvent, ExecutionId, FlowError, NodeId, NodeType,
    Result, TemplateCategory, TemplateOverrides, ValidationReport, Workflow, WorkflowError,
    WorkflowExecution, WorkflowId, WorkflowTemplate, WorkflowUpdate,
};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// What to run and on whose behalf
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub data: Value,
    /// Start a partial run from this node instead of the roots
    pub trigger_node: Option<NodeId>,
    pub triggered_by: String,
}

impl ExecutionRequest {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            trigger_node: None,
            triggered_by: "manual".to_string(),
        }
    }

    pub fn from_node(mut self, node_id: impl Into<NodeId>) -> Self {
        self.trigger_node = Some(node_id.into());
        self
    }

    pub fn triggered_by(mut self, who: impl Into<String>) -> Self {
        self.triggered_by = who.into();
        self
    }
}

/// Main runtime for storing and executing workflows
pub struct FlowRuntime {
    registry: Arc<NodeRegistry>,
    executor: Arc<WorkflowExecutor>,
    event_bus: Arc<EventBus>,
    workflows: Arc<dyn WorkflowStore>,
    executions: Arc<ExecutionRegistry>,
    templates: Arc<TemplateRegistry>,
    config: RuntimeConfig,
}

impl FlowRuntime {
    /// Create a new runtime with default settings and no executors
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_registry(Arc::new(NodeRegistry::new()), config)
    }

    /// Create a new runtime with a pre-configured registry and in-memory stores
    pub fn with_registry(registry: Arc<NodeRegistry>, config: RuntimeConfig) -> Self {
        Self::with_stores(
            registry,
            config,
            Arc::new(InMemoryWorkflowStore::new()),
            Arc::new(InMemoryExecutionStore::new()),
        )
    }

    pub fn with_stores(
        registry: Arc<NodeRegistry>,
        config: RuntimeConfig,
        workflows: Arc<dyn WorkflowStore>,
        executions: Arc<dyn ExecutionStore>,
    ) -> Self {
        let executor = Arc::new(WorkflowExecutor::from_config(&config));
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));

        Self {
            registry,
            executor,
            event_bus,
            workflows,
            executions: Arc::new(ExecutionRegistry::new(executions)),
            templates: Arc::new(TemplateRegistry::with_builtin()),
            config,
        }
    }

    /// Swap the template catalogue
    pub fn with_templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = Arc::new(templates);
        self
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    // ---- workflow definitions ----

    /// Structural validation plus a registered executor for every node type
    pub fn validate(&self, workflow: &Workflow) -> ValidationReport {
        let mut report = validate(workflow);
        let mut missing: Vec<&NodeType> = workflow
            .nodes
            .iter()
            .map(|n| &n.node_type)
            .filter(|t| !self.registry.contains(t))
            .collect();
        missing.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        missing.dedup();
        for node_type in missing {
            report
                .errors
                .push(format!("no executor registered for node type: {}", node_type));
        }
        report.is_valid = report.errors.is_empty();
        report
    }

    pub async fn create_workflow(&self, mut workflow: Workflow) -> Result<Workflow> {
        self.validate(&workflow).into_result()?;
        let now = Utc::now();
        workflow.created_at = now;
        workflow.updated_at = now;
        self.workflows.put(workflow.clone()).await?;
        tracing::info!("Created workflow '{}' ({})", workflow.name, workflow.id);
        Ok(workflow)
    }

    pub async fn update_workflow(&self, id: WorkflowId, update: WorkflowUpdate) -> Result<Workflow> {
        let mut workflow = self
            .workflows
            .get(id)
            .await?
            .ok_or(WorkflowError::NotFound(id))?;
        workflow.apply(update);
        self.validate(&workflow).into_result()?;
        self.workflows.put(workflow.clone()).await?;
        tracing::info!("Updated workflow '{}' ({})", workflow.name, workflow.id);
        Ok(workflow)
    }

    pub async fn delete_workflow(&self, id: WorkflowId) -> Result<bool> {
        let deleted = self.workflows.delete(id).await?;
        if deleted {
            tracing::info!("Deleted workflow {}", id);
        }
        Ok(deleted)
    }

    pub async fn get_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>> {
        self.workflows.get(id).await
    }

    pub async fn list_workflows(&self) -> Result<Vec<Workflow>> {
        self.workflows.list().await
    }

    pub async fn search_workflows(&self, query: &str) -> Result<Vec<Workflow>> {
        self.workflows.search(query).await
    }

    pub async fn workflows_by_owner(&self, created_by: &str) -> Result<Vec<Workflow>> {
        self.workflows.by_owner(created_by).await
    }

    /// Copy a stored workflow under a new id. The copy starts inactive.
    pub async fn clone_workflow(&self, id: WorkflowId, new_name: &str) -> Result<Workflow> {
        let source = self
            .workflows
            .get(id)
            .await?
            .ok_or(WorkflowError::NotFound(id))?;
        let now = Utc::now();
        let copy = Workflow {
            id: Uuid::new_v4(),
            name: new_name.to_string(),
            is_active: false,
            created_at: now,
            updated_at: now,
            ..source
        };
        self.workflows.put(copy.clone()).await?;
        tracing::info!("Cloned workflow {} into {}", id, copy.id);
        Ok(copy)
    }

    // ---- executions ----

    /// Start a run of a stored workflow. Returns as soon as the run is registered.
    pub async fn execute_workflow(&self, id: WorkflowId, data: Value) -> Result<ExecutionId> {
        self.submit(id, ExecutionRequest::new(data)).await
    }

    /// Start a partial run at `node_id`
    pub async fn execute_workflow_from(
        &self,
        id: WorkflowId,
        node_id: &str,
        data: Value,
    ) -> Result<ExecutionId> {
        self.submit(id, ExecutionRequest::new(data).from_node(node_id))
            .await
    }

    pub async fn submit(&self, id: WorkflowId, request: ExecutionRequest) -> Result<ExecutionId> {
        let workflow = self
            .workflows
            .get(id)
            .await?
            .ok_or(WorkflowError::NotFound(id))?;
        if self.config.require_active && !workflow.is_active {
            return Err(WorkflowError::Inactive(workflow.name).into());
        }
        self.start(workflow, request).await
    }

    async fn start(&self, workflow: Workflow, request: ExecutionRequest) -> Result<ExecutionId> {
        self.validate(&workflow).into_result()?;
        if let Some(node_id) = &request.trigger_node {
            if workflow.find_node(node_id).is_none() {
                return Err(WorkflowError::NodeNotFound(node_id.clone()).into());
            }
        }

        let execution = WorkflowExecution::new(workflow.id, request.triggered_by)
            .with_trigger_node(request.trigger_node);
        let handle = self.executions.register(execution).await?;
        let execution_id = handle.id();

        let executor = self.executor.clone();
        let registry = self.registry.clone();
        let event_bus = self.event_bus.clone();
        let executions = self.executions.clone();
        let data = request.data;

        tokio::spawn(async move {
            executor
                .drive(&workflow, &registry, &event_bus, &handle, data)
                .await;
            if let Err(e) = executions.complete(&handle).await {
                tracing::error!("Failed to persist execution {}: {}", handle.id(), e);
            }
        });

        Ok(execution_id)
    }

    pub async fn get_execution_status(&self, id: ExecutionId) -> Result<Option<WorkflowExecution>> {
        self.executions.get(id).await
    }

    /// False when the run is unknown or already terminal
    pub async fn cancel_execution(&self, id: ExecutionId) -> bool {
        self.executions.cancel(id).await
    }

    /// Resolve once the run has finished
    pub async fn wait_for_execution(&self, id: ExecutionId) -> Result<WorkflowExecution> {
        self.executions
            .wait(id)
            .await?
            .ok_or_else(|| WorkflowError::ExecutionNotFound(id).into())
    }

    pub async fn execution_history(
        &self,
        workflow_id: Option<WorkflowId>,
    ) -> Result<Vec<WorkflowExecution>> {
        self.executions.history(workflow_id).await
    }

    pub async fn get_workflow_stats(&self) -> Result<WorkflowStats> {
        let workflows = self.workflows.list().await?;
        let active = workflows.iter().filter(|w| w.is_active).count();
        let executions = self.executions.history(None).await?;
        Ok(WorkflowStats::from_runs(workflows.len(), active, &executions))
    }

    // ---- templates ----

    pub fn get_templates(&self) -> &[WorkflowTemplate] {
        self.templates.list()
    }

    pub fn get_template(&self, id: &str) -> Option<&WorkflowTemplate> {
        self.templates.get(id)
    }

    pub fn get_templates_by_category(&self, category: TemplateCategory) -> Vec<&WorkflowTemplate> {
        self.templates.by_category(category)
    }

    pub fn get_templates_by_complexity(&self, complexity: Complexity) -> Vec<&WorkflowTemplate> {
        self.templates.by_complexity(complexity)
    }

    /// Instantiate a template and store the result
    pub async fn create_workflow_from_template(
        &self,
        template_id: &str,
        overrides: TemplateOverrides,
    ) -> Result<Workflow> {
        let workflow = self.templates.instantiate(template_id, &overrides)?;
        self.create_workflow(workflow).await
    }

    /// Instantiate a template and run it without storing the definition
    pub async fn execute_template(&self, template_id: &str, data: Value) -> Result<ExecutionId> {
        let workflow = self
            .templates
            .instantiate(template_id, &TemplateOverrides::default())?;
        self.start(
            workflow,
            ExecutionRequest::new(data).triggered_by(format!("template:{}", template_id)),
        )
        .await
    }
}

impl Default for FlowRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub max_parallel_nodes: usize,
    pub event_buffer_size: usize,
    /// Used when neither the node, its type nor its workflow names a timeout
    pub default_node_timeout: Duration,
    pub node_timeouts: HashMap<NodeType, Duration>,
    /// Refuse to run stored workflows that are not active
    pub require_active: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 10,
            event_buffer_size: 1000,
            default_node_timeout: Duration::from_secs(30),
            node_timeouts: HashMap::new(),
            require_active: true,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `LEDGERFLOW_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(n) = env_parse("LEDGERFLOW_MAX_PARALLEL_NODES")? {
            config.max_parallel_nodes = n;
        }
        if let Some(n) = env_parse("LEDGERFLOW_EVENT_BUFFER")? {
            config.event_buffer_size = n;
        }
        if let Some(ms) = env_parse("LEDGERFLOW_NODE_TIMEOUT_MS")? {
            config.default_node_timeout = Duration::from_millis(ms);
        }
        if let Some(flag) = env_parse("LEDGERFLOW_REQUIRE_ACTIVE")? {
            config.require_active = flag;
        }
        Ok(config)
    }

    pub fn with_node_timeout(mut self, node_type: NodeType, timeout: Duration) -> Self {
        self.node_timeouts.insert(node_type, timeout);
        self
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| FlowError::Config(format!("{}={}: {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}
