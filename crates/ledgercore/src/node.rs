use crate::{events::EventEmitter, resolve_path, Branch, Config, ExecutionId, NodeError, NodeId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Tag selecting the executor for a node.
///
/// The built-in tags cover the practice's back-office node kinds; anything
/// else round-trips as [`NodeType::Custom`] so new executors can be
/// registered without touching this enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    ClientIntake,
    DocumentUpload,
    ScheduledTrigger,
    DocumentProcessor,
    TaxCalculator,
    GstProcessor,
    ComplianceChecker,
    GoogleSheetsAction,
    EmailSender,
    Condition,
    Delay,
    DataTransformer,
    ReportGenerator,
    AuditLog,
    Custom(String),
}

impl NodeType {
    pub const BUILTIN: [NodeType; 14] = [
        NodeType::ClientIntake,
        NodeType::DocumentUpload,
        NodeType::ScheduledTrigger,
        NodeType::DocumentProcessor,
        NodeType::TaxCalculator,
        NodeType::GstProcessor,
        NodeType::ComplianceChecker,
        NodeType::GoogleSheetsAction,
        NodeType::EmailSender,
        NodeType::Condition,
        NodeType::Delay,
        NodeType::DataTransformer,
        NodeType::ReportGenerator,
        NodeType::AuditLog,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            NodeType::ClientIntake => "client_intake",
            NodeType::DocumentUpload => "document_upload",
            NodeType::ScheduledTrigger => "scheduled_trigger",
            NodeType::DocumentProcessor => "document_processor",
            NodeType::TaxCalculator => "tax_calculator",
            NodeType::GstProcessor => "gst_processor",
            NodeType::ComplianceChecker => "compliance_checker",
            NodeType::GoogleSheetsAction => "google_sheets_action",
            NodeType::EmailSender => "email_sender",
            NodeType::Condition => "condition",
            NodeType::Delay => "delay",
            NodeType::DataTransformer => "data_transformer",
            NodeType::ReportGenerator => "report_generator",
            NodeType::AuditLog => "audit_log",
            NodeType::Custom(tag) => tag,
        }
    }
}

impl From<&str> for NodeType {
    fn from(tag: &str) -> Self {
        NodeType::BUILTIN
            .iter()
            .find(|t| t.as_str() == tag)
            .cloned()
            .unwrap_or_else(|| NodeType::Custom(tag.to_string()))
    }
}

impl From<String> for NodeType {
    fn from(tag: String) -> Self {
        NodeType::from(tag.as_str())
    }
}

impl From<NodeType> for String {
    fn from(node_type: NodeType) -> Self {
        node_type.as_str().to_string()
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core trait that every node executor implements
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Tag this executor is registered under
    fn node_type(&self) -> NodeType;

    /// Execute the node with the given context
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError>;

    /// Optional: timeout for this node type when the node itself declares none
    fn default_timeout(&self) -> Option<Duration> {
        None
    }

    /// Optional: description and ports, for catalogues and UIs
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::default()
    }
}

/// Execution context passed to each node
#[derive(Clone)]
pub struct NodeContext {
    pub node_id: NodeId,

    pub execution_id: ExecutionId,

    /// Predecessor outputs keyed by predecessor node id; root nodes see `{"input": <seed>}`
    pub inputs: Map<String, Value>,

    /// Static configuration for this node
    pub config: Config,

    /// Event emitter for real-time updates
    pub events: EventEmitter,
}

impl NodeContext {
    pub fn new(node_id: impl Into<NodeId>, events: EventEmitter) -> Self {
        Self {
            node_id: node_id.into(),
            execution_id: events.execution_id(),
            inputs: Map::new(),
            config: Config::new(),
            events,
        }
    }

    pub fn with_inputs(mut self, inputs: Map<String, Value>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Resolve a dotted path against the input context.
    ///
    /// The path is tried against the whole context first (`node_3.status`,
    /// `input.pan`), then inside each upstream value in key order (`pan`).
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return None;
        }
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        if let Some(value) = self.inputs.get(head) {
            let found = match rest {
                Some(rest) => resolve_path(value, rest),
                None => Some(value),
            };
            if found.is_some() {
                return found;
            }
        }
        self.inputs.values().find_map(|value| resolve_path(value, path))
    }

    /// Get required input or return error
    pub fn require_input(&self, path: &str) -> Result<&Value, NodeError> {
        self.lookup(path)
            .filter(|v| !v.is_null())
            .ok_or_else(|| NodeError::MissingInput(path.to_string()))
    }

    /// Get config value or return error
    pub fn require_config(&self, name: &str) -> Result<&Value, NodeError> {
        self.config
            .get(name)
            .ok_or_else(|| NodeError::Configuration(format!("Missing config: {}", name)))
    }

    /// Config value when present, else the input at the same path.
    pub fn config_or_input(&self, name: &str) -> Option<&Value> {
        self.config.get(name).or_else(|| self.lookup(name))
    }
}

/// Output from node execution
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeOutput {
    pub data: Map<String, Value>,

    /// Branch chosen by a CONDITION node; `None` for every other node type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<Branch>,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_branch(mut self, branch: Branch) -> Self {
        self.branch = Some(branch);
        self
    }

    /// Wrap an arbitrary value; non-objects land under `value`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(data) => Self { data, branch: None },
            other => Self::new().with_output("value", other),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.data)
    }
}

/// Metadata about a node type
#[derive(Debug, Clone, Serialize)]
pub struct NodeMetadata {
    pub description: String,
    pub category: String,
    pub inputs: Vec<PortDefinition>,
    pub outputs: Vec<PortDefinition>,
}

impl Default for NodeMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PortDefinition {
    pub name: String,
    pub description: String,
    pub required: bool,
}

impl PortDefinition {
    pub fn required(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            required: true,
        }
    }

    pub fn optional(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            required: false,
        }
    }
}
