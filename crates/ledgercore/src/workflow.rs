use crate::NodeType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type WorkflowId = Uuid;

/// Node ids are chosen by the author and only need to be unique within a workflow.
pub type NodeId = String;

/// Type-specific node configuration.
pub type Config = serde_json::Map<String, serde_json::Value>;

/// Complete workflow definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default = "Uuid::new_v4")]
    pub id: WorkflowId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub settings: WorkflowSettings,
}

fn default_active() -> bool {
    true
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            nodes: Vec::new(),
            connections: Vec::new(),
            tags: Vec::new(),
            created_by: String::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
            settings: WorkflowSettings::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_owner(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    pub fn add_node(&mut self, node: NodeSpec) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    pub fn connect(&mut self, source: impl Into<NodeId>, target: impl Into<NodeId>) {
        self.connections.push(Connection::new(source, target));
    }

    /// Connect a CONDITION node to the node that runs when it evaluates to `branch`.
    pub fn connect_branch(
        &mut self,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        branch: Branch,
    ) {
        self.connections.push(Connection::new(source, target).on_branch(branch));
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Nodes without incoming connections, in declaration order.
    pub fn root_nodes(&self) -> Vec<&NodeSpec> {
        self.nodes
            .iter()
            .filter(|n| !self.connections.iter().any(|c| c.target == n.id))
            .collect()
    }

    /// Case-insensitive match over name, description and tags.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.name.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&query))
    }

    pub fn apply(&mut self, update: WorkflowUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(nodes) = update.nodes {
            self.nodes = nodes;
        }
        if let Some(connections) = update.connections {
            self.connections = connections;
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
        if let Some(settings) = update.settings {
            self.settings = settings;
        }
        self.updated_at = Utc::now();
    }
}

/// Partial update of a stored workflow. The id never changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub nodes: Option<Vec<NodeSpec>>,
    pub connections: Option<Vec<Connection>>,
    pub tags: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub settings: Option<WorkflowSettings>,
}

/// Node specification in a workflow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeSpec {
    pub id: NodeId,
    pub node_type: NodeType,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub config: Config,
    #[serde(default)]
    pub position: Option<Position>,
    /// A failing optional node does not fail the run; its successors see an empty output.
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl NodeSpec {
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<NodeType>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            label: None,
            config: Config::new(),
            position: None,
            optional: false,
            timeout_ms: None,
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Position { x, y });
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

/// Directed edge between two nodes of the same workflow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Connection {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<Branch>,
}

impl Connection {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            branch: None,
        }
    }

    pub fn on_branch(mut self, branch: Branch) -> Self {
        self.branch = Some(branch);
        self
    }
}

/// Branch label on a connection leaving a CONDITION node
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    True,
    False,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::True => "true",
            Branch::False => "false",
        }
    }
}

impl From<bool> for Branch {
    fn from(value: bool) -> Self {
        if value {
            Branch::True
        } else {
            Branch::False
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node position in the visual editor. Never read by the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Workflow-level execution settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkflowSettings {
    /// Default timeout for nodes whose type declares none.
    #[serde(default)]
    pub node_timeout_ms: Option<u64>,
    #[serde(default)]
    pub max_parallel_nodes: Option<usize>,
}
