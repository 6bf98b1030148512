use crate::{Connection, NodeSpec, Workflow, WorkflowSettings};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    TaxFiling,
    AuditProcess,
    ClientOnboarding,
    ComplianceCheck,
    ReportGeneration,
    DocumentProcessing,
    NotificationSystem,
}

impl TemplateCategory {
    pub const ALL: [TemplateCategory; 7] = [
        TemplateCategory::TaxFiling,
        TemplateCategory::AuditProcess,
        TemplateCategory::ClientOnboarding,
        TemplateCategory::ComplianceCheck,
        TemplateCategory::ReportGeneration,
        TemplateCategory::DocumentProcessing,
        TemplateCategory::NotificationSystem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateCategory::TaxFiling => "tax_filing",
            TemplateCategory::AuditProcess => "audit_process",
            TemplateCategory::ClientOnboarding => "client_onboarding",
            TemplateCategory::ComplianceCheck => "compliance_check",
            TemplateCategory::ReportGeneration => "report_generation",
            TemplateCategory::DocumentProcessing => "document_processing",
            TemplateCategory::NotificationSystem => "notification_system",
        }
    }
}

impl fmt::Display for TemplateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown template category '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Beginner,
    Intermediate,
    Advanced,
}

impl Complexity {
    pub const ALL: [Complexity; 3] = [
        Complexity::Beginner,
        Complexity::Intermediate,
        Complexity::Advanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Beginner => "beginner",
            Complexity::Intermediate => "intermediate",
            Complexity::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown complexity '{}'", s))
    }
}

/// Node/connection graph copied into every workflow made from a template
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Blueprint {
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub settings: WorkflowSettings,
}

impl Blueprint {
    pub fn node(mut self, node: NodeSpec) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn edge(mut self, source: &str, target: &str) -> Self {
        self.connections.push(Connection::new(source, target));
        self
    }

    pub fn branch(mut self, source: &str, target: &str, branch: crate::Branch) -> Self {
        self.connections
            .push(Connection::new(source, target).on_branch(branch));
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

/// Read-only catalogue entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: TemplateCategory,
    pub complexity: Complexity,
    /// Arrow-joined outline of the main path, for listings
    pub preview: String,
    pub estimated_minutes: u32,
    pub blueprint: Blueprint,
}

/// Caller-supplied fields applied on instantiation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateOverrides {
    pub name: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl TemplateOverrides {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

impl WorkflowTemplate {
    /// Deep-copy the blueprint into a new workflow with a fresh id.
    /// Validation is left to the caller.
    pub fn instantiate(&self, overrides: &TemplateOverrides) -> Workflow {
        let now = Utc::now();
        Workflow {
            id: Uuid::new_v4(),
            name: overrides.name.clone().unwrap_or_else(|| self.name.clone()),
            description: overrides
                .description
                .clone()
                .unwrap_or_else(|| self.description.clone()),
            nodes: self.blueprint.nodes.clone(),
            connections: self.blueprint.connections.clone(),
            tags: overrides
                .tags
                .clone()
                .unwrap_or_else(|| self.blueprint.tags.clone()),
            created_by: overrides.created_by.clone().unwrap_or_default(),
            is_active: true,
            created_at: now,
            updated_at: now,
            settings: self.blueprint.settings.clone(),
        }
    }
}
