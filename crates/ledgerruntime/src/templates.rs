use crate::catalog;
use ledgercore::{
    validate, Complexity, TemplateCategory, TemplateOverrides, Workflow, WorkflowError,
    WorkflowTemplate,
};

/// Read-only catalogue of workflow templates
pub struct TemplateRegistry {
    templates: Vec<WorkflowTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self {
            templates: Vec::new(),
        }
    }

    /// Registry preloaded with the built-in practice templates
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for template in catalog::builtin() {
            let id = template.id.clone();
            if let Err(e) = registry.register(template) {
                tracing::error!("Skipping built-in template {}: {}", id, e);
            }
        }
        registry
    }

    /// Add a template, replacing one with the same id. A template whose
    /// blueprint does not validate is refused.
    pub fn register(&mut self, template: WorkflowTemplate) -> Result<(), WorkflowError> {
        let report = validate(&template.instantiate(&TemplateOverrides::default()));
        if !report.is_valid {
            return Err(WorkflowError::InvalidTemplate {
                id: template.id,
                errors: report.errors,
            });
        }
        tracing::debug!("Registering template: {}", template.id);
        self.templates.retain(|t| t.id != template.id);
        self.templates.push(template);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&WorkflowTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn list(&self) -> &[WorkflowTemplate] {
        &self.templates
    }

    pub fn by_category(&self, category: TemplateCategory) -> Vec<&WorkflowTemplate> {
        self.templates
            .iter()
            .filter(|t| t.category == category)
            .collect()
    }

    pub fn by_complexity(&self, complexity: Complexity) -> Vec<&WorkflowTemplate> {
        self.templates
            .iter()
            .filter(|t| t.complexity == complexity)
            .collect()
    }

    /// Build a fresh, validated workflow from a template.
    ///
    /// A blueprint that fails validation on its own is `InvalidTemplate`;
    /// a failure caused by the caller's overrides is `Invalid`.
    pub fn instantiate(
        &self,
        id: &str,
        overrides: &TemplateOverrides,
    ) -> Result<Workflow, WorkflowError> {
        let template = self
            .get(id)
            .ok_or_else(|| WorkflowError::TemplateNotFound(id.to_string()))?;

        let report = validate(&template.instantiate(&TemplateOverrides::default()));
        if !report.is_valid {
            tracing::error!(
                "Template {} produced an invalid workflow: {:?}",
                id,
                report.errors
            );
            return Err(WorkflowError::InvalidTemplate {
                id: id.to_string(),
                errors: report.errors,
            });
        }

        let workflow = template.instantiate(overrides);
        let report = validate(&workflow);
        if !report.is_valid {
            return Err(WorkflowError::Invalid(report.errors));
        }
        Ok(workflow)
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
