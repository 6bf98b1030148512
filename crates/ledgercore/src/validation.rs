use crate::{
    ConditionOperator, Config, ConfigExt, FlowError, NodeError, NodeSpec, NodeType, SheetOperation,
    TaxRegime, TransformOperation, Workflow, WorkflowError, WorkflowGraph,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::str::FromStr;

/// Outcome of [`validate`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    pub fn into_result(self) -> Result<(), FlowError> {
        if self.is_valid {
            Ok(())
        } else {
            Err(WorkflowError::Invalid(self.errors).into())
        }
    }
}

/// Structural and per-type configuration check of a workflow definition.
///
/// Pure: collects every problem instead of stopping at the first one.
pub fn validate(workflow: &Workflow) -> ValidationReport {
    let mut errors = Vec::new();

    if workflow.name.trim().is_empty() {
        errors.push("workflow name must not be empty".to_string());
    }
    if workflow.nodes.is_empty() {
        errors.push("workflow must contain at least one node".to_string());
    }

    let mut ids = HashSet::new();
    for node in &workflow.nodes {
        if node.id.trim().is_empty() {
            errors.push("node id must not be empty".to_string());
        } else if !ids.insert(node.id.as_str()) {
            errors.push(format!("duplicate node id: {}", node.id));
        }
    }

    let mut seen = HashSet::new();
    for conn in &workflow.connections {
        for endpoint in [&conn.source, &conn.target] {
            if !ids.contains(endpoint.as_str()) {
                errors.push(format!("unknown node reference: {}", endpoint));
            }
        }
        if conn.source == conn.target {
            errors.push(format!("self-loop on node: {}", conn.source));
        }
        if !seen.insert((&conn.source, &conn.target, conn.branch)) {
            errors.push(format!(
                "duplicate connection: {} -> {}{}",
                conn.source,
                conn.target,
                conn.branch
                    .map(|b| format!(" [{}]", b))
                    .unwrap_or_default()
            ));
        }
        if let (Some(branch), Some(source)) = (conn.branch, workflow.find_node(&conn.source)) {
            if source.node_type != NodeType::Condition {
                errors.push(format!(
                    "branch label '{}' on connection from non-condition node: {}",
                    branch, conn.source
                ));
            }
        }
    }

    for node in &workflow.nodes {
        check_node(node, &mut errors);
    }

    if let Some(cycle) = WorkflowGraph::new(workflow).find_cycle() {
        errors.push(format!("cycle detected: {}", cycle.join(" -> ")));
    }

    ValidationReport::from_errors(errors)
}

fn check_node(node: &NodeSpec, errors: &mut Vec<String>) {
    let mut problem = |msg: String| errors.push(format!("node {}: {}", node.id, msg));

    if node.timeout_ms == Some(0) {
        problem("timeout_ms must be positive".to_string());
    }

    let config = &node.config;
    match node.node_type {
        NodeType::TaxCalculator => match config.get_str("taxRegime") {
            Some(regime) => {
                if let Err(e) = TaxRegime::from_str(regime) {
                    problem(detail(e));
                }
            }
            None => problem("taxRegime is required (old | new)".to_string()),
        },
        NodeType::Condition => {
            match config.get_str("fieldPath") {
                Some(path) if !path.trim().is_empty() => {}
                _ => problem("fieldPath must be a non-empty string".to_string()),
            }
            match config.get_str("operator") {
                Some(op) => {
                    if let Err(e) = ConditionOperator::from_str(op) {
                        problem(detail(e));
                    }
                }
                None => problem("operator is required".to_string()),
            }
            if !config.contains_key("compareValue") {
                problem("compareValue is required".to_string());
            }
        }
        NodeType::EmailSender => {
            if config.contains_key("recipients") && config.get_string_list("recipients").is_none() {
                problem("recipients must be a list of strings".to_string());
            }
            for key in ["subject", "template"] {
                if config.get(key).is_some_and(|v| !v.is_string()) {
                    problem(format!("{} must be a string", key));
                }
            }
        }
        NodeType::GoogleSheetsAction => {
            if let Some(op) = config.get("operation") {
                match op.as_str().map(SheetOperation::from_str) {
                    Some(Ok(_)) => {}
                    Some(Err(e)) => problem(detail(e)),
                    None => problem("operation must be a string".to_string()),
                }
            }
        }
        NodeType::GstProcessor => {
            if let Some(rate) = config.get("gstRate") {
                match rate.as_f64() {
                    Some(r) if (0.0..=1.0).contains(&r) => {}
                    _ => problem("gstRate must be a number between 0 and 1".to_string()),
                }
            }
        }
        NodeType::Delay => {
            if let Some(delay) = config.get("delayMs") {
                if delay.as_u64().is_none() {
                    problem("delayMs must be a non-negative integer".to_string());
                }
            }
        }
        NodeType::DataTransformer => check_transformations(config, &mut problem),
        NodeType::ClientIntake => {
            if config.contains_key("requiredFields")
                && config.get_string_list("requiredFields").is_none()
            {
                problem("requiredFields must be a list of strings".to_string());
            }
        }
        _ => {}
    }
}

fn check_transformations(config: &Config, problem: &mut impl FnMut(String)) {
    let Some(value) = config.get("transformations") else {
        return;
    };
    let Some(items) = value.as_array() else {
        problem("transformations must be a list".to_string());
        return;
    };
    for (i, item) in items.iter().enumerate() {
        let field = |key: &str| item.get(key).and_then(Value::as_str);
        for key in ["sourceField", "targetField"] {
            if field(key).is_none() {
                problem(format!("transformations[{}].{} is required", i, key));
            }
        }
        match field("operation") {
            Some(op) => {
                if let Err(e) = TransformOperation::from_str(op) {
                    problem(format!("transformations[{}]: {}", i, detail(e)));
                }
            }
            None => problem(format!("transformations[{}].operation is required", i)),
        }
    }
}

fn detail(error: NodeError) -> String {
    match error {
        NodeError::Configuration(msg) => msg,
        other => other.to_string(),
    }
}
