use async_trait::async_trait;
use ledgercore::{
    Branch, ConditionOperator, ConfigExt, NodeContext, NodeError, NodeExecutor, NodeMetadata,
    NodeOutput, NodeType, PortDefinition,
};
use serde_json::Value;

/// Compares a value from the input context and selects the `true` or
/// `false` branch.
pub struct ConditionNode;

#[async_trait]
impl NodeExecutor for ConditionNode {
    fn node_type(&self) -> NodeType {
        NodeType::Condition
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let field_path = ctx
            .config
            .get_str("fieldPath")
            .filter(|p| !p.is_empty())
            .ok_or_else(|| NodeError::Configuration("fieldPath is required".to_string()))?;
        let operator: ConditionOperator = ctx
            .config
            .get_str("operator")
            .ok_or_else(|| NodeError::Configuration("operator is required".to_string()))?
            .parse()?;
        let compare = ctx.require_config("compareValue")?;

        let value = ctx.lookup(field_path);
        let result = evaluate(operator, value, compare);

        ctx.events.info(format!(
            "{} {} {} -> {}",
            field_path, operator, compare, result
        ));

        let branch = Branch::from(result);
        Ok(NodeOutput::new()
            .with_output(
                "condition",
                format!("{} {} {}", field_path, operator, display(compare)),
            )
            .with_output("inputValue", value.cloned().unwrap_or(Value::Null))
            .with_output("result", result)
            .with_output("nextPath", branch.as_str())
            .with_branch(branch))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Route the run down the true or false branch".to_string(),
            category: "logic".to_string(),
            inputs: vec![PortDefinition::required(
                "fieldPath",
                "Dotted path into the input context",
            )],
            outputs: vec![
                PortDefinition::required("result", "Outcome of the comparison"),
                PortDefinition::required("nextPath", "Branch taken: true or false"),
            ],
        }
    }
}

/// Evaluate `value <operator> compare`. A missing value behaves as `null`.
pub fn evaluate(operator: ConditionOperator, value: Option<&Value>, compare: &Value) -> bool {
    let value = value.unwrap_or(&Value::Null);
    match operator {
        ConditionOperator::Equals => loosely_equal(value, compare),
        ConditionOperator::NotEquals => !loosely_equal(value, compare),
        ConditionOperator::GreaterThan => match (number(value), number(compare)) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        },
        ConditionOperator::LessThan => match (number(value), number(compare)) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        },
        ConditionOperator::Contains => match value {
            Value::Array(items) => items.iter().any(|item| loosely_equal(item, compare)),
            Value::String(text) => text.contains(display(compare).as_str()),
            Value::Object(map) => compare.as_str().is_some_and(|key| map.contains_key(key)),
            _ => false,
        },
    }
}

// 1 and 1.0 compare equal; everything else is structural.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

pub(crate) fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
