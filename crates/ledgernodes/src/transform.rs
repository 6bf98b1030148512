use crate::condition::{display, number};
use async_trait::async_trait;
use ledgercore::{
    NodeContext, NodeError, NodeExecutor, NodeMetadata, NodeOutput, NodeType, PortDefinition,
    TransformOperation,
};
use serde_json::{Map, Value};

/// Format an amount in rupees with Indian digit grouping: `₹12,34,567.50`.
pub fn format_inr(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (int, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let grouped = if int.len() <= 3 {
        int.to_string()
    } else {
        let (mut head, tail) = int.split_at(int.len() - 3);
        let mut groups = Vec::new();
        while head.len() > 2 {
            let (rest, group) = head.split_at(head.len() - 2);
            groups.push(group);
            head = rest;
        }
        groups.push(head);
        groups.reverse();
        format!("{},{}", groups.join(","), tail)
    };

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}₹{}.{}", sign, grouped, frac)
}

/// Apply an arithmetic expression such as `add 10` or `percentage 18`.
pub fn calculate(input: f64, expression: &str) -> Result<f64, NodeError> {
    let mut parts = expression.split_whitespace();
    let (Some(op), Some(operand), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(NodeError::Configuration(format!(
            "calculation must be '<op> <number>', got '{}'",
            expression
        )));
    };
    let operand: f64 = operand
        .parse()
        .map_err(|_| NodeError::Configuration(format!("'{}' is not a number", operand)))?;

    match op {
        "add" => Ok(input + operand),
        "subtract" => Ok(input - operand),
        "multiply" => Ok(input * operand),
        "divide" if operand == 0.0 => Err(NodeError::ExecutionFailed("division by zero".to_string())),
        "divide" => Ok(input / operand),
        "percentage" => Ok(input * operand / 100.0),
        other => Err(NodeError::Configuration(format!(
            "unknown calculation '{}', expected one of: add, subtract, multiply, divide, percentage",
            other
        ))),
    }
}

fn format(value: &Value, style: &str) -> Value {
    match style {
        "uppercase" => Value::String(display(value).to_uppercase()),
        "lowercase" => Value::String(display(value).to_lowercase()),
        "currency" => match number(value) {
            Some(amount) => Value::String(format_inr(amount)),
            None => value.clone(),
        },
        _ => value.clone(),
    }
}

/// Copies, formats and computes fields from the input context
pub struct DataTransformerNode;

#[async_trait]
impl NodeExecutor for DataTransformerNode {
    fn node_type(&self) -> NodeType {
        NodeType::DataTransformer
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let transformations = ctx
            .config
            .get("transformations")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut out = Map::new();
        for (i, step) in transformations.iter().enumerate() {
            let field = |name: &str| {
                step.get(name).and_then(Value::as_str).ok_or_else(|| {
                    NodeError::Configuration(format!("transformations[{}].{} is required", i, name))
                })
            };
            let source = field("sourceField")?;
            let target = field("targetField")?;
            let operation: TransformOperation = field("operation")?.parse()?;
            let argument = step.get("value").map(display).unwrap_or_default();

            // Earlier targets shadow the input context so steps can chain.
            let input = out
                .get(source)
                .or_else(|| ctx.lookup(source))
                .cloned()
                .unwrap_or(Value::Null);

            let result = match operation {
                TransformOperation::Copy => input,
                TransformOperation::Format => format(&input, &argument),
                TransformOperation::Calculate => {
                    let n = number(&input)
                        .ok_or_else(|| NodeError::invalid_type(source, "number", &input))?;
                    Value::from(calculate(n, &argument)?)
                }
            };
            out.insert(target.to_string(), result);
        }

        ctx.events.info(format!("Applied {} transformation(s)", transformations.len()));
        Ok(NodeOutput { data: out, branch: None })
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Copy, format or calculate fields".to_string(),
            category: "transform".to_string(),
            inputs: vec![],
            outputs: vec![PortDefinition::optional(
                "<targetField>",
                "One output per transformation",
            )],
        }
    }
}
