use async_trait::async_trait;
use chrono::Utc;
use ledgercore::{
    ConfigExt, NodeContext, NodeError, NodeExecutor, NodeMetadata, NodeOutput, NodeType,
    PortDefinition,
};
use serde_json::Value;
use tokio::time::{sleep, Duration};

/// Delay execution for a specified duration
pub struct DelayNode;

#[async_trait]
impl NodeExecutor for DelayNode {
    fn node_type(&self) -> NodeType {
        NodeType::Delay
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let delay_ms = ctx
            .config
            .get("delayMs")
            .and_then(Value::as_u64)
            .unwrap_or(1000);

        ctx.events.info(format!("Delaying for {}ms", delay_ms));

        sleep(Duration::from_millis(delay_ms)).await;

        // Pass through any inputs
        Ok(NodeOutput {
            data: ctx.inputs,
            branch: None,
        })
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Delay execution for specified milliseconds".to_string(),
            category: "time".to_string(),
            inputs: vec![],
            outputs: vec![],
        }
    }
}

/// Entry node for scheduled runs
pub struct ScheduledTriggerNode;

#[async_trait]
impl NodeExecutor for ScheduledTriggerNode {
    fn node_type(&self) -> NodeType {
        NodeType::ScheduledTrigger
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let schedule = ctx.config.get_str("schedule").unwrap_or("manual").to_string();

        let mut output = match ctx.inputs.get("input") {
            Some(Value::Object(seed)) => NodeOutput::from_value(Value::Object(seed.clone())),
            Some(Value::Null) | None => NodeOutput::new(),
            Some(other) => NodeOutput::new().with_output("payload", other.clone()),
        };
        output = output
            .with_output("triggeredAt", Utc::now().to_rfc3339())
            .with_output("schedule", schedule.clone());

        ctx.events.info(format!("Triggered on schedule {}", schedule));
        Ok(output)
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Start a run on a schedule, passing the seed input on".to_string(),
            category: "trigger".to_string(),
            inputs: vec![PortDefinition::optional("input", "Seed data for the run")],
            outputs: vec![
                PortDefinition::required("triggeredAt", "When the run was triggered"),
                PortDefinition::required("schedule", "Cron expression from config"),
            ],
        }
    }
}
